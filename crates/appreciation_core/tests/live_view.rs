use appreciation_core::{
    ErrorClass, InMemoryNoteStore, LiveCollectionView, NewNote, NoteId, NoteStore, Notifier, Role,
    RoleFilter,
};
use std::time::Duration;

fn notifier() -> Notifier {
    Notifier::new(Duration::from_secs(3))
}

async fn post(store: &InMemoryNoteStore, role: Role, message: &str) -> NoteId {
    store
        .create(&NewNote::new(role, message).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn attach_delivers_current_state_immediately() {
    let store = InMemoryNoteStore::new();
    post(&store, Role::Student, "before attach").await;

    let view = LiveCollectionView::attach(&store, notifier());
    assert!(!view.is_loading());
    assert_eq!(view.snapshot().len(), 1);
    assert_eq!(view.snapshot()[0].message, "before attach");
    assert_eq!(store.call_counts().subscribe, 1);
}

#[tokio::test]
async fn filter_all_tracks_latest_snapshot_exactly() {
    let store = InMemoryNoteStore::new();
    let view = LiveCollectionView::attach(&store, notifier());
    assert!(view.filter_by(RoleFilter::All).is_empty());

    let first = post(&store, Role::Student, "one").await;
    let second = post(&store, Role::Parent, "two").await;
    store.set_response(&first, "thanks").await.unwrap();
    let third = post(&store, Role::Admin, "three").await;
    store.remove(&second).await.unwrap();

    let all = view.filter_by(RoleFilter::All);
    assert_eq!(all, store.notes());
    assert_eq!(
        all.iter().map(|note| note.id.clone()).collect::<Vec<_>>(),
        vec![third, first.clone()]
    );
    assert_eq!(
        view.get(&first).unwrap().response.as_deref(),
        Some("thanks")
    );
}

#[tokio::test]
async fn filter_by_role_keeps_relative_order() {
    let store = InMemoryNoteStore::new();
    let view = LiveCollectionView::attach(&store, notifier());
    let roles = [
        Role::Student,
        Role::Parent,
        Role::Student,
        Role::Admin,
        Role::Student,
        Role::Parent,
    ];
    for (idx, role) in roles.iter().enumerate() {
        post(&store, *role, &format!("note {idx}")).await;
    }

    let snapshot = view.snapshot();
    for role in Role::ALL {
        let expected: Vec<_> = snapshot
            .iter()
            .filter(|note| note.role == role)
            .cloned()
            .collect();
        assert_eq!(view.filter_by(RoleFilter::Only(role)), expected);
    }
    let students = view.filter_by(Role::Student.into());
    assert_eq!(
        students
            .iter()
            .map(|note| note.message.as_str())
            .collect::<Vec<_>>(),
        vec!["note 4", "note 2", "note 0"]
    );
}

#[tokio::test]
async fn subscription_error_keeps_last_snapshot_and_notifies() {
    let store = InMemoryNoteStore::new();
    let notifier = notifier();
    let view = LiveCollectionView::attach(&store, notifier.clone());
    post(&store, Role::Parent, "kept").await;

    store.fail_subscriptions("listener revoked");
    assert!(!view.is_live());
    assert!(!view.is_loading());
    assert_eq!(view.snapshot().len(), 1);
    assert!(view.last_error().unwrap().contains("listener revoked"));

    let shown = notifier.current().unwrap();
    assert_eq!(shown.message, "Failed to load appreciations");
    assert_eq!(shown.error, Some(ErrorClass::StoreUnavailable));

    post(&store, Role::Parent, "not delivered").await;
    assert_eq!(view.snapshot().len(), 1);
    assert_eq!(notifier.shown_count(), 1);
}

#[tokio::test]
async fn dropping_the_view_unsubscribes_once() {
    let store = InMemoryNoteStore::new();
    let view = LiveCollectionView::attach(&store, notifier());
    let other = LiveCollectionView::attach(&store, notifier());
    assert_eq!(store.subscriber_count(), 2);

    drop(view);
    assert_eq!(store.subscriber_count(), 1);
    post(&store, Role::Admin, "still flowing").await;
    assert_eq!(other.snapshot().len(), 1);
}

#[tokio::test]
async fn changes_channel_signals_each_applied_snapshot() {
    let store = InMemoryNoteStore::new();
    let view = LiveCollectionView::attach(&store, notifier());
    let mut changes = view.changes();
    let seen = *changes.borrow_and_update();

    post(&store, Role::Student, "ping").await;
    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow_and_update(), seen + 1);
    assert!(view.applied_sequence() > 1);
}
