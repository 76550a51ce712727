//! Card colour assignment.
//!
//! # Invariants
//! - A note's colour depends only on its id, so every viewer renders the same
//!   card the same way.
//! - Empty ids map to the first palette entry.

use crate::model::note::NoteId;
use serde::{Deserialize, Serialize};

/// Pastel background palette for note cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardColor {
    Yellow,
    Pink,
    Blue,
    Green,
    Purple,
    Orange,
    Red,
    Indigo,
    Lime,
    Cyan,
    Fuchsia,
    Rose,
    Amber,
    Emerald,
    Sky,
    Violet,
}

impl CardColor {
    pub const PALETTE: [CardColor; 16] = [
        CardColor::Yellow,
        CardColor::Pink,
        CardColor::Blue,
        CardColor::Green,
        CardColor::Purple,
        CardColor::Orange,
        CardColor::Red,
        CardColor::Indigo,
        CardColor::Lime,
        CardColor::Cyan,
        CardColor::Fuchsia,
        CardColor::Rose,
        CardColor::Amber,
        CardColor::Emerald,
        CardColor::Sky,
        CardColor::Violet,
    ];

    /// Picks the colour for one note id.
    pub fn for_note(id: &NoteId) -> Self {
        Self::PALETTE[palette_index(id.as_str(), Self::PALETTE.len())]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardColor::Yellow => "yellow",
            CardColor::Pink => "pink",
            CardColor::Blue => "blue",
            CardColor::Green => "green",
            CardColor::Purple => "purple",
            CardColor::Orange => "orange",
            CardColor::Red => "red",
            CardColor::Indigo => "indigo",
            CardColor::Lime => "lime",
            CardColor::Cyan => "cyan",
            CardColor::Fuchsia => "fuchsia",
            CardColor::Rose => "rose",
            CardColor::Amber => "amber",
            CardColor::Emerald => "emerald",
            CardColor::Sky => "sky",
            CardColor::Violet => "violet",
        }
    }
}

/// `h = unit + ((h << 5) - h)` over UTF-16 code units.
///
/// The shift operates on the 32-bit truncation of `h` while the sum does not,
/// so the accumulator is kept in `i64`.
fn palette_index(id: &str, len: usize) -> usize {
    if id.is_empty() {
        return 0;
    }
    let mut hash: i64 = 0;
    for unit in id.encode_utf16() {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        hash = i64::from(unit) + (shifted - hash);
    }
    (hash.unsigned_abs() % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::{palette_index, CardColor};
    use crate::model::note::NoteId;

    #[test]
    fn empty_id_uses_first_colour() {
        assert_eq!(CardColor::for_note(&NoteId::new("")), CardColor::Yellow);
    }

    #[test]
    fn index_matches_reference_values() {
        // "a" -> 97, "ab" -> 97 * 31 + 98 = 3105
        assert_eq!(palette_index("a", 16), 97 % 16);
        assert_eq!(palette_index("ab", 16), 3105 % 16);
    }

    #[test]
    fn colour_is_stable_for_the_same_id() {
        let id = NoteId::new("XyZ09-long-document-identifier-value");
        assert_eq!(CardColor::for_note(&id), CardColor::for_note(&id.clone()));
    }
}
