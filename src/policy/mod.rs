//! Content policy - age gates per story genre

use crate::stories::StoryGenre;

/// Minimum age table, keyed by genre name
const MINIMUM_AGES: &[(&str, u32)] = &[
    ("fairy", 3),
    ("adventure", 5),
    ("educational", 0),
    ("bedtime", 0),
];

/// Minimum age for a genre name. Names not in the table have no age gate.
pub fn minimum_age(genre: &str) -> u32 {
    MINIMUM_AGES
        .iter()
        .find(|(name, _)| *name == genre)
        .map(|(_, age)| *age)
        .unwrap_or(0)
}

/// Check whether a genre is appropriate for a child of the given age
pub fn is_allowed(age: u32, genre: StoryGenre) -> bool {
    age >= minimum_age(genre.as_str())
}
