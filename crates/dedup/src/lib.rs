//! Fuzzy duplicate detection for library songs.
//!
//! Titles and artists are scored with a bigram (Dice) coefficient and combined
//! into a weighted verdict; the grouping pass clusters a collection around
//! seed songs. Everything here is pure and synchronous.

pub mod compare;
pub mod featuring;
pub mod group;
pub mod similarity;

pub use compare::{
    compare, compare_advanced, compare_with_mode, Comparable, DuplicateVerdict, MatchMode,
    MatchType, PreparedSong, ARTIST_WEIGHT, DEFAULT_THRESHOLD, TITLE_WEIGHT,
};
pub use featuring::{parse_featuring, Featuring};
pub use group::{
    find_duplicate_groups, find_duplicate_groups_with_mode, find_duplicates_for_song,
    find_duplicates_for_song_with_mode, DuplicateGroup, GroupMember, RankedDuplicate,
};
pub use similarity::{normalize, similarity};
