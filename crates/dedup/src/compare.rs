use common::Song;
use serde::{Deserialize, Serialize};

use crate::featuring::parse_featuring;
use crate::similarity::{normalize, similarity_normalized};

pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Title is the stronger duplicate signal; artist credits vary more in
/// formatting.
pub const TITLE_WEIGHT: f64 = 0.6;
pub const ARTIST_WEIGHT: f64 = 0.4;

const HIGH_SIMILARITY: f64 = 0.9;

/// Anything that can be checked for duplicates.
pub trait Comparable {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn artist(&self) -> &str;
}

impl<T: Comparable + ?Sized> Comparable for &T {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn title(&self) -> &str {
        (**self).title()
    }

    fn artist(&self) -> &str {
        (**self).artist()
    }
}

impl Comparable for Song {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn artist(&self) -> &str {
        &self.artist
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    PartialExact,
    HighSimilarity,
    Fuzzy,
}

impl MatchType {
    pub fn classify(title_similarity: f64, artist_similarity: f64) -> Self {
        let title_exact = title_similarity == 1.0;
        let artist_exact = artist_similarity == 1.0;
        if title_exact && artist_exact {
            MatchType::Exact
        } else if title_exact || artist_exact {
            MatchType::PartialExact
        } else if title_similarity >= HIGH_SIMILARITY && artist_similarity >= HIGH_SIMILARITY {
            MatchType::HighSimilarity
        } else {
            MatchType::Fuzzy
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::PartialExact => "partial_exact",
            MatchType::HighSimilarity => "high_similarity",
            MatchType::Fuzzy => "fuzzy",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuplicateVerdict {
    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub overall_similarity: f64,
    pub is_duplicate: bool,
    pub match_type: MatchType,
    /// Only the advanced comparison sets this.
    pub has_featuring: bool,
}

/// How titles are prepared before scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Standard,
    /// Featured-artist suffixes are removed from titles first.
    Advanced,
}

/// Song fields normalized once, so pairwise passes do not redo it.
#[derive(Clone, Debug)]
pub struct PreparedSong {
    title: String,
    artist: String,
    has_featuring: bool,
}

impl PreparedSong {
    pub fn new<T: Comparable + ?Sized>(song: &T, mode: MatchMode) -> Self {
        match mode {
            MatchMode::Standard => Self {
                title: normalize(song.title()),
                artist: normalize(song.artist()),
                has_featuring: false,
            },
            MatchMode::Advanced => {
                let parsed = parse_featuring(song.title());
                Self {
                    title: normalize(&parsed.main_part),
                    artist: normalize(song.artist()),
                    has_featuring: parsed.has_featuring,
                }
            }
        }
    }

    pub fn compare(&self, other: &PreparedSong, threshold: f64) -> DuplicateVerdict {
        let title_similarity = similarity_normalized(&self.title, &other.title);
        let artist_similarity = similarity_normalized(&self.artist, &other.artist);
        let overall_similarity = TITLE_WEIGHT * title_similarity + ARTIST_WEIGHT * artist_similarity;

        DuplicateVerdict {
            title_similarity,
            artist_similarity,
            overall_similarity,
            is_duplicate: overall_similarity >= threshold,
            match_type: MatchType::classify(title_similarity, artist_similarity),
            has_featuring: self.has_featuring || other.has_featuring,
        }
    }
}

pub fn compare<A, B>(a: &A, b: &B, threshold: f64) -> DuplicateVerdict
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    compare_with_mode(a, b, threshold, MatchMode::Standard)
}

pub fn compare_advanced<A, B>(a: &A, b: &B, threshold: f64) -> DuplicateVerdict
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    compare_with_mode(a, b, threshold, MatchMode::Advanced)
}

pub fn compare_with_mode<A, B>(a: &A, b: &B, threshold: f64, mode: MatchMode) -> DuplicateVerdict
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    PreparedSong::new(a, mode).compare(&PreparedSong::new(b, mode), threshold)
}
