//! Partitioning a song collection into duplicate clusters.
//!
//! Grouping is a single greedy pass: the first song not yet claimed seeds a
//! group, every later unclaimed song is compared against that seed only, and
//! matches are claimed on the spot. Transitive matches through a non-seed
//! member are therefore not found (A~B and B~C with A!~C leaves C out when A
//! seeds), and results depend on input order.

use serde::Serialize;
use tracing::debug;

use crate::compare::{Comparable, DuplicateVerdict, MatchMode, MatchType, PreparedSong};

#[derive(Clone, Debug, Serialize)]
pub struct GroupMember<T> {
    pub song: T,
    /// Overall similarity to the seed.
    pub similarity: f64,
    pub match_type: MatchType,
}

#[derive(Clone, Debug, Serialize)]
pub struct DuplicateGroup<T> {
    pub seed: T,
    pub members: Vec<GroupMember<T>>,
}

impl<T: Comparable> DuplicateGroup<T> {
    pub fn count(&self) -> usize {
        1 + self.members.len()
    }

    pub fn title(&self) -> &str {
        self.seed.title()
    }

    pub fn artist(&self) -> &str {
        self.seed.artist()
    }

    /// Seed first, then members in discovery order.
    pub fn songs(&self) -> impl Iterator<Item = &T> {
        std::iter::once(&self.seed).chain(self.members.iter().map(|member| &member.song))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RankedDuplicate<T> {
    pub song: T,
    #[serde(flatten)]
    pub verdict: DuplicateVerdict,
}

pub fn find_duplicate_groups<T: Comparable>(songs: &[T], threshold: f64) -> Vec<DuplicateGroup<&T>> {
    find_duplicate_groups_with_mode(songs, threshold, MatchMode::Standard)
}

pub fn find_duplicate_groups_with_mode<T: Comparable>(
    songs: &[T],
    threshold: f64,
    mode: MatchMode,
) -> Vec<DuplicateGroup<&T>> {
    let prepared: Vec<PreparedSong> = songs
        .iter()
        .map(|song| PreparedSong::new(song, mode))
        .collect();
    let mut consumed = vec![false; songs.len()];
    let mut groups = Vec::new();

    for i in 0..songs.len() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;

        let mut members = Vec::new();
        for j in (i + 1)..songs.len() {
            if consumed[j] {
                continue;
            }
            let verdict = prepared[i].compare(&prepared[j], threshold);
            if verdict.is_duplicate {
                members.push(GroupMember {
                    song: &songs[j],
                    similarity: verdict.overall_similarity,
                    match_type: verdict.match_type,
                });
                consumed[j] = true;
            }
        }

        if !members.is_empty() {
            groups.push(DuplicateGroup {
                seed: &songs[i],
                members,
            });
        }
    }

    debug!(
        "Grouped {} songs into {} duplicate groups (threshold {})",
        songs.len(),
        groups.len(),
        threshold
    );
    groups
}

pub fn find_duplicates_for_song<'a, S, T>(
    target: &S,
    songs: &'a [T],
    threshold: f64,
) -> Vec<RankedDuplicate<&'a T>>
where
    S: Comparable + ?Sized,
    T: Comparable,
{
    find_duplicates_for_song_with_mode(target, songs, threshold, MatchMode::Standard)
}

pub fn find_duplicates_for_song_with_mode<'a, S, T>(
    target: &S,
    songs: &'a [T],
    threshold: f64,
    mode: MatchMode,
) -> Vec<RankedDuplicate<&'a T>>
where
    S: Comparable + ?Sized,
    T: Comparable,
{
    let prepared_target = PreparedSong::new(target, mode);
    let mut ranked: Vec<RankedDuplicate<&T>> = songs
        .iter()
        .filter(|song| song.id() != target.id())
        .filter_map(|song| {
            let verdict = prepared_target.compare(&PreparedSong::new(song, mode), threshold);
            verdict.is_duplicate.then_some(RankedDuplicate { song, verdict })
        })
        .collect();

    // Stable sort keeps input order among equal scores.
    ranked.sort_by(|a, b| {
        b.verdict
            .overall_similarity
            .total_cmp(&a.verdict.overall_similarity)
    });
    ranked
}
