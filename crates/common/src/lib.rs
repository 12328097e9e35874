use serde::{Deserialize, Serialize};

pub mod song_id;

pub use song_id::{
    compute_id, compute_id_with_suffix, is_valid_id, parse_id, ParsedId, SongIdError,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub file_path: String,
    #[serde(default)]
    pub original_file_path: Option<String>,
    #[serde(default)]
    pub original_format: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub genre: Option<String>,
    /// Whole seconds, 0 when unknown.
    pub duration: u32,
    pub file_size: u64,
    #[serde(default)]
    pub track_number: Option<u16>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub date_added: u64,
    #[serde(default)]
    pub date_modified: u64,
}

impl Song {
    pub fn genre_or_empty(&self) -> &str {
        self.genre.as_deref().unwrap_or("")
    }

    /// Applies every field present in `update`. Returns whether anything changed.
    pub fn apply(&mut self, update: SongUpdate) -> bool {
        let before = self.clone();
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(artist) = update.artist {
            self.artist = artist;
        }
        if let Some(album) = update.album {
            self.album = album;
        }
        if let Some(genre) = update.genre {
            self.genre = genre;
        }
        if let Some(track_number) = update.track_number {
            self.track_number = track_number;
        }
        if let Some(year) = update.year {
            self.year = year;
        }
        if let Some(file_path) = update.file_path {
            self.file_path = file_path;
        }
        *self != before
    }
}

/// Partial song edit. Outer `None` keeps the stored value; for nullable
/// columns `Some(None)` clears it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<Option<String>>,
    pub track_number: Option<Option<u16>>,
    pub year: Option<Option<i32>>,
    pub file_path: Option<String>,
}

impl SongUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.genre.is_none()
            && self.track_number.is_none()
            && self.year.is_none()
            && self.file_path.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub song_ids: Vec<String>,
    #[serde(default)]
    pub date_created: u64,
    #[serde(default)]
    pub date_modified: u64,
}
