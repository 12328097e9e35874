use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::{Playlist, Song, SongUpdate};
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition,
    TableError, TransactionError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub mod import;
pub mod scan;

pub use import::{
    import_file, import_files, FileTags, ImportError, ImportFailure, ImportOptions, ImportOutcome,
    ImportProgress, ImportReport, ImportStatus, Importer, TagSource,
};
pub use scan::{
    collect_audio_files, filter_mp3_files, has_audio_extension, import_info, is_audio_file,
    scan_folder, ImportInfo, AUDIO_EXTENSIONS,
};

const SCHEMA_VERSION: u32 = 1;
const KEY_SEP: char = '\x1f';

const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const SONGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("songs");
const SONGS_BY_TITLE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("songs_by_title");
const PLAYLISTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("playlists");
const SETTINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("settings");

const META_VERSION_KEY: &str = "version";

/// Song, playlist and settings store keyed by content-derived song ids.
#[derive(Clone)]
pub struct Library {
    db: Arc<Database>,
}

/// Case-insensitive substring filters; all present filters must match.
#[derive(Clone, Debug, Default)]
pub struct SongFilter {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}

/// Songs sharing a lowercased title and artist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExactDuplicate {
    pub title: String,
    pub artist: String,
    pub count: usize,
    pub song_ids: Vec<String>,
}

impl Library {
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let db = open_or_create_db(path)?;
        let library = Self { db: Arc::new(db) };
        library.init_tables()?;
        info!("Opened library at {:?}", path);
        Ok(library)
    }

    fn init_tables(&self) -> Result<(), LibraryError> {
        match read_version(&self.db)? {
            Some(version) if version == SCHEMA_VERSION => return Ok(()),
            Some(version) => return Err(LibraryError::VersionMismatch(version)),
            None => {}
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META_TABLE)?;
            let _ = write_txn.open_table(SONGS_TABLE)?;
            let _ = write_txn.open_table(SONGS_BY_TITLE_TABLE)?;
            let _ = write_txn.open_table(PLAYLISTS_TABLE)?;
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
            let version = encode_value(&SCHEMA_VERSION)?;
            meta.insert(META_VERSION_KEY, version.as_slice())?;
        }
        write_txn.commit()?;
        debug!("Initialized library schema v{}", SCHEMA_VERSION);
        Ok(())
    }

    pub fn get_song(&self, song_id: &str) -> Result<Option<Song>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SONGS_TABLE)?;
        let song = match table.get(song_id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(song)
    }

    pub fn contains_song(&self, song_id: &str) -> Result<bool, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SONGS_TABLE)?;
        let exists = table.get(song_id)?.is_some();
        Ok(exists)
    }

    pub fn song_count(&self) -> Result<usize, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SONGS_TABLE)?;
        Ok(table.len()? as usize)
    }

    /// Stores a new song. The id is the primary key; an existing row is never
    /// overwritten.
    pub fn insert_song(&self, mut song: Song) -> Result<Song, LibraryError> {
        let now = now_secs();
        if song.date_added == 0 {
            song.date_added = now;
        }
        song.date_modified = now;

        let write_txn = self.db.begin_write()?;
        {
            let mut songs = write_txn.open_table(SONGS_TABLE)?;
            if songs.get(song.id.as_str())?.is_some() {
                return Err(LibraryError::SongExists(song.id));
            }
            let bytes = encode_value(&song)?;
            songs.insert(song.id.as_str(), bytes.as_slice())?;

            let mut by_title = write_txn.open_table(SONGS_BY_TITLE_TABLE)?;
            let key = title_key(&song.title, &song.id);
            by_title.insert(key.as_str(), song.id.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(song)
    }

    pub fn update_song(
        &self,
        song_id: &str,
        update: SongUpdate,
    ) -> Result<Option<Song>, LibraryError> {
        if update.is_empty() {
            return self.get_song(song_id);
        }

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut songs = write_txn.open_table(SONGS_TABLE)?;
            let mut song: Song = match songs.get(song_id)? {
                Some(value) => decode_value(value.value())?,
                None => return Ok(None),
            };

            let old_key = title_key(&song.title, &song.id);
            if !song.apply(update) {
                return Ok(Some(song));
            }
            song.date_modified = now_secs();

            let bytes = encode_value(&song)?;
            songs.insert(song_id, bytes.as_slice())?;

            let new_key = title_key(&song.title, &song.id);
            if new_key != old_key {
                let mut by_title = write_txn.open_table(SONGS_BY_TITLE_TABLE)?;
                by_title.remove(old_key.as_str())?;
                by_title.insert(new_key.as_str(), song.id.as_bytes())?;
            }
            song
        };
        write_txn.commit()?;
        Ok(Some(updated))
    }

    /// Removes the song and every playlist reference to it.
    pub fn delete_song(&self, song_id: &str) -> Result<bool, LibraryError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut songs = write_txn.open_table(SONGS_TABLE)?;
            let song: Song = match songs.remove(song_id)? {
                Some(value) => decode_value(value.value())?,
                None => return Ok(false),
            };

            let mut by_title = write_txn.open_table(SONGS_BY_TITLE_TABLE)?;
            by_title.remove(title_key(&song.title, &song.id).as_str())?;

            let mut playlists = write_txn.open_table(PLAYLISTS_TABLE)?;
            let mut touched = Vec::new();
            for entry in playlists.iter()? {
                let entry = entry?;
                let mut playlist: Playlist = decode_value(entry.1.value())?;
                if playlist.song_ids.iter().any(|id| id == song_id) {
                    playlist.song_ids.retain(|id| id != song_id);
                    touched.push(playlist);
                }
            }
            let now = now_secs();
            for mut playlist in touched {
                playlist.date_modified = now;
                let bytes = encode_value(&playlist)?;
                playlists.insert(playlist.id.as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Songs ordered by title.
    pub fn list_songs(&self, filter: &SongFilter) -> Result<Vec<Song>, LibraryError> {
        let artist = lowered(filter.artist.as_deref());
        let album = lowered(filter.album.as_deref());
        let genre = lowered(filter.genre.as_deref());

        self.songs_by_title(|song| {
            matches_filter(&song.artist, artist.as_deref())
                && matches_filter(&song.album, album.as_deref())
                && matches_filter(song.genre_or_empty(), genre.as_deref())
        })
    }

    pub fn all_songs(&self) -> Result<Vec<Song>, LibraryError> {
        self.songs_by_title(|_| true)
    }

    /// Substring search over title, artist and album, ordered by title.
    pub fn search_songs(&self, query: &str) -> Result<Vec<Song>, LibraryError> {
        let query = query.trim().to_lowercase();
        self.songs_by_title(|song| {
            song.title.to_lowercase().contains(&query)
                || song.artist.to_lowercase().contains(&query)
                || song.album.to_lowercase().contains(&query)
        })
    }

    /// Songs whose lowercased title and artist are identical, grouped in title
    /// order. Only groups with more than one song are returned.
    pub fn find_exact_duplicates(&self) -> Result<Vec<ExactDuplicate>, LibraryError> {
        let mut groups: BTreeMap<(String, String), ExactDuplicate> = BTreeMap::new();
        for song in self.all_songs()? {
            let key = (song.title.to_lowercase(), song.artist.to_lowercase());
            let group = groups.entry(key).or_insert_with(|| ExactDuplicate {
                title: song.title.clone(),
                artist: song.artist.clone(),
                count: 0,
                song_ids: Vec::new(),
            });
            group.count += 1;
            group.song_ids.push(song.id);
        }
        Ok(groups.into_values().filter(|group| group.count > 1).collect())
    }

    fn songs_by_title<F>(&self, mut keep: F) -> Result<Vec<Song>, LibraryError>
    where
        F: FnMut(&Song) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let by_title = read_txn.open_table(SONGS_BY_TITLE_TABLE)?;
        let songs = read_txn.open_table(SONGS_TABLE)?;

        let mut items = Vec::new();
        for entry in by_title.iter()? {
            let entry = entry?;
            let (_, song_id) = split_key_last(entry.0.value())?;
            if let Some(value) = songs.get(song_id)? {
                let song: Song = decode_value(value.value())?;
                if keep(&song) {
                    items.push(song);
                }
            }
        }
        Ok(items)
    }

    /// Playlists ordered by name.
    pub fn list_playlists(&self) -> Result<Vec<Playlist>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAYLISTS_TABLE)?;
        let mut items = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let playlist: Playlist = decode_value(entry.1.value())?;
            items.push(playlist);
        }
        items.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    pub fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAYLISTS_TABLE)?;
        let playlist = match table.get(playlist_id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(playlist)
    }

    pub fn create_playlist(&self, name: &str) -> Result<Playlist, LibraryError> {
        let now = now_secs();
        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            song_ids: Vec::new(),
            date_created: now,
            date_modified: now,
        };
        self.put_playlist(&playlist)?;
        Ok(playlist)
    }

    pub fn rename_playlist(
        &self,
        playlist_id: &str,
        name: &str,
    ) -> Result<Option<Playlist>, LibraryError> {
        let name = name.trim().to_string();
        self.modify_playlist(playlist_id, |playlist| {
            playlist.name = name;
            Ok(())
        })
    }

    pub fn delete_playlist(&self, playlist_id: &str) -> Result<bool, LibraryError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(PLAYLISTS_TABLE)?;
            let removed = table.remove(playlist_id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Appends a song to the end of a playlist. A song already in the
    /// playlist keeps its position.
    pub fn add_song_to_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> Result<Playlist, LibraryError> {
        if !self.contains_song(song_id)? {
            return Err(LibraryError::NotFound(format!("song {}", song_id)));
        }
        let song_id = song_id.to_string();
        self.modify_playlist(playlist_id, |playlist| {
            if !playlist.song_ids.contains(&song_id) {
                playlist.song_ids.push(song_id);
            }
            Ok(())
        })?
        .ok_or_else(|| LibraryError::NotFound(format!("playlist {}", playlist_id)))
    }

    /// Remaining songs keep their relative order.
    pub fn remove_song_from_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> Result<Option<Playlist>, LibraryError> {
        self.modify_playlist(playlist_id, |playlist| {
            playlist.song_ids.retain(|id| id != song_id);
            Ok(())
        })
    }

    /// Songs in playlist order; ids whose song row is gone are skipped.
    pub fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<Song>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let playlists = read_txn.open_table(PLAYLISTS_TABLE)?;
        let playlist: Playlist = match playlists.get(playlist_id)? {
            Some(value) => decode_value(value.value())?,
            None => return Err(LibraryError::NotFound(format!("playlist {}", playlist_id))),
        };

        let songs = read_txn.open_table(SONGS_TABLE)?;
        let mut items = Vec::with_capacity(playlist.song_ids.len());
        for song_id in &playlist.song_ids {
            if let Some(value) = songs.get(song_id.as_str())? {
                items.push(decode_value(value.value())?);
            }
        }
        Ok(items)
    }

    fn put_playlist(&self, playlist: &Playlist) -> Result<(), LibraryError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PLAYLISTS_TABLE)?;
            let bytes = encode_value(playlist)?;
            table.insert(playlist.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn modify_playlist<F>(
        &self,
        playlist_id: &str,
        change: F,
    ) -> Result<Option<Playlist>, LibraryError>
    where
        F: FnOnce(&mut Playlist) -> Result<(), LibraryError>,
    {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(PLAYLISTS_TABLE)?;
            let mut playlist: Playlist = match table.get(playlist_id)? {
                Some(value) => decode_value(value.value())?,
                None => return Ok(None),
            };
            change(&mut playlist)?;
            playlist.date_modified = now_secs();
            let bytes = encode_value(&playlist)?;
            table.insert(playlist_id, bytes.as_slice())?;
            playlist
        };
        write_txn.commit()?;
        Ok(Some(updated))
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;
        let value = table.get(key)?.map(|value| value.value().to_string());
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), LibraryError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    KeyParse(String),
    VersionMismatch(u32),
    SongExists(String),
    NotFound(String),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Redb(err) => write!(f, "db error: {}", err),
            LibraryError::Bincode(err) => write!(f, "bincode error: {}", err),
            LibraryError::KeyParse(value) => write!(f, "key parse error: {}", value),
            LibraryError::VersionMismatch(version) => {
                write!(f, "library schema version mismatch: {}", version)
            }
            LibraryError::SongExists(id) => write!(f, "song already exists: {}", id),
            LibraryError::NotFound(what) => write!(f, "not found: {}", what),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<redb::Error> for LibraryError {
    fn from(err: redb::Error) -> Self {
        LibraryError::Redb(err)
    }
}

impl From<DatabaseError> for LibraryError {
    fn from(err: DatabaseError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TableError> for LibraryError {
    fn from(err: TableError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TransactionError> for LibraryError {
    fn from(err: TransactionError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<StorageError> for LibraryError {
    fn from(err: StorageError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<CommitError> for LibraryError {
    fn from(err: CommitError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for LibraryError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LibraryError::Bincode(err)
    }
}

fn open_or_create_db(path: &Path) -> Result<Database, LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

fn read_version(db: &Database) -> Result<Option<u32>, LibraryError> {
    let read_txn = db.begin_read()?;
    let table = match read_txn.open_table(META_TABLE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let version = match table.get(META_VERSION_KEY)? {
        Some(value) => Some(decode_value(value.value())?),
        None => None,
    };
    Ok(version)
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, LibraryError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, LibraryError> {
    Ok(bincode::deserialize(bytes)?)
}

fn title_key(title: &str, song_id: &str) -> String {
    let mut out = String::new();
    out.push_str(title.trim().to_lowercase().as_str());
    out.push(KEY_SEP);
    out.push_str(song_id);
    out
}

fn split_key_last(value: &str) -> Result<(&str, &str), LibraryError> {
    let idx = value
        .rfind(KEY_SEP)
        .ok_or_else(|| LibraryError::KeyParse(value.to_string()))?;
    let next = idx + KEY_SEP.len_utf8();
    Ok((&value[..idx], &value[next..]))
}

fn lowered(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}

fn matches_filter(field: &str, needle: Option<&str>) -> bool {
    match needle {
        Some(needle) => field.to_lowercase().contains(needle),
        None => true,
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use common::compute_id;
    use tempfile::TempDir;

    pub(crate) fn open_temp() -> (TempDir, Library) {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(&dir.path().join("library.redb")).unwrap();
        (dir, library)
    }

    pub(crate) fn song(title: &str, artist: &str, album: &str) -> Song {
        let file_size = 1_000 + title.len() as u64 + artist.len() as u64;
        Song {
            id: compute_id(180, file_size, title),
            file_path: format!("/music/{}.mp3", title),
            original_file_path: None,
            original_format: None,
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            genre: None,
            duration: 180,
            file_size,
            track_number: None,
            year: None,
            date_added: 0,
            date_modified: 0,
        }
    }

    #[test]
    fn inserts_and_reads_songs() {
        let (_dir, library) = open_temp();
        let stored = library
            .insert_song(song("Tavern Song", "Medieval Minstrels", "Ale"))
            .unwrap();
        assert!(stored.date_added > 0);

        let loaded = library.get_song(&stored.id).unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert!(library.contains_song(&stored.id).unwrap());
        assert!(library.get_song("missing").unwrap().is_none());
        assert_eq!(library.song_count().unwrap(), 1);
    }

    #[test]
    fn refuses_duplicate_ids() {
        let (_dir, library) = open_temp();
        let first = song("Tavern Song", "Medieval Minstrels", "Ale");
        library.insert_song(first.clone()).unwrap();
        let err = library.insert_song(first.clone()).unwrap_err();
        assert!(matches!(err, LibraryError::SongExists(id) if id == first.id));
        assert_eq!(library.song_count().unwrap(), 1);
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.redb");
        let id = {
            let library = Library::open(&path).unwrap();
            library
                .insert_song(song("Dragon's Lair", "Epic Composer", "Quest"))
                .unwrap()
                .id
        };
        let library = Library::open(&path).unwrap();
        assert!(library.contains_song(&id).unwrap());
    }

    #[test]
    fn lists_by_title_with_filters() {
        let (_dir, library) = open_temp();
        let mut folk = song("Zephyr", "Wind Band", "Seasons");
        folk.genre = Some("Folk".to_string());
        library.insert_song(folk).unwrap();
        library
            .insert_song(song("anthem", "Epic Composer", "Quest"))
            .unwrap();
        library
            .insert_song(song("Battle Hymn", "Epic Composer", "Quest II"))
            .unwrap();

        let titles: Vec<String> = library
            .all_songs()
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["anthem", "Battle Hymn", "Zephyr"]);

        let filter = SongFilter {
            artist: Some("epic".to_string()),
            album: Some("quest ii".to_string()),
            ..SongFilter::default()
        };
        let found = library.list_songs(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Battle Hymn");

        let filter = SongFilter {
            genre: Some("FOLK".to_string()),
            ..SongFilter::default()
        };
        assert_eq!(library.list_songs(&filter).unwrap()[0].title, "Zephyr");
    }

    #[test]
    fn searches_title_artist_and_album() {
        let (_dir, library) = open_temp();
        library
            .insert_song(song("Tavern Song", "Medieval Minstrels", "Ale"))
            .unwrap();
        library
            .insert_song(song("Dragon's Lair", "Epic Composer", "Tavern Tales"))
            .unwrap();
        library
            .insert_song(song("Sunrise", "Morning Choir", "Dawn"))
            .unwrap();

        let titles: Vec<String> = library
            .search_songs("TAVERN")
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Dragon's Lair", "Tavern Song"]);
        assert_eq!(library.search_songs("choir").unwrap().len(), 1);
        assert!(library.search_songs("nothing like it").unwrap().is_empty());
    }

    #[test]
    fn updates_fields_and_title_index() {
        let (_dir, library) = open_temp();
        let a = library.insert_song(song("Alpha", "One", "A")).unwrap();
        library.insert_song(song("Beta", "Two", "B")).unwrap();

        let updated = library
            .update_song(
                &a.id,
                SongUpdate {
                    title: Some("Zulu".to_string()),
                    year: Some(Some(2001)),
                    ..SongUpdate::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Zulu");
        assert_eq!(updated.year, Some(2001));
        // id is content-derived at import and never regenerated on edit
        assert_eq!(updated.id, a.id);

        let titles: Vec<String> = library
            .all_songs()
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Beta", "Zulu"]);

        assert!(library
            .update_song("missing", SongUpdate::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn empty_update_leaves_song_untouched() {
        let (_dir, library) = open_temp();
        let stored = library.insert_song(song("Alpha", "One", "A")).unwrap();
        let stamped = stored.date_modified;

        let same = library
            .update_song(&stored.id, SongUpdate::default())
            .unwrap()
            .unwrap();
        assert_eq!(same, stored);
        assert_eq!(same.date_modified, stamped);
    }

    #[test]
    fn finds_exact_duplicates() {
        let (_dir, library) = open_temp();
        let mut first = song("Tavern Song", "Medieval Minstrels", "Ale");
        first.id = compute_id(1, 1, "a");
        let mut second = song("tavern song", "MEDIEVAL MINSTRELS", "Ale");
        second.id = compute_id(2, 2, "b");
        library.insert_song(first.clone()).unwrap();
        library.insert_song(second.clone()).unwrap();
        library
            .insert_song(song("Dragon's Lair", "Epic Composer", "Quest"))
            .unwrap();

        let duplicates = library.find_exact_duplicates().unwrap();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].count, 2);
        let mut ids = duplicates[0].song_ids.clone();
        ids.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn manages_playlists() {
        let (_dir, library) = open_temp();
        let a = library.insert_song(song("Alpha", "One", "A")).unwrap();
        let b = library.insert_song(song("Beta", "Two", "B")).unwrap();
        let c = library.insert_song(song("Gamma", "Three", "C")).unwrap();

        let road = library.create_playlist("Road Trip").unwrap();
        library.create_playlist("ambient").unwrap();
        let names: Vec<String> = library
            .list_playlists()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["ambient", "Road Trip"]);

        for id in [&c.id, &a.id, &b.id, &a.id] {
            library.add_song_to_playlist(&road.id, id).unwrap();
        }
        let order: Vec<String> = library
            .playlist_songs(&road.id)
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(order, vec!["Gamma", "Alpha", "Beta"]);

        library.remove_song_from_playlist(&road.id, &a.id).unwrap();
        let playlist = library.get_playlist(&road.id).unwrap().unwrap();
        assert_eq!(playlist.song_ids, vec![c.id.clone(), b.id.clone()]);

        let renamed = library
            .rename_playlist(&road.id, " Long Road ")
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Long Road");

        assert!(library.delete_playlist(&road.id).unwrap());
        assert!(!library.delete_playlist(&road.id).unwrap());
        assert!(library.get_playlist(&road.id).unwrap().is_none());
    }

    #[test]
    fn playlist_additions_require_known_rows() {
        let (_dir, library) = open_temp();
        let a = library.insert_song(song("Alpha", "One", "A")).unwrap();
        let playlist = library.create_playlist("Mix").unwrap();

        let err = library
            .add_song_to_playlist(&playlist.id, "unknown")
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
        let err = library.add_song_to_playlist("nope", &a.id).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
        assert!(matches!(
            library.playlist_songs("nope"),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_song_cleans_playlists() {
        let (_dir, library) = open_temp();
        let a = library.insert_song(song("Alpha", "One", "A")).unwrap();
        let b = library.insert_song(song("Beta", "Two", "B")).unwrap();
        let playlist = library.create_playlist("Mix").unwrap();
        library.add_song_to_playlist(&playlist.id, &a.id).unwrap();
        library.add_song_to_playlist(&playlist.id, &b.id).unwrap();

        assert!(library.delete_song(&a.id).unwrap());
        assert!(!library.delete_song(&a.id).unwrap());
        assert!(library.get_song(&a.id).unwrap().is_none());

        let playlist = library.get_playlist(&playlist.id).unwrap().unwrap();
        assert_eq!(playlist.song_ids, vec![b.id.clone()]);
        assert_eq!(library.all_songs().unwrap().len(), 1);
    }

    #[test]
    fn stores_settings() {
        let (_dir, library) = open_temp();
        assert!(library.get_setting("volume").unwrap().is_none());
        library.set_setting("volume", "0.8").unwrap();
        library.set_setting("volume", "0.5").unwrap();
        assert_eq!(library.get_setting("volume").unwrap().as_deref(), Some("0.5"));
    }

    #[test]
    fn stored_songs_feed_duplicate_grouping() {
        let (_dir, library) = open_temp();
        library
            .insert_song(song("Tavern Song", "Medieval Minstrels", "Ale"))
            .unwrap();
        let mut copy = song("tavern song", "medieval minstrels", "Ale");
        copy.id = compute_id(181, 4_096, "tavern song");
        library.insert_song(copy).unwrap();
        library
            .insert_song(song("Dragon's Lair", "Epic Composer", "Quest"))
            .unwrap();

        let songs = library.all_songs().unwrap();
        let groups = dedup::find_duplicate_groups(&songs, dedup::DEFAULT_THRESHOLD);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count(), 2);
        assert!(groups[0]
            .songs()
            .all(|s| s.title.eq_ignore_ascii_case("tavern song")));
    }
}
