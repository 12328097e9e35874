//! Bringing audio files into the library.
//!
//! Each file gets a content-derived id: the one already stored in its
//! `BARDIC_ID` frame when valid, otherwise one computed from duration, size and
//! title and written back to the file. Files whose id is already in the store
//! are skipped. One bad file never aborts the batch; its error is recorded in
//! the report instead.

use std::fmt;
use std::fs;
use std::path::Path;

use common::{compute_id, is_valid_id, Song};
use metadata::{MetadataError, TagInfo};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::scan::is_mp3;
use crate::{Library, LibraryError};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Tag access used by the importer.
pub trait TagSource {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError>;
    fn read_bardic_id(&self, path: &Path) -> Result<Option<String>, MetadataError>;
    fn write_bardic_id(&self, path: &Path, id: &str) -> Result<(), MetadataError>;
}

/// Reads and writes real files through lofty.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileTags;

impl TagSource for FileTags {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        metadata::read_tags(path)
    }

    fn read_bardic_id(&self, path: &Path) -> Result<Option<String>, MetadataError> {
        metadata::read_bardic_id(path)
    }

    fn write_bardic_id(&self, path: &Path, id: &str) -> Result<(), MetadataError> {
        metadata::write_bardic_id(path, id)
    }
}

#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Reject anything that is not `.mp3`.
    pub mp3_only: bool,
    /// Store freshly computed ids in the file's `BARDIC_ID` frame.
    pub write_bardic_id: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mp3_only: true,
            write_bardic_id: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Processing,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportProgress {
    /// 1-based position of the file being processed.
    pub current: usize,
    pub total: usize,
    /// File name; absent on the final event.
    pub file: Option<String>,
    pub status: ImportStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportFailure {
    pub file: String,
    pub path: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<ImportFailure>,
    pub imported_songs: Vec<Song>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportOutcome {
    Imported(Song),
    /// Holds the id that was already present.
    Skipped(String),
}

#[derive(Debug)]
pub enum ImportError {
    FileNotFound,
    Unsupported(String),
    Io(std::io::Error),
    Metadata(MetadataError),
    Library(LibraryError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::FileNotFound => write!(f, "file not found"),
            ImportError::Unsupported(ext) => {
                write!(f, "only mp3 files are supported (got {})", ext)
            }
            ImportError::Io(err) => write!(f, "io error: {}", err),
            ImportError::Metadata(err) => write!(f, "failed to read metadata: {}", err),
            ImportError::Library(err) => write!(f, "failed to add to library: {}", err),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err)
    }
}

impl From<MetadataError> for ImportError {
    fn from(err: MetadataError) -> Self {
        ImportError::Metadata(err)
    }
}

impl From<LibraryError> for ImportError {
    fn from(err: LibraryError) -> Self {
        ImportError::Library(err)
    }
}

pub struct Importer<'a, S: TagSource> {
    library: &'a Library,
    tags: S,
    options: ImportOptions,
}

impl<'a> Importer<'a, FileTags> {
    pub fn new(library: &'a Library, options: ImportOptions) -> Self {
        Self::with_tags(library, FileTags, options)
    }
}

impl<'a, S: TagSource> Importer<'a, S> {
    pub fn with_tags(library: &'a Library, tags: S, options: ImportOptions) -> Self {
        Self {
            library,
            tags,
            options,
        }
    }

    pub fn import_files<P, F>(&self, paths: &[P], mut progress: F) -> ImportReport
    where
        P: AsRef<Path>,
        F: FnMut(&ImportProgress),
    {
        let total = paths.len();
        let mut report = ImportReport {
            total,
            ..ImportReport::default()
        };

        for (idx, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let file = file_name(path);
            progress(&ImportProgress {
                current: idx + 1,
                total,
                file: Some(file.clone()),
                status: ImportStatus::Processing,
            });

            match self.import_file(path) {
                Ok(ImportOutcome::Imported(song)) => {
                    info!("Imported {} by {}", song.title, song.artist);
                    report.imported += 1;
                    report.imported_songs.push(song);
                }
                Ok(ImportOutcome::Skipped(id)) => {
                    debug!("Skipping {:?}: {} already in library", path, id);
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!("Failed to import {:?}: {}", path, err);
                    report.failed += 1;
                    report.errors.push(ImportFailure {
                        file,
                        path: path.to_string_lossy().into_owned(),
                        error: err.to_string(),
                    });
                }
            }
        }

        progress(&ImportProgress {
            current: total,
            total,
            file: None,
            status: ImportStatus::Complete,
        });
        info!(
            "Import finished: {} imported, {} skipped, {} failed",
            report.imported, report.skipped, report.failed
        );
        report
    }

    pub fn import_file(&self, path: &Path) -> Result<ImportOutcome, ImportError> {
        if !path.is_file() {
            return Err(ImportError::FileNotFound);
        }
        let mp3 = is_mp3(path);
        if self.options.mp3_only && !mp3 {
            let ext = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            return Err(ImportError::Unsupported(ext));
        }

        let tags = self.tags.read_tags(path)?;
        let file_size = fs::metadata(path)?.len();
        let title = tags
            .title
            .clone()
            .unwrap_or_else(|| file_stem(path));

        let id = match self.stored_id(path, mp3) {
            Some(id) => id,
            None => {
                let id = compute_id(tags.duration, file_size, &title);
                if self.options.write_bardic_id && mp3 {
                    if let Err(err) = self.tags.write_bardic_id(path, &id) {
                        warn!("Failed to write BARDIC_ID to {:?}: {}", path, err);
                    }
                }
                id
            }
        };

        if self.library.contains_song(&id)? {
            return Ok(ImportOutcome::Skipped(id));
        }

        let song = Song {
            id,
            file_path: path.to_string_lossy().into_owned(),
            original_file_path: None,
            original_format: None,
            title,
            artist: tags.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: tags.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            genre: tags.genre,
            duration: tags.duration,
            file_size,
            track_number: tags.track_number,
            year: tags.year,
            date_added: 0,
            date_modified: 0,
        };

        match self.library.insert_song(song) {
            Ok(song) => Ok(ImportOutcome::Imported(song)),
            Err(LibraryError::SongExists(id)) => Ok(ImportOutcome::Skipped(id)),
            Err(err) => Err(err.into()),
        }
    }

    fn stored_id(&self, path: &Path, mp3: bool) -> Option<String> {
        if !mp3 {
            return None;
        }
        match self.tags.read_bardic_id(path) {
            Ok(Some(id)) if is_valid_id(&id) => Some(id),
            Ok(Some(id)) => {
                warn!("Ignoring malformed BARDIC_ID {:?} in {:?}", id, path);
                None
            }
            Ok(None) => None,
            Err(err) => {
                debug!("Could not read BARDIC_ID from {:?}: {}", path, err);
                None
            }
        }
    }
}

pub fn import_files<P, F>(
    library: &Library,
    paths: &[P],
    options: &ImportOptions,
    progress: F,
) -> ImportReport
where
    P: AsRef<Path>,
    F: FnMut(&ImportProgress),
{
    Importer::new(library, options.clone()).import_files(paths, progress)
}

pub fn import_file(
    library: &Library,
    path: &Path,
    options: &ImportOptions,
) -> Result<ImportOutcome, ImportError> {
    Importer::new(library, options.clone()).import_file(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::open_temp;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeTags {
        tags: HashMap<PathBuf, TagInfo>,
        ids: RefCell<HashMap<PathBuf, String>>,
        fail_writes: bool,
    }

    impl FakeTags {
        fn with(mut self, path: &Path, info: TagInfo) -> Self {
            self.tags.insert(path.to_path_buf(), info);
            self
        }
    }

    impl TagSource for FakeTags {
        fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError> {
            self.tags.get(path).cloned().ok_or_else(|| {
                MetadataError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "no tags",
                ))
            })
        }

        fn read_bardic_id(&self, path: &Path) -> Result<Option<String>, MetadataError> {
            Ok(self.ids.borrow().get(path).cloned())
        }

        fn write_bardic_id(&self, path: &Path, id: &str) -> Result<(), MetadataError> {
            if self.fail_writes {
                return Err(MetadataError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.ids
                .borrow_mut()
                .insert(path.to_path_buf(), id.to_string());
            Ok(())
        }
    }

    fn write_file(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    fn tags(title: Option<&str>, artist: Option<&str>, duration: u32) -> TagInfo {
        TagInfo {
            title: title.map(str::to_string),
            artist: artist.map(str::to_string),
            duration,
            format: "mp3".to_string(),
            ..TagInfo::default()
        }
    }

    #[test]
    fn imports_new_files_with_fallbacks() {
        let (dir, library) = open_temp();
        let tavern = write_file(dir.path(), "tavern.mp3", 2_048);
        let untitled = write_file(dir.path(), "Night Watch.mp3", 1_024);
        let fake = FakeTags::default()
            .with(&tavern, tags(Some("Tavern Song"), Some("Medieval Minstrels"), 180))
            .with(&untitled, tags(None, None, 95));

        let importer = Importer::with_tags(&library, fake, ImportOptions::default());
        let mut events = Vec::new();
        let report = importer.import_files(&[&tavern, &untitled], |p| events.push(p.clone()));

        assert_eq!(report.total, 2);
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(library.song_count().unwrap(), 2);

        let first = &report.imported_songs[0];
        assert_eq!(first.id, compute_id(180, 2_048, "Tavern Song"));
        assert_eq!(first.album, UNKNOWN_ALBUM);

        let second = &report.imported_songs[1];
        assert_eq!(second.title, "Night Watch");
        assert_eq!(second.artist, UNKNOWN_ARTIST);
        assert_eq!(second.id, compute_id(95, 1_024, "Night Watch"));

        assert_eq!(
            importer.tags.ids.borrow().get(&tavern).map(String::as_str),
            Some(first.id.as_str())
        );

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].current, 1);
        assert_eq!(events[0].file.as_deref(), Some("tavern.mp3"));
        assert_eq!(events[1].status, ImportStatus::Processing);
        assert_eq!(events[2].status, ImportStatus::Complete);
        assert_eq!(events[2].current, 2);
        assert!(events[2].file.is_none());
    }

    #[test]
    fn reimport_is_skipped() {
        let (dir, library) = open_temp();
        let path = write_file(dir.path(), "song.mp3", 512);
        let fake = FakeTags::default().with(&path, tags(Some("Song"), Some("Bard"), 60));
        let importer = Importer::with_tags(&library, fake, ImportOptions::default());

        let first = importer.import_files(&[&path], |_| {});
        assert_eq!(first.imported, 1);
        let second = importer.import_files(&[&path], |_| {});
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(library.song_count().unwrap(), 1);
    }

    #[test]
    fn records_failures_and_continues() {
        let (dir, library) = open_temp();
        let good = write_file(dir.path(), "good.mp3", 300);
        let flac = write_file(dir.path(), "lossless.flac", 300);
        let untagged = write_file(dir.path(), "broken.mp3", 300);
        let missing = dir.path().join("missing.mp3");
        let fake = FakeTags::default()
            .with(&good, tags(Some("Good"), Some("Band"), 10))
            .with(&flac, tags(Some("Lossless"), Some("Band"), 10));

        let importer = Importer::with_tags(&library, fake, ImportOptions::default());
        let report = importer.import_files(&[&missing, &flac, &untagged, &good], |_| {});

        assert_eq!(report.total, 4);
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.errors[0].file, "missing.mp3");
        assert_eq!(report.errors[0].error, "file not found");
        assert!(report.errors[1].error.contains("only mp3"));
        assert_eq!(report.errors[2].path, untagged.to_string_lossy());
        assert!(report.errors[2].error.starts_with("failed to read metadata"));
    }

    #[test]
    fn other_formats_import_when_allowed() {
        let (dir, library) = open_temp();
        let flac = write_file(dir.path(), "lossless.flac", 300);
        let fake = FakeTags::default().with(&flac, tags(Some("Lossless"), Some("Band"), 10));
        let options = ImportOptions {
            mp3_only: false,
            ..ImportOptions::default()
        };
        let importer = Importer::with_tags(&library, fake, options);

        let outcome = importer.import_file(&flac).unwrap();
        assert!(matches!(outcome, ImportOutcome::Imported(_)));
        // only mp3 files carry the id frame
        assert!(importer.tags.ids.borrow().is_empty());
    }

    #[test]
    fn prefers_valid_stored_id() {
        let (dir, library) = open_temp();
        let path = write_file(dir.path(), "song.mp3", 700);
        let stored = compute_id(1, 2, "somewhere else");
        let fake = FakeTags::default().with(&path, tags(Some("Song"), None, 30));
        fake.ids.borrow_mut().insert(path.clone(), stored.clone());
        let importer = Importer::with_tags(&library, fake, ImportOptions::default());

        match importer.import_file(&path).unwrap() {
            ImportOutcome::Imported(song) => assert_eq!(song.id, stored),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn ignores_malformed_stored_id() {
        let (dir, library) = open_temp();
        let path = write_file(dir.path(), "song.mp3", 700);
        let fake = FakeTags::default().with(&path, tags(Some("Song"), None, 30));
        fake.ids
            .borrow_mut()
            .insert(path.clone(), "not-an-id".to_string());
        let importer = Importer::with_tags(&library, fake, ImportOptions::default());

        match importer.import_file(&path).unwrap() {
            ImportOutcome::Imported(song) => {
                assert_eq!(song.id, compute_id(30, 700, "Song"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn id_write_failure_is_not_fatal() {
        let (dir, library) = open_temp();
        let path = write_file(dir.path(), "song.mp3", 700);
        let mut fake = FakeTags::default().with(&path, tags(Some("Song"), None, 30));
        fake.fail_writes = true;
        let importer = Importer::with_tags(&library, fake, ImportOptions::default());

        let report = importer.import_files(&[&path], |_| {});
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn skips_id_write_when_disabled() {
        let (dir, library) = open_temp();
        let path = write_file(dir.path(), "song.mp3", 700);
        let fake = FakeTags::default().with(&path, tags(Some("Song"), None, 30));
        let options = ImportOptions {
            write_bardic_id: false,
            ..ImportOptions::default()
        };
        let importer = Importer::with_tags(&library, fake, options);

        importer.import_file(&path).unwrap();
        assert!(importer.tags.ids.borrow().is_empty());
    }

    #[test]
    fn file_importer_reports_missing_files() {
        let (dir, library) = open_temp();
        let missing = dir.path().join("gone.mp3");
        let err = import_file(&library, &missing, &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound));

        let report = import_files(&library, &[&missing], &ImportOptions::default(), |_| {});
        assert_eq!(report.failed, 1);
        assert!(report.imported_songs.is_empty());
    }
}
