use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "wma"];

/// Summary of what an import of `files` would cover.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportInfo {
    pub total: usize,
    pub mp3_files: usize,
    pub unsupported_files: usize,
    pub can_import: bool,
    pub files: Vec<PathBuf>,
}

/// Extension check only; the file does not have to exist.
pub fn has_audio_extension(path: &Path) -> bool {
    extension_lower(path)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True for an existing regular file with a known audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.is_file() && has_audio_extension(path)
}

pub fn is_mp3(path: &Path) -> bool {
    extension_lower(path).as_deref() == Some("mp3")
}

pub fn scan_folder(root: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("folder does not exist: {}", root.display()),
        ));
    }

    let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {:?}: {}", root, err);
                continue;
            }
        };
        if entry.file_type().is_file() && has_audio_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Expands a mix of files and folders into a sorted, de-duplicated list of
/// audio files. Paths that cannot be read are logged and skipped.
pub fn collect_audio_files<P: AsRef<Path>>(paths: &[P], recursive: bool) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            match scan_folder(path, recursive) {
                Ok(files) => found.extend(files),
                Err(err) => warn!("Failed to scan {:?}: {}", path, err),
            }
        } else if is_audio_file(path) {
            found.insert(path.to_path_buf());
        } else if !path.exists() {
            warn!("Path does not exist: {:?}", path);
        }
    }
    found.into_iter().collect()
}

pub fn filter_mp3_files<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| path.as_ref())
        .filter(|path| is_mp3(path))
        .map(Path::to_path_buf)
        .collect()
}

pub fn import_info<P: AsRef<Path>>(paths: &[P]) -> ImportInfo {
    let files = filter_mp3_files(paths);
    ImportInfo {
        total: paths.len(),
        mp3_files: files.len(),
        unsupported_files: paths.len() - files.len(),
        can_import: !files.is_empty(),
        files,
    }
}

fn extension_lower(path: &Path) -> Option<String> {
    Some(path.extension()?.to_string_lossy().to_ascii_lowercase())
}
