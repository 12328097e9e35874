use std::fmt;
use std::fs::File;
use std::path::Path;

use lofty::config::{ParseOptions, WriteOptions};
use lofty::error::LoftyError;
use lofty::file::FileType;
use lofty::id3::v2::Id3v2Tag;
use lofty::mpeg::MpegFile;
use lofty::prelude::{Accessor, AudioFile, ItemKey, TagExt, TaggedFileExt};
use lofty::tag::Tag;

/// Description of the ID3v2 user text frame (TXXX) holding the song id.
pub const BARDIC_ID_KEY: &str = "BARDIC_ID";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    /// Multiple genre values joined with ", ".
    pub genre: Option<String>,
    pub track_number: Option<u16>,
    /// Rounded to whole seconds; 0 when the container reports nothing.
    pub duration: u32,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub format: String,
}

/// Fields to write back into a file's primary tag. `None` leaves a field
/// alone; `Some(None)` on nullable fields removes it.
#[derive(Debug, Default, Clone)]
pub struct TagWrite {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<Option<String>>,
    pub year: Option<Option<i32>>,
    pub track_number: Option<Option<u16>>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

pub fn read_tags(path: &Path) -> Result<TagInfo, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let properties = tagged_file.properties();

    let mut info = TagInfo {
        duration: round_secs(properties.duration().as_millis()),
        bitrate: properties.audio_bitrate().or(properties.overall_bitrate()),
        sample_rate: properties.sample_rate(),
        format: format_name(tagged_file.file_type()),
        ..TagInfo::default()
    };

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        info.title = non_empty(tag.get_string(&ItemKey::TrackTitle));
        info.artist = non_empty(
            tag.get_string(&ItemKey::TrackArtist)
                .or_else(|| tag.get_string(&ItemKey::AlbumArtist)),
        );
        info.album = non_empty(tag.get_string(&ItemKey::AlbumTitle));
        info.track_number = tag
            .get_string(&ItemKey::TrackNumber)
            .and_then(parse_u16);
        info.year = tag.get_string(&ItemKey::Year).and_then(parse_year);
        info.genre = tag
            .get_string(&ItemKey::Genre)
            .map(parse_genres)
            .filter(|genres| !genres.is_empty())
            .map(|genres| genres.join(", "));
    }

    Ok(info)
}

pub fn write_tags(path: &Path, update: &TagWrite) -> Result<(), MetadataError> {
    let mut tagged_file = lofty::read_from_path(path)?;
    if tagged_file.primary_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged_file.primary_tag_mut() else {
        return Ok(());
    };

    if let Some(title) = &update.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &update.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &update.album {
        tag.set_album(album.clone());
    }
    match &update.genre {
        Some(Some(genre)) => tag.set_genre(genre.clone()),
        Some(None) => tag.remove_genre(),
        None => {}
    }
    match update.year {
        Some(Some(year)) if year > 0 => tag.set_year(year as u32),
        Some(_) => tag.remove_year(),
        None => {}
    }
    match update.track_number {
        Some(Some(track)) => tag.set_track(u32::from(track)),
        Some(None) => tag.remove_track(),
        None => {}
    }

    tag.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

/// Reads the `TXXX:BARDIC_ID` frame of an MP3 file.
pub fn read_bardic_id(path: &Path) -> Result<Option<String>, MetadataError> {
    let mpeg = read_mpeg(path)?;
    let id = mpeg
        .id3v2()
        .and_then(|tag| tag.get_user_text(BARDIC_ID_KEY))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    Ok(id)
}

/// Stores `id` in the `TXXX:BARDIC_ID` frame, replacing any previous value and
/// creating the ID3v2 tag when the file has none.
pub fn write_bardic_id(path: &Path, id: &str) -> Result<(), MetadataError> {
    let mpeg = read_mpeg(path)?;
    let mut tag: Id3v2Tag = mpeg.id3v2().cloned().unwrap_or_default();
    tag.insert_user_text(BARDIC_ID_KEY.to_string(), id.to_string());
    tag.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

/// `m:ss`, used when listing songs.
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn read_mpeg(path: &Path) -> Result<MpegFile, MetadataError> {
    let mut file = File::open(path)?;
    Ok(MpegFile::read_from(&mut file, ParseOptions::new())?)
}

fn round_secs(millis: u128) -> u32 {
    let secs = (millis + 500) / 1000;
    secs.min(u128::from(u32::MAX)) as u32
}

fn format_name(file_type: FileType) -> String {
    match file_type {
        FileType::Mpeg => "mp3".to_string(),
        FileType::Flac => "flac".to_string(),
        FileType::Mp4 => "mp4".to_string(),
        FileType::Vorbis => "ogg".to_string(),
        FileType::Opus => "opus".to_string(),
        FileType::Wav => "wav".to_string(),
        FileType::Aac => "aac".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn parse_u16(text: &str) -> Option<u16> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn parse_year(text: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            if digits.len() == 4 {
                break;
            }
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn parse_genres(text: &str) -> Vec<String> {
    text.split(&[';', ',', '/', '|', '\0'][..])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
