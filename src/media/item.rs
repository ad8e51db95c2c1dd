//! Media items as submitted by a user.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Media category. Wire names follow the record store (`img`, `video`, `audio`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "img", alias = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "audio")]
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "img",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Parse a wire name or the top-level part of a MIME type.
    pub fn parse(value: &str) -> Option<Self> {
        let head = value.split('/').next().unwrap_or(value);
        match head.trim().to_ascii_lowercase().as_str() {
            "img" | "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => Some(MediaKind::Image),
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "flv" => Some(MediaKind::Video),
            "mp3" | "wav" | "ogg" | "aac" | "flac" | "m4a" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    /// Multipart field prefix used by the record store (`images`, `videos`, `audios`).
    pub fn field_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
            MediaKind::Audio => "audios",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single piece of media. Never mutated once a pipeline run starts.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub raw_bytes: Vec<u8>,
    pub display_name: String,
    pub media_kind: MediaKind,
    pub description: String,
}

impl MediaItem {
    pub fn new(
        raw_bytes: Vec<u8>,
        display_name: &str,
        media_kind: MediaKind,
        description: &str,
    ) -> Self {
        Self {
            raw_bytes,
            display_name: display_name.to_string(),
            media_kind,
            description: description.to_string(),
        }
    }

    /// Read a file, inferring the kind from its extension.
    pub fn from_path(path: &Path, description: &str) -> io::Result<Self> {
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaKind::from_extension)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported media type: {}", path.display()),
                )
            })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("untitled")
            .to_string();
        let bytes = fs::read(path)?;
        Ok(Self::new(bytes, &name, kind, description))
    }

    pub fn size(&self) -> usize {
        self.raw_bytes.len()
    }

    /// MIME type from the file extension, falling back to `<kind>/*`.
    pub fn content_type(&self) -> String {
        let ext = Path::new(&self.display_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let subtype = match ext.as_str() {
            "jpg" | "jpeg" => "jpeg",
            "svg" => "svg+xml",
            "mov" => "quicktime",
            "mkv" => "x-matroska",
            "avi" => "x-msvideo",
            "flv" => "x-flv",
            "mp3" => "mpeg",
            "m4a" => "mp4",
            "png" | "gif" | "webp" | "mp4" | "webm" | "wav" | "ogg" | "aac" | "flac" => ext.as_str(),
            _ => "*",
        };
        let top = match self.media_kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        };
        format!("{}/{}", top, subtype)
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("display_name", &self.display_name)
            .field("media_kind", &self.media_kind)
            .field("size", &self.raw_bytes.len())
            .finish()
    }
}
