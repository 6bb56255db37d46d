//! Upload intake: validates a user file and turns it into an immutable [`Source`].

use crate::prelude::{DashResult, DashboardError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Family of inputs a page accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalFamily {
    Audio,
    Tabular,
    Image,
}

impl SignalFamily {
    pub fn admits(&self, name: &str, media_type: &str) -> bool {
        let media_type = media_type.trim().to_ascii_lowercase();
        match self {
            SignalFamily::Audio => media_type.starts_with("audio/"),
            SignalFamily::Image => media_type.starts_with("image/"),
            SignalFamily::Tabular => {
                let name = name.to_ascii_lowercase();
                media_type == "text/csv"
                    || media_type == "application/x-npy"
                    || name.ends_with(".csv")
                    || name.ends_with(".npy")
            }
        }
    }
}

impl fmt::Display for SignalFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalFamily::Audio => "audio",
            SignalFamily::Tabular => "tabular signal",
            SignalFamily::Image => "image",
        };
        f.write_str(label)
    }
}

/// Guesses a media type from a file extension.
pub fn guess_media_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "csv" => "text/csv",
        "npy" => "application/x-npy",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// A file as handed over by the user, before validation.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let media_type = guess_media_type(&name).to_string();
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }
}

/// Stable reference the player and the service use for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHandle {
    ObjectUrl(String),
    DataUri(String),
}

impl SourceHandle {
    pub fn as_str(&self) -> &str {
        match self {
            SourceHandle::ObjectUrl(url) | SourceHandle::DataUri(url) => url,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DataUriError {
    #[error("not a data: URI")]
    MissingScheme,
    #[error("data URI is not base64 encoded")]
    NotBase64,
    #[error(transparent)]
    Decode(#[from] base64::DecodeError),
}

#[derive(Debug)]
struct SourceInner {
    name: String,
    media_type: String,
    family: SignalFamily,
    bytes: Vec<u8>,
    handle: SourceHandle,
}

/// Immutable, cheaply clonable user signal.
#[derive(Debug, Clone)]
pub struct Source {
    inner: Arc<SourceInner>,
}

impl Source {
    fn from_raw(raw: RawFile, family: SignalFamily) -> Self {
        let handle = SourceHandle::ObjectUrl(format!("blob:sigdash/{}", uuid::Uuid::new_v4()));
        Self {
            inner: Arc::new(SourceInner {
                name: raw.name,
                media_type: raw.media_type,
                family,
                bytes: raw.bytes,
                handle,
            }),
        }
    }

    /// Decodes a base64 `data:` URI returned by the service.
    pub fn from_data_uri(name: impl Into<String>, uri: &str) -> Result<Self, DataUriError> {
        let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingScheme)?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or(DataUriError::NotBase64)?;
        let media_type = if media_type.is_empty() {
            "application/octet-stream"
        } else {
            media_type
        };
        let bytes = STANDARD.decode(payload.trim())?;
        let family = if media_type.starts_with("image/") {
            SignalFamily::Image
        } else if media_type.starts_with("audio/") {
            SignalFamily::Audio
        } else {
            SignalFamily::Tabular
        };
        Ok(Self {
            inner: Arc::new(SourceInner {
                name: name.into(),
                media_type: media_type.to_string(),
                family,
                bytes,
                handle: SourceHandle::DataUri(uri.to_string()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn media_type(&self) -> &str {
        &self.inner.media_type
    }

    pub fn family(&self) -> SignalFamily {
        self.inner.family
    }

    pub fn bytes(&self) -> &[u8] {
        &self.inner.bytes
    }

    pub fn handle(&self) -> &SourceHandle {
        &self.inner.handle
    }

    pub fn to_data_uri(&self) -> String {
        match &self.inner.handle {
            SourceHandle::DataUri(uri) => uri.clone(),
            SourceHandle::ObjectUrl(_) => format!(
                "data:{};base64,{}",
                self.inner.media_type,
                STANDARD.encode(&self.inner.bytes)
            ),
        }
    }

    pub fn same_as(&self, other: &Source) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Owns the current source of one page.
#[derive(Debug)]
pub struct UploadIntake {
    family: SignalFamily,
    current: Option<Source>,
    accepted: u64,
}

impl UploadIntake {
    pub fn new(family: SignalFamily) -> Self {
        Self {
            family,
            current: None,
            accepted: 0,
        }
    }

    pub fn family(&self) -> SignalFamily {
        self.family
    }

    /// Validates `raw` and makes it the current source. A rejected file
    /// leaves the previous source in place.
    pub fn accept(&mut self, raw: RawFile) -> DashResult<Source> {
        if !self.family.admits(&raw.name, &raw.media_type) {
            return Err(DashboardError::InvalidFileType {
                name: raw.name,
                media_type: raw.media_type,
                expected: self.family,
            });
        }
        let source = Source::from_raw(raw, self.family);
        self.current = Some(source.clone());
        self.accepted += 1;
        Ok(source)
    }

    pub fn current(&self) -> Option<&Source> {
        self.current.as_ref()
    }

    /// Number of sources accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn teardown(&mut self) {
        self.current = None;
    }
}
