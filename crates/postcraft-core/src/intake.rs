//! Image intake: turns uploaded files into session slots.
//!
//! Checks extension, size and magic bytes before anything reaches a
//! provider. Only the first few files are kept; the rest are counted so the
//! caller can warn.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::types::{mime_type_for_filename, ImageSlot, SlotIndex};
use std::path::Path;

/// Result of loading a batch of uploads.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    /// Accepted images, numbered in upload order
    pub slots: Vec<ImageSlot>,
    /// Files ignored because the slot limit was reached
    pub truncated: usize,
    /// Files that failed validation
    pub rejected: Vec<UploadError>,
}

/// Validates and numbers uploaded images.
pub struct ImageIntake {
    config: UploadConfig,
}

impl ImageIntake {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Load in-memory uploads given as `(filename, bytes)` pairs.
    pub fn load_bytes(&self, uploads: Vec<(String, Vec<u8>)>) -> UploadOutcome {
        let mut outcome = UploadOutcome {
            truncated: uploads.len().saturating_sub(self.config.max_slots),
            ..Default::default()
        };
        if outcome.truncated > 0 {
            tracing::warn!(
                "You can only upload up to {} images. Only the first {} will be used.",
                self.config.max_slots,
                self.config.max_slots
            );
        }

        for (name, bytes) in uploads.into_iter().take(self.config.max_slots) {
            match self.accept(name, bytes, outcome.slots.len()) {
                Ok(slot) => outcome.slots.push(slot),
                Err(e) => {
                    tracing::warn!("Skipping upload: {e}");
                    outcome.rejected.push(e);
                }
            }
        }

        outcome
    }

    /// Read files from disk and load them.
    pub fn load_paths<P: AsRef<Path>>(&self, paths: &[P]) -> UploadOutcome {
        let mut uploads = Vec::with_capacity(paths.len());
        let mut rejected = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            match std::fs::read(path) {
                Ok(bytes) => uploads.push((name, bytes)),
                Err(source) => rejected.push(UploadError::Read {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        }

        let mut outcome = self.load_bytes(uploads);
        outcome.rejected.extend(rejected);
        outcome
    }

    fn accept(&self, name: String, bytes: Vec<u8>, position: usize) -> Result<ImageSlot, UploadError> {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !self
            .config
            .accepted_extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(&extension))
        {
            return Err(UploadError::UnsupportedExtension { name, extension });
        }

        let max_bytes = self.config.max_file_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(UploadError::FileTooLarge {
                name,
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: self.config.max_file_size_mb,
            });
        }

        if !is_valid_image_header(&bytes) {
            return Err(UploadError::InvalidImage {
                name,
                message: "unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        let index = SlotIndex::from_position(position).ok_or_else(|| UploadError::InvalidImage {
            name: name.clone(),
            message: "no free slot".to_string(),
        })?;

        Ok(ImageSlot {
            index,
            mime_type: mime_type_for_filename(&name),
            filename: name,
            raw_bytes: bytes,
        })
    }
}

/// Whether the bytes start with a PNG or JPEG signature.
fn is_valid_image_header(header: &[u8]) -> bool {
    // JPEG: FF D8 FF
    if header.len() >= 3 && header[..3] == [0xFF, 0xD8, 0xFF] {
        return true;
    }
    // PNG: 89 50 4E 47
    header.len() >= 4 && header[..4] == [0x89, 0x50, 0x4E, 0x47]
}
