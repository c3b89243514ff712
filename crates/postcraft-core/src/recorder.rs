//! Append-only CSV table of finished posts.

use crate::error::RecordError;
use crate::types::PersistedPost;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Appends posts to a CSV file with an `Image,Description,Caption,Hashtags`
/// header.
pub struct Recorder {
    path: PathBuf,
}

impl Recorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is absent or
    /// empty.
    pub fn append(&self, post: &PersistedPost) -> Result<(), RecordError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(post)?;
        writer.flush()?;

        tracing::info!(
            path = %self.path.display(),
            image = %post.image_filename,
            "Post saved"
        );
        Ok(())
    }

    /// Every recorded row in file order. A missing file has no rows.
    pub fn read_all(&self) -> Result<Vec<PersistedPost>, RecordError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<PersistedPost>, csv::Error>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(name: &str, caption: &str) -> PersistedPost {
        PersistedPost {
            image_filename: name.to_string(),
            description: "A quiet harbour, \"early\" light".to_string(),
            caption: caption.to_string(),
            hashtags: "#sea #boats".to_string(),
        }
    }

    #[test]
    fn test_two_appends_one_header_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path().join("data").join("content.csv"));

        recorder.append(&post("a.jpg", "First")).unwrap();
        recorder.append(&post("b.jpg", "Second, with comma")).unwrap();

        let content = std::fs::read_to_string(recorder.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Image,Description,Caption,Hashtags");
        assert!(lines[1].starts_with("a.jpg,"));
        assert!(lines[2].starts_with("b.jpg,"));

        let rows = recorder.read_all().unwrap();
        assert_eq!(rows, vec![post("a.jpg", "First"), post("b.jpg", "Second, with comma")]);
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.csv");
        std::fs::write(&path, "").unwrap();

        let recorder = Recorder::new(&path);
        recorder.append(&post("a.jpg", "Hi")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Image,Description,Caption,Hashtags\n"));
    }

    #[test]
    fn test_read_all_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path().join("nothing.csv"));
        assert!(recorder.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_unicode_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path().join("content.csv"));
        recorder.append(&post("café.png", "Déjà vu ☕")).unwrap();
        assert_eq!(recorder.read_all().unwrap()[0].caption, "Déjà vu ☕");
    }
}
