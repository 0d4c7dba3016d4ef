//! Files staged for a ticket or response submission.
//!
//! Each staged file owns its bytes until the submission finishes or the user
//! drops it; the set is consumed by the submit path so nothing outlives it.

use std::path::Path;

use tracing::debug;

use crate::error::{HelpdeskError, Result};

pub const MAX_FILES: usize = 5;
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub file_name: String,
    pub mime_type: String,
    bytes: Vec<u8>,
}

impl PendingUpload {
    pub fn from_path(path: &Path) -> Result<Self> {
        let display = path.display().to_string();

        if !path.is_file() {
            return Err(HelpdeskError::FileNotFound(display));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        // Check the size before reading a huge file into memory.
        let size = std::fs::metadata(path)
            .map_err(|e| HelpdeskError::FileRead {
                path: display.clone(),
                source: e,
            })?
            .len();
        check_size(&file_name, size)?;

        let bytes = std::fs::read(path).map_err(|e| HelpdeskError::FileRead {
            path: display,
            source: e,
        })?;

        Self::from_bytes(file_name, bytes)
    }

    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        check_size(&file_name, bytes.len() as u64)?;

        let mime_type = guess_content_type(&file_name).to_string();
        if !is_accepted(&file_name, &mime_type) {
            return Err(HelpdeskError::Upload(format!(
                "{file_name}: only images, PDF and Word documents are accepted"
            )));
        }

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn check_size(file_name: &str, size: u64) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(HelpdeskError::Upload(format!(
            "{file_name} is {} bytes; the limit is 10MB",
            size
        )));
    }
    Ok(())
}

/// The files attached to one submission.
#[derive(Debug, Default)]
pub struct UploadSet {
    files: Vec<PendingUpload>,
}

impl UploadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut set = Self::new();
        for path in paths {
            set.add(PendingUpload::from_path(path.as_ref())?)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, upload: PendingUpload) -> Result<()> {
        if self.files.len() >= MAX_FILES {
            return Err(HelpdeskError::Upload(format!(
                "at most {MAX_FILES} files per submission"
            )));
        }
        self.files.push(upload);
        Ok(())
    }

    pub fn as_slice(&self) -> &[PendingUpload] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Drop for UploadSet {
    fn drop(&mut self) {
        if !self.files.is_empty() {
            let bytes: u64 = self.files.iter().map(PendingUpload::size).sum();
            debug!(count = self.files.len(), bytes, "released staged uploads");
        }
    }
}

/// Guess content type from extension.
pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Images, PDF, `.doc` and `.docx`.
pub fn is_accepted(file_name: &str, mime_type: &str) -> bool {
    let lower = file_name.to_lowercase();
    mime_type.starts_with("image/")
        || mime_type == "application/pdf"
        || lower.ends_with(".doc")
        || lower.ends_with(".docx")
}

/// Whether a terminal pager or browser can show the file without saving it first.
pub fn can_view_inline(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
        || mime_type.starts_with("text/")
        || mime_type == "application/pdf"
        || mime_type == "application/json"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_images_pdf_and_word() {
        for name in ["shot.PNG", "scan.pdf", "spec.doc", "spec.docx", "photo.jpeg"] {
            assert!(PendingUpload::from_bytes(name, vec![0; 16]).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_rejects_other_types() {
        for name in ["run.sh", "data.zip", "notes.txt", "noext"] {
            let err = PendingUpload::from_bytes(name, vec![0; 16]).unwrap_err();
            assert!(matches!(err, HelpdeskError::Upload(_)), "{name}");
        }
    }

    #[test]
    fn test_rejects_oversized_file() {
        let err = PendingUpload::from_bytes("big.png", vec![0; MAX_FILE_SIZE as usize + 1])
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::Upload(_)));
    }

    #[test]
    fn test_set_limit() {
        let mut set = UploadSet::new();
        for i in 0..MAX_FILES {
            set.add(PendingUpload::from_bytes(format!("{i}.png"), vec![1]).unwrap())
                .unwrap();
        }
        assert!(set
            .add(PendingUpload::from_bytes("extra.png", vec![1]).unwrap())
            .is_err());

        assert_eq!(set.len(), MAX_FILES);
    }

    #[test]
    fn test_missing_path() {
        let err = PendingUpload::from_path(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, HelpdeskError::FileNotFound(_)));
    }

    #[test]
    fn test_inline_viewable() {
        assert!(can_view_inline("image/gif"));
        assert!(can_view_inline("application/pdf"));
        assert!(!can_view_inline("application/msword"));
    }
}
