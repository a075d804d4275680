//! Local storage for uploaded document binaries.
//!
//! Files live flat under the upload directory and are referenced by the public
//! path they are served from (`/uploads/<file>`).

use std::path::{Path, PathBuf};

use base64::Engine;
use tracing::{info, warn};
use uuid::Uuid;

use crate::profile::StoreError;

pub const PUBLIC_PREFIX: &str = "/uploads/";

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Writes `bytes` to a fresh file and returns its storage reference.
    pub async fn save(&self, bytes: &[u8], extension: &str) -> Result<String, StoreError> {
        self.ensure_root().await?;
        let extension = sanitize_extension(extension);
        let file_name = format!("doc-{}.{extension}", Uuid::new_v4());
        tokio::fs::write(self.root.join(&file_name), bytes).await?;
        info!("Stored upload {file_name} ({} bytes)", bytes.len());
        Ok(format!("{PUBLIC_PREFIX}{file_name}"))
    }

    pub async fn read(&self, storage_ref: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(storage_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("Stored file {storage_ref}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the file. A file that is already gone is not an error.
    pub async fn delete(&self, storage_ref: &str) -> Result<(), StoreError> {
        let path = self.resolve(storage_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {storage_ref} was already missing");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Maps a storage reference to a path inside the upload directory.
    pub fn resolve(&self, storage_ref: &str) -> Result<PathBuf, StoreError> {
        let name = storage_ref
            .strip_prefix(PUBLIC_PREFIX)
            .unwrap_or(storage_ref);
        let is_plain_name = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        if !is_plain_name {
            return Err(StoreError::Invalid(format!(
                "Invalid storage reference '{storage_ref}'"
            )));
        }
        Ok(self.root.join(name))
    }

    /// Returns the plain text of a stored file. PDFs are parsed on a blocking
    /// thread and `.txt`/`.md` files are read as UTF-8. Other formats are refused.
    pub async fn extract_text(&self, storage_ref: &str) -> Result<String, StoreError> {
        let extension = Path::new(storage_ref)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !TEXT_EXTENSIONS.contains(&extension.as_str()) && extension != "pdf" {
            return Err(StoreError::Extraction(format!(
                "unsupported file type '.{extension}'; upload a PDF or plain text file"
            )));
        }

        let bytes = self.read(storage_ref).await?;
        if extension != "pdf" {
            return Ok(String::from_utf8_lossy(&bytes).trim().to_string());
        }

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| StoreError::Extraction(format!("extraction task failed: {e}")))?
            .map_err(|e| StoreError::Extraction(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}

/// Decodes base64 upload data, accepting an optional `data:<mime>;base64,` prefix.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, StoreError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(StoreError::Invalid("Uploaded file is empty".to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| StoreError::Invalid(format!("Uploaded file is not valid base64: {e}")))
}

/// Picks a file extension from the original file name, falling back to the mime type.
pub fn extension_for(file_name: Option<&str>, mime_type: Option<&str>) -> String {
    if let Some(ext) = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
    {
        return ext.to_ascii_lowercase();
    }
    match mime_type.unwrap_or_default() {
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        _ => "bin",
    }
    .to_string()
}

fn sanitize_extension(extension: &str) -> String {
    let ext: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_read_delete_round_trip() {
        let tmp = TempDir::new().unwrap();
        let files = FileStore::new(tmp.path().join("uploads"));

        let storage_ref = files.save(b"hello", "TXT").await.unwrap();
        assert!(storage_ref.starts_with("/uploads/doc-"));
        assert!(storage_ref.ends_with(".txt"));

        assert_eq!(files.read(&storage_ref).await.unwrap(), b"hello");
        assert_eq!(files.extract_text(&storage_ref).await.unwrap(), "hello");

        files.delete(&storage_ref).await.unwrap();
        assert!(matches!(
            files.read(&storage_ref).await,
            Err(StoreError::NotFound(_))
        ));
        files.delete(&storage_ref).await.unwrap();
    }

    #[tokio::test]
    async fn test_extract_text_refuses_unknown_formats() {
        let tmp = TempDir::new().unwrap();
        let files = FileStore::new(tmp.path());

        let notes = files.save(b"  # Notes\n", "md").await.unwrap();
        assert_eq!(files.extract_text(&notes).await.unwrap(), "# Notes");

        for ext in ["docx", "png", "bin"] {
            let storage_ref = files.save(b"PK\x03\x04", ext).await.unwrap();
            assert!(matches!(
                files.extract_text(&storage_ref).await,
                Err(StoreError::Extraction(_))
            ));
        }
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let files = FileStore::new("/srv/uploads");
        assert!(files.resolve("/uploads/../secret").is_err());
        assert!(files.resolve("/uploads/a/b.pdf").is_err());
        assert!(files.resolve("/uploads/").is_err());
        assert_eq!(
            files.resolve("/uploads/doc-1.pdf").unwrap(),
            PathBuf::from("/srv/uploads/doc-1.pdf")
        );
    }

    #[test]
    fn test_decode_base64_accepts_data_urls() {
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64("data:application/pdf;base64,aGVs\nbG8=").unwrap(),
            b"hello"
        );
        assert!(decode_base64("not base64!").is_err());
        assert!(decode_base64("").is_err());
    }

    #[test]
    fn test_extension_prefers_file_name() {
        assert_eq!(extension_for(Some("CV.PDF"), Some("text/plain")), "pdf");
        assert_eq!(extension_for(None, Some("application/pdf")), "pdf");
        assert_eq!(extension_for(Some("noext"), None), "bin");
    }
}
