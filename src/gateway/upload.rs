use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Multipart field carrying uploaded files.
pub const FILES_FIELD: &str = "files";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::Multipart(e) => e.status(),
            UploadError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Outcome of one upload request.
#[derive(Debug, Default)]
pub struct SavedUploads {
    /// File parts received under [`FILES_FIELD`].
    pub received: usize,
    pub saved: Vec<PathBuf>,
    /// Parts with an unusable name or an unaccepted extension.
    pub skipped: usize,
}

/// Write every accepted file part into `dir`, creating it if needed. Files
/// with the same sanitized name are overwritten.
pub async fn save_uploads(
    multipart: &mut Multipart,
    dir: &Path,
    accept: fn(&Path) -> bool,
) -> Result<SavedUploads, UploadError> {
    let mut uploads = SavedUploads::default();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };
        uploads.received += 1;

        let Some(name) = sanitize_filename(&original) else {
            warn!(file = %original, "skipping upload with unusable name");
            uploads.skipped += 1;
            continue;
        };
        let path = dir.join(&name);
        if !accept(&path) {
            warn!(file = %name, "skipping upload with unsupported type");
            uploads.skipped += 1;
            continue;
        }

        let bytes = field.bytes().await?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| UploadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| UploadError::Io {
                path: path.clone(),
                source,
            })?;
        info!(file = %name, bytes = bytes.len(), "saved upload");
        uploads.saved.push(path);
    }

    Ok(uploads)
}

/// Reduce a client-supplied file name to a safe basename: directory parts
/// are dropped, whitespace becomes `_`, characters outside `[A-Za-z0-9._-]`
/// are removed and leading or trailing `.`/`_` are trimmed.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
