use axum::extract::{
    multipart::{MultipartError, MultipartRejection},
    Multipart,
};
use bytes::Bytes;
use thiserror::Error;

/// Multipart field the upload form posts the image under.
pub const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file part in the request.")]
    MissingFilePart,
    #[error("No selected file.")]
    EmptyFilename,
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

impl UploadError {
    pub fn reason(&self) -> &'static str {
        match self {
            UploadError::MissingFilePart => "missing_file_part",
            UploadError::EmptyFilename => "empty_filename",
            UploadError::Multipart(_) => "malformed_multipart",
        }
    }
}

/// A validated upload: non-empty client filename plus the raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Bytes,
}

/// Pulls the `file` part out of the request.
///
/// Only a part carrying a filename counts; a plain form field named `file`
/// or a request that is not multipart at all is a missing file part.
pub async fn extract_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedImage, UploadError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!("Request is not multipart: {}", rejection);
            return Err(UploadError::MissingFilePart);
        }
    };

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if filename.is_empty() {
            return Err(UploadError::EmptyFilename);
        }

        let bytes = field.bytes().await?;
        return Ok(UploadedImage { filename, bytes });
    }

    Err(UploadError::MissingFilePart)
}

/// Reduces a client filename to a flat, ASCII-only storage key.
///
/// Path separators become word breaks, runs of whitespace become `_`, and
/// anything outside `[A-Za-z0-9_.-]` is dropped. The result may be empty.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    flattened
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("..\\windows\\scan.png"), "windows_scan.png");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("x-ray (1).png"), "x-ray_1.png");
        assert_eq!(secure_filename(".hidden"), "hidden");
        assert_eq!(secure_filename("..."), "");
        assert_eq!(secure_filename(""), "");
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(UploadError::MissingFilePart.reason(), "missing_file_part");
        assert_eq!(UploadError::EmptyFilename.to_string(), "No selected file.");
    }
}
