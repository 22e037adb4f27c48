use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Every failure the app can surface. The `Display` text is what the user sees.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Please enter a video URL.")]
    MissingUrl,

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Expected exactly one top-level folder in the archive, found {found}")]
    ArchiveLayout { found: usize },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yt-dlp error (exit code {code:?}):\n{stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("{tool} cannot be installed automatically on this platform; install it with your package manager")]
    NoManagedInstall { tool: &'static str },

    #[error("{tool} is not installed")]
    ToolMissing { tool: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_renders_stderr_verbatim() {
        let err = AppError::ToolFailed {
            code: Some(1),
            stderr: "ERROR: [youtube] x: Video unavailable".to_string(),
        };
        assert!(
            err.to_string()
                .contains("ERROR: [youtube] x: Video unavailable")
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
