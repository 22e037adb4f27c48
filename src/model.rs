use std::fmt;
use std::path::PathBuf;

/// Output formats offered in the format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFormat {
    Mp3,
    M4a,
    Wav,
    Video1080,
    #[default]
    Video720,
    Video4k,
}

impl DownloadFormat {
    pub const ALL: [DownloadFormat; 6] = [
        DownloadFormat::Mp3,
        DownloadFormat::M4a,
        DownloadFormat::Wav,
        DownloadFormat::Video1080,
        DownloadFormat::Video720,
        DownloadFormat::Video4k,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DownloadFormat::Mp3 => "mp3",
            DownloadFormat::M4a => "m4a",
            DownloadFormat::Wav => "wav",
            DownloadFormat::Video1080 => "mp4-1080p",
            DownloadFormat::Video720 => "mp4-720p",
            DownloadFormat::Video4k => "mp4-4k",
        }
    }

    pub fn kind(self) -> FormatKind {
        match self {
            DownloadFormat::Mp3 => FormatKind::Audio { codec: "mp3" },
            DownloadFormat::M4a => FormatKind::Audio { codec: "m4a" },
            DownloadFormat::Wav => FormatKind::Audio { codec: "wav" },
            DownloadFormat::Video1080 => FormatKind::Video { max_height: 1080 },
            DownloadFormat::Video720 => FormatKind::Video { max_height: 720 },
            DownloadFormat::Video4k => FormatKind::Video { max_height: 2160 },
        }
    }
}

/// Audio selections are extracted and transcoded; video selections are merged into mp4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// Codec passed to `--audio-format`.
    Audio { codec: &'static str },
    /// Resolution ceiling in lines.
    Video { max_height: u32 },
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A submitted download. Built from the form when the user presses Download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format: DownloadFormat,
    pub destination: PathBuf,
}

/// Resolved tool locations. `None` means the tool could not be found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    pub download_tool: Option<PathBuf>,
    /// Directory containing the ffmpeg binary.
    pub media_tool_dir: Option<PathBuf>,
}

impl DependencySet {
    pub fn is_complete(&self) -> bool {
        self.download_tool.is_some() && self.media_tool_dir.is_some()
    }

    pub fn missing(&self) -> MissingTools {
        MissingTools {
            media_tool: self.media_tool_dir.is_none(),
            download_tool: self.download_tool.is_none(),
        }
    }
}

/// Which tools an install run has to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissingTools {
    pub media_tool: bool,
    pub download_tool: bool,
}

impl MissingTools {
    pub fn any(self) -> bool {
        self.media_tool || self.download_tool
    }
}

/// Tool being installed, for status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    DownloadTool,
    MediaTool,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::DownloadTool => f.write_str("yt-dlp"),
            Tool::MediaTool => f.write_str("ffmpeg"),
        }
    }
}

/// How the progress indicator is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressMode {
    /// Percentage in 0..=100.
    Determinate(f32),
    /// Spinner for transfers of unknown size.
    Indeterminate,
}

/// Status line plus progress indicator. Overwritten on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub status: String,
    pub mode: ProgressMode,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            status: "Initializing...".to_string(),
            mode: ProgressMode::Determinate(0.0),
        }
    }
}
