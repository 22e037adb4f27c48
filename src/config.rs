use std::path::{Path, PathBuf};

/// Release archive holding a single `ffmpeg-*-essentials_build/` folder with `bin/ffmpeg.exe`.
///
/// Only Windows has a zip build in that layout. Elsewhere ffmpeg comes from the
/// system package manager and is picked up from PATH.
pub fn media_tool_url() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip")
    } else {
        None
    }
}

/// Direct link to the latest yt-dlp executable for this platform.
pub fn download_tool_url() -> &'static str {
    if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    }
}

/// File name of the download tool binary.
pub fn download_tool_bin() -> &'static str {
    if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" }
}

/// File name of the media tool binary.
pub fn media_tool_bin() -> &'static str {
    if cfg!(target_os = "windows") { "ffmpeg.exe" } else { "ffmpeg" }
}

/// Where the app expects its tools, where it fetches them from, and where output goes.
///
/// Built in code; there is no config file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_dir: PathBuf,
    /// `<app_dir>/yt-dlp[.exe]`
    pub download_tool_path: PathBuf,
    /// `<app_dir>/ffmpeg`, the install target for the extracted archive folder.
    pub media_tool_dir: PathBuf,
    pub download_tool_url: String,
    /// `None` where there is no managed ffmpeg build.
    pub media_tool_url: Option<String>,
    pub default_destination: PathBuf,
    /// Fall back to tools found on the system search path.
    pub use_system_tools: bool,
}

impl AppConfig {
    /// Configuration rooted next to the running executable.
    pub fn load() -> Self {
        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::for_app_dir(app_dir)
    }

    pub fn for_app_dir(app_dir: impl Into<PathBuf>) -> Self {
        let app_dir = app_dir.into();
        Self {
            download_tool_path: app_dir.join(download_tool_bin()),
            media_tool_dir: app_dir.join("ffmpeg"),
            download_tool_url: download_tool_url().to_string(),
            media_tool_url: media_tool_url().map(str::to_string),
            default_destination: default_destination(),
            use_system_tools: true,
            app_dir,
        }
    }

    /// `<app_dir>/ffmpeg/bin`, prepended to the subprocess search path.
    pub fn media_tool_bin_dir(&self) -> PathBuf {
        self.media_tool_dir.join("bin")
    }
}

fn default_destination() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_relative_to_app_dir() {
        let config = AppConfig::for_app_dir("/opt/grabber");
        assert_eq!(
            config.download_tool_path,
            Path::new("/opt/grabber").join(download_tool_bin())
        );
        assert_eq!(config.media_tool_dir, Path::new("/opt/grabber/ffmpeg"));
        assert_eq!(
            config.media_tool_bin_dir(),
            Path::new("/opt/grabber/ffmpeg/bin")
        );
        assert!(config.download_tool_url.starts_with("https://"));
    }

    #[test]
    fn managed_ffmpeg_only_where_the_archive_matches_the_binary_name() {
        let config = AppConfig::for_app_dir("/opt/grabber");
        if cfg!(target_os = "windows") {
            assert_eq!(media_tool_bin(), "ffmpeg.exe");
            assert!(config.media_tool_url.is_some_and(|url| url.starts_with("https://")));
        } else {
            assert_eq!(config.media_tool_url, None);
        }
    }
}
