use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{self, AppConfig};
use crate::model::DependencySet;

/// Presence of the two tools at their managed locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolPresence {
    pub media_tool: bool,
    pub download_tool: bool,
}

/// Checks the managed install paths only. No side effects.
pub fn check_installed(download_tool_path: &Path, media_tool_bin_dir: &Path) -> ToolPresence {
    ToolPresence {
        media_tool: media_tool_bin_dir.join(config::media_tool_bin()).is_file(),
        download_tool: download_tool_path.is_file(),
    }
}

/// Resolves both tools, preferring managed copies and optionally falling back to the system PATH.
pub fn locate(config: &AppConfig) -> DependencySet {
    let bin_dir = config.media_tool_bin_dir();
    let installed = check_installed(&config.download_tool_path, &bin_dir);

    let download_tool = if installed.download_tool {
        Some(config.download_tool_path.clone())
    } else if config.use_system_tools {
        find_on_path("yt-dlp")
    } else {
        None
    };

    let media_tool_dir = if installed.media_tool {
        Some(bin_dir)
    } else if config.use_system_tools {
        find_on_path("ffmpeg").and_then(|exe| exe.parent().map(Path::to_path_buf))
    } else {
        None
    };

    let deps = DependencySet {
        download_tool,
        media_tool_dir,
    };
    info!(
        download_tool = ?deps.download_tool,
        media_tool_dir = ?deps.media_tool_dir,
        "dependency check finished"
    );
    deps
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    match which::which(name) {
        Ok(path) => {
            debug!(tool = name, path = %path.display(), "found on system PATH");
            Some(path)
        }
        Err(_) => None,
    }
}
