use crate::model::{DependencySet, Tool};

/// Messages posted by worker tasks and drained by the UI thread each frame.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Startup dependency check finished.
    DependenciesChecked(DependencySet),
    /// Installer moved on to a new step.
    InstallStatus(String),
    /// Bytes received for `tool`; `None` when the total size is unknown.
    InstallProgress { tool: Tool, percent: Option<f32> },
    /// Install run ended. `deps` is re-located after the run either way.
    InstallFinished {
        deps: DependencySet,
        error: Option<String>,
    },
    /// One line of yt-dlp output.
    DownloadLine(String),
    /// Percentage parsed from a progress line.
    DownloadProgress(f32),
    /// yt-dlp exited; `Err` carries the user-facing message.
    DownloadFinished(Result<(), String>),
}
