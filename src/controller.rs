//! UI state and the transitions between phases.
//!
//! The controller never touches widgets or spawns work itself. Every user action
//! and worker event goes through it; actions that need background work hand back
//! an [`Effect`] for the app shell to run. It is only ever mutated on the UI thread.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::AppError;
use crate::events::WorkerEvent;
use crate::model::{
    DependencySet, DownloadFormat, DownloadRequest, MissingTools, ProgressMode, ProgressState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CheckingDependencies,
    PromptingInstall,
    Installing,
    Ready,
    Downloading,
    Complete,
    Failed,
    /// yt-dlp is missing and was not installed; downloads are disabled.
    Unavailable,
}

/// Background work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CheckDependencies,
    Install(MissingTools),
    Download {
        request: DownloadRequest,
        download_tool: PathBuf,
        media_tool_dir: Option<PathBuf>,
    },
}

/// Modal message currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Error { title: String, message: String },
    /// Successful download; offers to open `folder`.
    Complete { folder: PathBuf },
    /// Yes/No question answered through [`Controller::answer_install_prompt`].
    ConfirmInstall { message: String },
}

pub struct Controller {
    /// Form fields, edited directly by the UI.
    pub url: String,
    pub format: DownloadFormat,
    pub destination: PathBuf,

    phase: Phase,
    progress: ProgressState,
    deps: DependencySet,
    dialog: Option<Dialog>,
    /// Whether ffmpeg has a managed build to fetch on this platform.
    media_tool_installable: bool,
}

impl Controller {
    pub fn new(destination: PathBuf) -> Self {
        Self {
            url: String::new(),
            format: DownloadFormat::default(),
            destination,
            phase: Phase::Idle,
            progress: ProgressState::default(),
            deps: DependencySet::default(),
            dialog: None,
            media_tool_installable: true,
        }
    }

    /// Turns off offering ffmpeg installs, for platforms without a managed build.
    pub fn with_media_tool_installable(mut self, installable: bool) -> Self {
        self.media_tool_installable = installable;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.deps
    }

    /// Missing tools the installer can actually fetch.
    fn installable_missing(&self) -> MissingTools {
        let missing = self.deps.missing();
        MissingTools {
            media_tool: missing.media_tool && self.media_tool_installable,
            ..missing
        }
    }

    /// Whether the Download button is enabled.
    pub fn can_submit(&self) -> bool {
        matches!(self.phase, Phase::Ready | Phase::Complete | Phase::Failed)
    }

    /// Kicks off the startup dependency check.
    pub fn start(&mut self) -> Option<Effect> {
        if self.phase != Phase::Idle {
            return None;
        }
        self.phase = Phase::CheckingDependencies;
        self.set_status("Checking for yt-dlp and ffmpeg...", ProgressMode::Indeterminate);
        Some(Effect::CheckDependencies)
    }

    /// Validates the form and turns it into a download.
    pub fn submit(&mut self) -> Option<Effect> {
        if !self.can_submit() {
            return None;
        }
        let url = self.url.trim().to_string();
        if url.is_empty() {
            self.show_error("Error", AppError::MissingUrl.to_string());
            return None;
        }
        let Some(download_tool) = self.deps.download_tool.clone() else {
            self.show_error("Error", AppError::ToolMissing { tool: "yt-dlp" }.to_string());
            return None;
        };

        let request = DownloadRequest {
            url,
            format: self.format,
            destination: self.destination.clone(),
        };
        info!(url = %request.url, format = %request.format, "download submitted");

        self.phase = Phase::Downloading;
        self.set_status("Starting download...", ProgressMode::Determinate(0.0));
        Some(Effect::Download {
            request,
            download_tool,
            media_tool_dir: self.deps.media_tool_dir.clone(),
        })
    }

    /// Answer to the [`Dialog::ConfirmInstall`] prompt.
    pub fn answer_install_prompt(&mut self, accepted: bool) -> Option<Effect> {
        if self.phase != Phase::PromptingInstall {
            return None;
        }
        self.dialog = None;
        let missing = self.installable_missing();

        if accepted {
            self.phase = Phase::Installing;
            self.set_status("Installing tools...", ProgressMode::Indeterminate);
            return Some(Effect::Install(missing));
        }

        info!(?missing, "install declined");
        if self.deps.download_tool.is_some() {
            self.phase = Phase::Ready;
            self.set_status(
                "Warning: ffmpeg is missing, converting and merging may fail.",
                ProgressMode::Determinate(0.0),
            );
        } else {
            self.phase = Phase::Unavailable;
            self.set_status(
                "yt-dlp is not installed. Downloads are disabled.",
                ProgressMode::Determinate(0.0),
            );
        }
        None
    }

    pub fn dismiss_dialog(&mut self) {
        // The install prompt is only closed by answering it.
        if !matches!(self.dialog, Some(Dialog::ConfirmInstall { .. })) {
            self.dialog = None;
        }
    }

    /// Folds a worker message into the state.
    pub fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::DependenciesChecked(deps) => self.on_dependencies(deps),
            WorkerEvent::InstallStatus(message) if self.phase == Phase::Installing => {
                self.progress.status = message;
            }
            WorkerEvent::InstallProgress { tool, percent } if self.phase == Phase::Installing => {
                self.progress.mode = match percent {
                    Some(p) => ProgressMode::Determinate(p),
                    None => ProgressMode::Indeterminate,
                };
                if let Some(p) = percent {
                    self.progress.status = format!("Downloading {tool}... {p:.0}%");
                }
            }
            WorkerEvent::InstallFinished { deps, error } => self.on_install_finished(deps, error),
            WorkerEvent::DownloadLine(line) if self.phase == Phase::Downloading => {
                self.progress.status = line;
            }
            WorkerEvent::DownloadProgress(p) if self.phase == Phase::Downloading => {
                self.progress.mode = ProgressMode::Determinate(p);
            }
            WorkerEvent::DownloadFinished(result) if self.phase == Phase::Downloading => {
                self.on_download_finished(result)
            }
            other => warn!(?other, phase = ?self.phase, "ignoring out-of-phase event"),
        }
    }

    fn on_dependencies(&mut self, deps: DependencySet) {
        if self.phase != Phase::CheckingDependencies {
            return;
        }
        self.deps = deps;
        let missing = self.installable_missing();
        if !missing.any() {
            self.phase = Phase::Ready;
            if self.deps.is_complete() {
                self.set_status("yt-dlp and ffmpeg found. Ready.", ProgressMode::Determinate(0.0));
            } else {
                self.set_status(
                    "Warning: ffmpeg not found on PATH, converting and merging may fail.",
                    ProgressMode::Determinate(0.0),
                );
            }
            return;
        }

        self.phase = Phase::PromptingInstall;
        let names = match (missing.download_tool, missing.media_tool) {
            (true, true) => "yt-dlp and ffmpeg are",
            (true, false) => "yt-dlp is",
            _ => "ffmpeg is",
        };
        self.set_status(
            format!("{names} not installed."),
            ProgressMode::Determinate(0.0),
        );
        self.dialog = Some(Dialog::ConfirmInstall {
            message: format!(
                "{names} required to download and convert media.\n\nDownload and install automatically?"
            ),
        });
    }

    fn on_install_finished(&mut self, deps: DependencySet, error: Option<String>) {
        if self.phase != Phase::Installing {
            return;
        }
        self.deps = deps;
        self.phase = if self.deps.download_tool.is_some() {
            Phase::Ready
        } else {
            Phase::Unavailable
        };

        match error {
            Some(message) => {
                self.set_status("Tool installation failed.", ProgressMode::Determinate(0.0));
                self.show_error("Install error", message);
            }
            None if self.deps.is_complete() => {
                self.set_status("Tools installed. Ready.", ProgressMode::Determinate(100.0));
            }
            None => {
                self.set_status(
                    "Install finished but some tools are still missing.",
                    ProgressMode::Determinate(0.0),
                );
            }
        }
    }

    fn on_download_finished(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.phase = Phase::Complete;
                self.set_status("Download complete!", ProgressMode::Determinate(100.0));
                self.dialog = Some(Dialog::Complete {
                    folder: self.destination.clone(),
                });
            }
            Err(message) => {
                self.phase = Phase::Failed;
                self.set_status("Download failed.", ProgressMode::Determinate(0.0));
                self.show_error("Error", format!("An error occurred:\n{message}"));
            }
        }
    }

    /// Replaces the destination directory, e.g. from the folder picker.
    pub fn set_destination(&mut self, folder: &Path) {
        self.destination = folder.to_path_buf();
    }

    fn set_status(&mut self, status: impl Into<String>, mode: ProgressMode) {
        self.progress = ProgressState {
            status: status.into(),
            mode,
        };
    }

    fn show_error(&mut self, title: &str, message: String) {
        self.dialog = Some(Dialog::Error {
            title: title.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_tools() -> DependencySet {
        DependencySet {
            download_tool: Some(PathBuf::from("/app/yt-dlp")),
            media_tool_dir: Some(PathBuf::from("/app/ffmpeg/bin")),
        }
    }

    fn checked(deps: DependencySet) -> Controller {
        let mut c = Controller::new(PathBuf::from("/downloads"));
        c.start();
        c.apply(WorkerEvent::DependenciesChecked(deps));
        c
    }

    fn ready() -> Controller {
        let mut c = Controller::new(PathBuf::from("/downloads"));
        assert_eq!(c.start(), Some(Effect::CheckDependencies));
        c.apply(WorkerEvent::DependenciesChecked(all_tools()));
        c
    }

    #[test]
    fn trigger_disabled_while_checking() {
        let mut c = Controller::new(PathBuf::from("/downloads"));
        assert!(!c.can_submit());
        c.start();
        assert_eq!(c.phase(), Phase::CheckingDependencies);
        assert!(!c.can_submit());
        assert_eq!(c.start(), None);
    }

    #[test]
    fn complete_dependencies_go_straight_to_ready() {
        let c = ready();
        assert_eq!(c.phase(), Phase::Ready);
        assert!(c.can_submit());
        assert_eq!(c.dialog(), None);
    }

    #[test]
    fn missing_tool_prompts_install() {
        let mut c = checked(DependencySet {
            media_tool_dir: None,
            ..all_tools()
        });

        assert_eq!(c.phase(), Phase::PromptingInstall);
        assert!(!c.can_submit());
        assert!(matches!(c.dialog(), Some(Dialog::ConfirmInstall { .. })));

        c.dismiss_dialog();
        assert!(c.dialog().is_some());
    }

    #[test]
    fn accepting_install_requests_missing_tools() {
        let mut c = checked(DependencySet::default());

        let effect = c.answer_install_prompt(true);
        assert_eq!(
            effect,
            Some(Effect::Install(MissingTools {
                media_tool: true,
                download_tool: true
            }))
        );
        assert_eq!(c.phase(), Phase::Installing);
        assert!(!c.can_submit());
        assert_eq!(c.dialog(), None);
    }

    #[test]
    fn declining_without_ytdlp_leaves_trigger_disabled() {
        let mut c = checked(DependencySet::default());

        assert_eq!(c.answer_install_prompt(false), None);
        assert_eq!(c.phase(), Phase::Unavailable);
        assert!(!c.can_submit());
    }

    #[test]
    fn declining_with_ytdlp_enables_trigger() {
        let mut c = checked(DependencySet {
            media_tool_dir: None,
            ..all_tools()
        });

        assert_eq!(c.answer_install_prompt(false), None);
        assert_eq!(c.phase(), Phase::Ready);
        assert!(c.can_submit());
        assert!(c.progress().status.starts_with("Warning"));
    }

    #[test]
    fn install_progress_switches_modes() {
        let mut c = checked(DependencySet::default());
        c.answer_install_prompt(true);

        c.apply(WorkerEvent::InstallProgress {
            tool: crate::model::Tool::MediaTool,
            percent: None,
        });
        assert_eq!(c.progress().mode, ProgressMode::Indeterminate);

        c.apply(WorkerEvent::InstallProgress {
            tool: crate::model::Tool::MediaTool,
            percent: Some(37.0),
        });
        assert_eq!(c.progress().mode, ProgressMode::Determinate(37.0));
    }

    #[test]
    fn install_success_becomes_ready() {
        let mut c = checked(DependencySet::default());
        c.answer_install_prompt(true);

        c.apply(WorkerEvent::InstallFinished {
            deps: all_tools(),
            error: None,
        });
        assert_eq!(c.phase(), Phase::Ready);
        assert_eq!(c.dependencies(), &all_tools());
    }

    #[test]
    fn install_failure_shows_error_and_disables_trigger() {
        let mut c = checked(DependencySet::default());
        c.answer_install_prompt(true);

        c.apply(WorkerEvent::InstallFinished {
            deps: DependencySet::default(),
            error: Some("Network error: connection refused".to_string()),
        });
        assert_eq!(c.phase(), Phase::Unavailable);
        assert!(!c.can_submit());
        assert_eq!(
            c.dialog(),
            Some(&Dialog::Error {
                title: "Install error".to_string(),
                message: "Network error: connection refused".to_string(),
            })
        );
    }

    #[test]
    fn empty_url_is_rejected_without_work() {
        let mut c = ready();
        c.url = "   ".to_string();

        assert_eq!(c.submit(), None);
        assert_eq!(c.phase(), Phase::Ready);
        assert!(matches!(c.dialog(), Some(Dialog::Error { message, .. }) if message == "Please enter a video URL."));
    }

    #[test]
    fn submit_builds_request_and_disables_trigger() {
        let mut c = ready();
        c.url = " https://example/watch?v=x ".to_string();
        c.format = DownloadFormat::Mp3;

        let effect = c.submit();
        assert_eq!(
            effect,
            Some(Effect::Download {
                request: DownloadRequest {
                    url: "https://example/watch?v=x".to_string(),
                    format: DownloadFormat::Mp3,
                    destination: PathBuf::from("/downloads"),
                },
                download_tool: PathBuf::from("/app/yt-dlp"),
                media_tool_dir: Some(PathBuf::from("/app/ffmpeg/bin")),
            })
        );
        assert_eq!(c.phase(), Phase::Downloading);
        assert!(!c.can_submit());
        assert_eq!(c.submit(), None);
    }

    #[test]
    fn success_sets_full_progress() {
        let mut c = ready();
        c.url = "https://example/watch?v=x".to_string();
        c.submit();

        c.apply(WorkerEvent::DownloadProgress(12.5));
        c.apply(WorkerEvent::DownloadLine("[download]  12.5% of 3MiB".to_string()));
        assert_eq!(c.progress().status, "[download]  12.5% of 3MiB");

        c.apply(WorkerEvent::DownloadFinished(Ok(())));
        assert_eq!(c.phase(), Phase::Complete);
        assert_eq!(c.progress().mode, ProgressMode::Determinate(100.0));
        assert!(c.can_submit());
        assert_eq!(
            c.dialog(),
            Some(&Dialog::Complete {
                folder: PathBuf::from("/downloads")
            })
        );
    }

    #[test]
    fn failure_shows_stderr_verbatim() {
        let mut c = ready();
        c.url = "https://example/watch?v=x".to_string();
        c.submit();

        let stderr = "ERROR: [generic] Unable to download webpage: HTTP Error 404";
        let err = AppError::ToolFailed {
            code: Some(1),
            stderr: stderr.to_string(),
        };
        c.apply(WorkerEvent::DownloadFinished(Err(err.to_string())));

        assert_eq!(c.phase(), Phase::Failed);
        assert!(c.can_submit());
        match c.dialog() {
            Some(Dialog::Error { message, .. }) => assert!(message.contains(stderr)),
            other => panic!("unexpected dialog {other:?}"),
        }

        c.dismiss_dialog();
        assert_eq!(c.dialog(), None);
    }

    #[test]
    fn ffmpeg_without_managed_build_is_not_offered() {
        let mut c = Controller::new(PathBuf::from("/downloads")).with_media_tool_installable(false);
        c.start();
        c.apply(WorkerEvent::DependenciesChecked(DependencySet {
            media_tool_dir: None,
            ..all_tools()
        }));

        assert_eq!(c.phase(), Phase::Ready);
        assert_eq!(c.dialog(), None);
        assert!(c.progress().status.starts_with("Warning"));
    }

    #[test]
    fn only_ytdlp_is_installed_without_managed_ffmpeg() {
        let mut c = Controller::new(PathBuf::from("/downloads")).with_media_tool_installable(false);
        c.start();
        c.apply(WorkerEvent::DependenciesChecked(DependencySet::default()));

        assert_eq!(
            c.answer_install_prompt(true),
            Some(Effect::Install(MissingTools {
                media_tool: false,
                download_tool: true
            }))
        );
    }

    #[test]
    fn late_events_are_ignored() {
        let mut c = ready();
        c.apply(WorkerEvent::DownloadProgress(50.0));
        c.apply(WorkerEvent::DownloadFinished(Ok(())));
        assert_eq!(c.phase(), Phase::Ready);
        assert_eq!(c.progress().mode, ProgressMode::Determinate(0.0));
    }
}
