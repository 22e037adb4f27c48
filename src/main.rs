//! Desktop front-end for yt-dlp: paste a URL, pick a format, get a media file.

// Tool locations and fixed download URLs
mod config;
// Worker state machine behind the window
mod controller;
// yt-dlp invocation (Process Runner)
mod downloader;
// Error type shared by all workers
mod error;
// Worker -> UI messages
mod events;
// Fetching missing tools
mod installer;
// Finding installed tools
mod locator;
// tracing subscriber setup
mod logging;
// Data models for requests, tools and progress
mod model;
// Progress parsing utilities
mod progress;

use std::{path::PathBuf, sync::Arc, time::Duration};

use config::AppConfig;
use controller::{Controller, Dialog, Effect, Phase};
use downloader::spawn_download;
use events::WorkerEvent;
use installer::Installer;
use model::{DownloadFormat, ProgressMode};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::Visuals;
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::{error, info, warn};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Program entry point: initializes logging and runtime, then launches the GUI
fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let runtime = RUNTIME.get_or_try_init(Runtime::new)?;
    let config = Arc::new(AppConfig::load());
    info!(app_dir = %config.app_dir.display(), "starting");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 360.0])
            .with_min_inner_size([460.0, 320.0]),
        ..Default::default()
    };
    eframe::run_native(
        "YouTube Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(GrabberApp::new(config, runtime))
        }),
    )
    .map_err(|e| anyhow::anyhow!("window error: {e}"))
}

/// Window shell: renders the controller's state and runs the work it asks for.
struct GrabberApp {
    controller: Controller,
    config: Arc<AppConfig>,
    runtime: &'static Runtime,
    events_tx: UnboundedSender<WorkerEvent>,
    events_rx: UnboundedReceiver<WorkerEvent>,
}

impl GrabberApp {
    fn new(config: Arc<AppConfig>, runtime: &'static Runtime) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let mut app = Self {
            controller: Controller::new(config.default_destination.clone())
                .with_media_tool_installable(config.media_tool_url.is_some()),
            config,
            runtime,
            events_tx,
            events_rx,
        };
        if let Some(effect) = app.controller.start() {
            app.run(effect);
        }
        app
    }

    /// Starts the background work for `effect`. Results come back as `WorkerEvent`s.
    fn run(&self, effect: Effect) {
        let tx = self.events_tx.clone();
        let config = Arc::clone(&self.config);
        match effect {
            Effect::CheckDependencies => {
                self.runtime.spawn_blocking(move || {
                    let deps = locator::locate(&config);
                    let _ = tx.send(WorkerEvent::DependenciesChecked(deps));
                });
            }
            Effect::Install(missing) => {
                self.runtime.spawn_blocking(move || {
                    info!(?missing, "installing tools");
                    let result = Installer::new(&config, tx.clone())
                        .and_then(|installer| installer.install(missing));
                    if let Err(e) = &result {
                        error!(error = %e, "install failed");
                    }
                    let deps = locator::locate(&config);
                    let _ = tx.send(WorkerEvent::InstallFinished {
                        deps,
                        error: result.err().map(|e| e.to_string()),
                    });
                });
            }
            Effect::Download {
                request,
                download_tool,
                media_tool_dir,
            } => {
                self.runtime.spawn(async move {
                    let result = spawn_download(
                        request,
                        &download_tool,
                        media_tool_dir.as_deref(),
                        tx.clone(),
                    )
                    .await;
                    let _ = tx.send(WorkerEvent::DownloadFinished(
                        result.map_err(|e| e.to_string()),
                    ));
                });
            }
        }
    }

    fn show_form(&mut self, ui: &mut egui::Ui, effects: &mut Vec<Effect>) {
        ui.heading("YouTube Downloader");
        ui.add_space(6.0);

        let busy = matches!(
            self.controller.phase(),
            Phase::Downloading | Phase::Installing
        );
        ui.label("Video URL:");
        ui.add_enabled(
            !busy,
            egui::TextEdit::singleline(&mut self.controller.url)
                .hint_text("https://www.youtube.com/watch?v=...")
                .desired_width(f32::INFINITY),
        );

        ui.horizontal(|ui| {
            ui.label("Format:");
            egui::ComboBox::from_id_source("format")
                .selected_text(self.controller.format.label())
                .show_ui(ui, |ui| {
                    for format in DownloadFormat::ALL {
                        ui.selectable_value(&mut self.controller.format, format, format.label());
                    }
                });
        });

        ui.horizontal(|ui| {
            ui.label("Save to:");
            ui.label(self.controller.destination.display().to_string());
            if ui.button("Browse…").clicked() {
                if let Some(folder) = FileDialog::new()
                    .set_directory(&self.controller.destination)
                    .pick_folder()
                {
                    self.controller.set_destination(&folder);
                }
            }
        });

        ui.add_space(12.0);
        let button = egui::Button::new("Download").min_size(egui::vec2(120.0, 28.0));
        if ui.add_enabled(self.controller.can_submit(), button).clicked() {
            effects.extend(self.controller.submit());
        }

        ui.add_space(12.0);
        let deps = self.controller.dependencies();
        egui::CollapsingHeader::new("Tools").show(ui, |ui| {
            let describe = |path: Option<&std::path::Path>| {
                path.map_or_else(|| "not found".to_string(), |p| p.display().to_string())
            };
            ui.label(format!("yt-dlp: {}", describe(deps.download_tool.as_deref())));
            ui.label(format!("ffmpeg: {}", describe(deps.media_tool_dir.as_deref())));
        });

        let progress = self.controller.progress();
        ui.label(&progress.status);
        match progress.mode {
            ProgressMode::Determinate(pct) => {
                ui.add(egui::ProgressBar::new(pct / 100.0).show_percentage());
            }
            ProgressMode::Indeterminate => {
                ui.horizontal(|ui| {
                    ui.add(egui::Spinner::new());
                    ui.label("Working…");
                });
            }
        }
    }

    fn show_dialog(&mut self, ctx: &egui::Context, effects: &mut Vec<Effect>) {
        let Some(dialog) = self.controller.dialog().cloned() else {
            return;
        };
        let title = match &dialog {
            Dialog::Error { title, .. } => title.clone(),
            Dialog::Complete { .. } => "Success".to_string(),
            Dialog::ConfirmInstall { .. } => "Install tools".to_string(),
        };

        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| match &dialog {
                Dialog::Error { message, .. } => {
                    egui::ScrollArea::vertical().max_height(180.0).show(ui, |ui| {
                        ui.label(message);
                    });
                    if ui.button("OK").clicked() {
                        self.controller.dismiss_dialog();
                    }
                }
                Dialog::Complete { folder } => {
                    ui.label("The download finished successfully.");
                    ui.horizontal(|ui| {
                        if ui.button("Open Folder").clicked() {
                            open_folder(folder.clone());
                            self.controller.dismiss_dialog();
                        }
                        if ui.button("OK").clicked() {
                            self.controller.dismiss_dialog();
                        }
                    });
                }
                Dialog::ConfirmInstall { message } => {
                    ui.label(message);
                    ui.horizontal(|ui| {
                        if ui.button("Yes").clicked() {
                            effects.extend(self.controller.answer_install_prompt(true));
                        }
                        if ui.button("No").clicked() {
                            effects.extend(self.controller.answer_install_prompt(false));
                        }
                    });
                }
            });
    }
}

/// GUI update loop: called each frame to drain worker events and redraw
impl App for GrabberApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.controller.apply(event);
        }

        let mut effects = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| self.show_form(ui, &mut effects));
        self.show_dialog(ctx, &mut effects);
        for effect in effects {
            self.run(effect);
        }

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

/// Reveals `folder` in the platform file manager.
fn open_folder(folder: PathBuf) {
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let opener = "explorer";
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let opener = "xdg-open";

        if let Err(e) = std::process::Command::new(opener).arg(&folder).spawn() {
            warn!(folder = %folder.display(), error = %e, "could not open folder");
        }
    });
}
