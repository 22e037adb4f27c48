//! Fetches missing tools into the app directory.
//!
//! yt-dlp is a single executable, staged next to its install path and renamed
//! into place once complete. ffmpeg
//! ships as a zip holding one top-level folder; that folder is extracted next
//! to the app and moved to `<app_dir>/ffmpeg`. Runs on a blocking worker thread.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::events::WorkerEvent;
use crate::model::{MissingTools, Tool};

pub struct Installer<'a> {
    config: &'a AppConfig,
    client: Client,
    events: UnboundedSender<WorkerEvent>,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a AppConfig, events: UnboundedSender<WorkerEvent>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("yt_grabber/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            config,
            client,
            events,
        })
    }

    /// Installs every tool flagged in `missing`, media tool first.
    pub fn install(&self, missing: MissingTools) -> Result<()> {
        fs::create_dir_all(&self.config.app_dir)?;
        if missing.media_tool {
            self.install_media_tool()?;
        }
        if missing.download_tool {
            self.install_download_tool()?;
        }
        Ok(())
    }

    fn install_download_tool(&self) -> Result<()> {
        let target = &self.config.download_tool_path;
        self.status(format!("Downloading {}...", Tool::DownloadTool));
        let response = self.get(&self.config.download_tool_url)?;
        let total = response.content_length();

        write_file_atomically(response, total, target, |percent| {
            self.progress(Tool::DownloadTool, percent)
        })?;

        info!(path = %target.display(), "yt-dlp installed");
        Ok(())
    }

    fn install_media_tool(&self) -> Result<()> {
        let app_dir = &self.config.app_dir;
        let Some(url) = self.config.media_tool_url.as_deref() else {
            return Err(AppError::NoManagedInstall { tool: "ffmpeg" });
        };
        self.status(format!("Downloading {}...", Tool::MediaTool));
        let response = self.get(url)?;
        let total = response.content_length();

        // Both temporaries live in app_dir so the final move is a rename on the same volume.
        let mut archive = tempfile::Builder::new()
            .prefix(".ffmpeg-")
            .suffix(".zip")
            .tempfile_in(app_dir)?;
        let received = copy_with_progress(response, archive.as_file_mut(), total, |percent| {
            self.progress(Tool::MediaTool, percent)
        })?;
        archive.as_file_mut().flush()?;
        debug!(bytes = received, "ffmpeg archive downloaded");

        self.status(format!("Extracting {}...", Tool::MediaTool));
        let staging = tempfile::Builder::new()
            .prefix(".ffmpeg-extract-")
            .tempdir_in(app_dir)?;
        extract_zip(archive.reopen()?, staging.path())?;
        let extracted = single_top_level_dir(staging.path())?;

        self.status(format!("Installing {}...", Tool::MediaTool));
        move_into_place(&extracted, &self.config.media_tool_dir)?;

        info!(path = %self.config.media_tool_dir.display(), "ffmpeg installed");
        Ok(())
    }

    fn get(&self, url: &str) -> Result<Response> {
        info!(url, "fetching");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    fn status(&self, message: String) {
        let _ = self.events.send(WorkerEvent::InstallStatus(message));
    }

    fn progress(&self, tool: Tool, percent: Option<f32>) {
        let _ = self.events.send(WorkerEvent::InstallProgress { tool, percent });
    }
}

/// Streams `reader` into a temporary file next to `target` and renames it over
/// `target` only once the whole body arrived. Nothing is left behind on failure.
pub fn write_file_atomically<R: Read>(
    reader: R,
    total: Option<u64>,
    target: &Path,
    on_progress: impl FnMut(Option<f32>),
) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let prefix = format!(
        ".{}-",
        target.file_name().unwrap_or_default().to_string_lossy()
    );
    let mut staged = tempfile::Builder::new().prefix(&prefix).tempfile_in(dir)?;
    copy_with_progress(reader, staged.as_file_mut(), total, on_progress)?;
    staged.as_file_mut().flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o755))?;
    }

    staged.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Streams `reader` into `writer`, reporting a percentage whenever the whole
/// percent changes. With no known total, reports `None` once up front.
pub fn copy_with_progress<R: Read, W: Write>(
    mut reader: R,
    writer: &mut W,
    total: Option<u64>,
    mut on_progress: impl FnMut(Option<f32>),
) -> io::Result<u64> {
    let total = total.filter(|&t| t > 0);
    on_progress(total.map(|_| 0.0));

    let mut received = 0_u64;
    let mut last_reported = 0_u32;
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        received += read as u64;

        if let Some(total) = total {
            let percent = (received as f64 / total as f64 * 100.0).min(100.0);
            if percent as u32 > last_reported {
                last_reported = percent as u32;
                on_progress(Some(percent as f32));
            }
        }
    }
    Ok(received)
}

/// Unpacks every entry of a zip archive below `destination`.
pub fn extract_zip<R: Read + io::Seek>(archive: R, destination: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(archive)?;
    fs::create_dir_all(destination)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        // Skips entries that would escape the destination.
        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "skipping unsafe archive entry");
            continue;
        };
        let outpath = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    Ok(())
}

/// The one directory an extracted archive is expected to contain.
pub fn single_top_level_dir(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Err(AppError::ArchiveLayout {
            found: entries.len(),
        }),
    }
}

/// Replaces `target` with `staged`. A previous install is kept as `<target>.old`
/// until the move succeeds and restored if it fails.
pub fn move_into_place(staged: &Path, target: &Path) -> Result<()> {
    let backup = backup_path(target);
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &backup)?;
    }

    match move_dir(staged, target) {
        Ok(()) => {
            if had_previous {
                if let Err(e) = fs::remove_dir_all(&backup) {
                    warn!(path = %backup.display(), error = %e, "could not remove previous install");
                }
            }
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "move into place failed, restoring previous install");
            if target.exists() {
                if let Err(cleanup) = fs::remove_dir_all(target) {
                    warn!(path = %target.display(), error = %cleanup, "could not remove partial install");
                }
            }
            if had_previous {
                if let Err(restore) = fs::rename(&backup, target) {
                    error!(
                        backup = %backup.display(),
                        error = %restore,
                        "could not restore previous install"
                    );
                }
            }
            Err(e.into())
        }
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".old");
    target.with_file_name(name)
}

/// Renames, falling back to copy-and-delete when the rename crosses volumes.
fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if from.is_dir() => {
            debug!(error = %e, "rename failed, copying instead");
            copy_dir_recursive(from, to)?;
            fs::remove_dir_all(from)
        }
        Err(e) => Err(e),
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
