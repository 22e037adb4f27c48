use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::events::WorkerEvent;
use crate::model::{DownloadRequest, FormatKind};
use crate::progress::parse_progress_from_line;

/// yt-dlp format selector: best mp4 video under the height ceiling plus best
/// m4a audio, falling back to the best combined mp4 under the same ceiling.
pub fn format_selector(max_height: u32) -> String {
    format!(
        "bestvideo[height<={max_height}][ext=mp4]+bestaudio[ext=m4a]/best[height<={max_height}][ext=mp4]"
    )
}

/// Argument list passed to yt-dlp for `request`.
pub fn build_args(request: &DownloadRequest) -> Vec<String> {
    let mut args = vec![
        "--no-mtime".to_owned(),
        "--progress".to_owned(),
        "--newline".to_owned(),
    ];

    match request.format.kind() {
        FormatKind::Audio { codec } => {
            args.push("-x".to_owned());
            args.push("--audio-format".to_owned());
            args.push(codec.to_owned());
        }
        FormatKind::Video { max_height } => {
            args.push("-f".to_owned());
            args.push(format_selector(max_height));
            args.push("--merge-output-format".to_owned());
            args.push("mp4".to_owned());
        }
    }

    args.push("-o".to_owned());
    args.push(format!(
        "{}/%(title)s.%(ext)s",
        request.destination.display()
    ));
    args.push(request.url.clone());
    args
}

/// The inherited PATH with `media_tool_dir` in front, so yt-dlp finds ffmpeg.
pub fn augmented_path(media_tool_dir: Option<&Path>) -> OsString {
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let Some(dir) = media_tool_dir else {
        return inherited;
    };
    let paths = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&inherited));
    std::env::join_paths(paths).unwrap_or(inherited)
}

/// Runs yt-dlp for `request` and reports every output line and progress update.
pub async fn spawn_download(
    request: DownloadRequest,
    download_tool: &Path,
    media_tool_dir: Option<&Path>,
    events: UnboundedSender<WorkerEvent>,
) -> Result<()> {
    let args = build_args(&request);
    info!(tool = %download_tool.display(), ?args, "starting download");
    run_tool(download_tool, &args, augmented_path(media_tool_dir), &events).await
}

/// Spawns `program`, forwarding stdout line by line until EOF, then waits for
/// exit. Stderr is collected whole and returned in the error on non-zero exit.
pub async fn run_tool(
    program: &Path,
    args: &[String],
    path_env: OsString,
    events: &UnboundedSender<WorkerEvent>,
) -> Result<()> {
    let mut command = Command::new(program);
    command
        .args(args)
        .env("PATH", path_env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = command.spawn().map_err(|source| AppError::Spawn {
        program: program.to_path_buf(),
        source,
    })?;

    // Drained concurrently so a chatty stderr cannot fill its pipe and stall stdout.
    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf).trim().to_string();
            if line.is_empty() {
                continue;
            }
            debug!("yt-dlp> {}", line);
            if let Some(pct) = parse_progress_from_line(&line) {
                let _ = events.send(WorkerEvent::DownloadProgress(pct));
            }
            let _ = events.send(WorkerEvent::DownloadLine(line));
        }
    }

    let status = child.wait().await?;
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    if status.success() {
        info!("download finished");
        Ok(())
    } else {
        warn!(code = ?status.code(), %stderr, "yt-dlp failed");
        Err(AppError::ToolFailed {
            code: status.code(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownloadFormat;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tokio::sync::mpsc::unbounded_channel;

    fn request(format: DownloadFormat) -> DownloadRequest {
        DownloadRequest {
            url: "https://example/watch?v=x".to_string(),
            format,
            destination: PathBuf::from("/music"),
        }
    }

    #[test]
    fn mp3_extracts_audio() {
        let args = build_args(&request(DownloadFormat::Mp3));
        assert_eq!(
            args,
            vec![
                "--no-mtime",
                "--progress",
                "--newline",
                "-x",
                "--audio-format",
                "mp3",
                "-o",
                "/music/%(title)s.%(ext)s",
                "https://example/watch?v=x",
            ]
        );
        assert!(!args.iter().any(|a| a == "-f"));
    }

    #[test]
    fn video_selects_and_merges() {
        let args = build_args(&request(DownloadFormat::Video1080));
        assert_eq!(
            args,
            vec![
                "--no-mtime",
                "--progress",
                "--newline",
                "-f",
                "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[height<=1080][ext=mp4]",
                "--merge-output-format",
                "mp4",
                "-o",
                "/music/%(title)s.%(ext)s",
                "https://example/watch?v=x",
            ]
        );
    }

    #[test]
    fn four_k_caps_both_clauses() {
        let args = build_args(&request(DownloadFormat::Video4k));
        let selector = &args[args.iter().position(|a| a == "-f").unwrap() + 1];
        assert_eq!(selector.matches("height<=2160").count(), 2);
    }

    #[test]
    fn audio_and_video_flags_are_exclusive() {
        for format in DownloadFormat::ALL {
            let args = build_args(&request(format));
            let audio = args.iter().any(|a| a == "-x") && args.iter().any(|a| a == "--audio-format");
            let video = args.iter().any(|a| a == "-f")
                && args.iter().any(|a| a == "--merge-output-format");
            assert!(audio ^ video, "{format}: {args:?}");
        }
    }

    #[test]
    fn url_is_last() {
        let args = build_args(&request(DownloadFormat::Wav));
        assert_eq!(args.last().map(String::as_str), Some("https://example/watch?v=x"));
    }

    #[test]
    fn media_dir_is_prepended() {
        let dir = PathBuf::from("/opt/app/ffmpeg/bin");
        let path = augmented_path(Some(&dir));
        let first = std::env::split_paths(&path).next();
        assert_eq!(first, Some(dir));
    }

    #[test]
    fn path_untouched_without_media_dir() {
        assert_eq!(
            augmented_path(None),
            std::env::var_os("PATH").unwrap_or_default()
        );
    }

    #[cfg(unix)]
    fn sh_args(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_forwards_lines_and_progress() {
        let (tx, mut rx) = unbounded_channel();
        let script = "echo '[youtube] x: Downloading webpage'; echo '[download]  42.5% of 10.00MiB'";

        run_tool(Path::new("sh"), &sh_args(script), augmented_path(None), &tx)
            .await
            .unwrap();
        drop(tx);

        let mut lines = Vec::new();
        let mut progress = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::DownloadLine(line) => lines.push(line),
                WorkerEvent::DownloadProgress(p) => progress.push(p),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(
            lines,
            vec![
                "[youtube] x: Downloading webpage".to_string(),
                "[download]  42.5% of 10.00MiB".to_string(),
            ]
        );
        assert_eq!(progress, vec![42.5]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let (tx, _rx) = unbounded_channel();
        let script = "echo 'ERROR: Unsupported URL: nope' >&2; exit 1";

        let err = run_tool(Path::new("sh"), &sh_args(script), augmented_path(None), &tx)
            .await
            .unwrap_err();

        match err {
            AppError::ToolFailed { code, stderr } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("ERROR: Unsupported URL: nope"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let (tx, _rx) = unbounded_channel();
        let err = run_tool(
            Path::new("/definitely/not/here/yt-dlp"),
            &[],
            augmented_path(None),
            &tx,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Spawn { .. }));
    }
}
