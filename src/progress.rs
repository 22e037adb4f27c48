/// Token yt-dlp prints at the start of its download progress lines.
const PROGRESS_MARKER: &str = "[download]";

/// Pulls the percentage out of a yt-dlp progress line such as
/// `[download]  42.3% of 10.00MiB at 1.20MiB/s ETA 00:07`.
///
/// Best effort: yt-dlp's console output is not a stable format, so anything
/// unexpected yields `None` and the caller keeps its previous value.
pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    if !line.contains(PROGRESS_MARKER) {
        return None;
    }
    let field = line.split_whitespace().find(|f| f.ends_with('%'))?;
    let value = field.strip_suffix('%')?.parse::<f32>().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}
