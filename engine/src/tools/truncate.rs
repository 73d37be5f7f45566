//! Output clipping with spill-to-disk for oversized tool output.

use std::path::PathBuf;

pub const MAX_LINES: usize = 2000;
pub const MAX_BYTES: usize = 50 * 1024;

/// Clip `output` to the line/byte budget. Within limits the input comes back
/// unchanged; otherwise the full untruncated text is spilled under
/// `~/.openlink/tool-output/` and the preview ends with a hint naming the
/// spill path and total line count.
pub fn truncate(output: &str) -> (String, bool) {
    let normalized = output.replace("\r\n", "\n");
    let line_count = normalized.split('\n').count();
    if line_count <= MAX_LINES && normalized.len() <= MAX_BYTES {
        return (output.to_string(), false);
    }

    let mut preview = normalized
        .split('\n')
        .take(MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    if preview.len() > MAX_BYTES {
        let mut end = MAX_BYTES;
        while end > 0 && !preview.is_char_boundary(end) {
            end -= 1;
        }
        preview.truncate(end);
    }

    let spill = spill_output(output);
    let location = spill
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<spill failed>".to_string());
    preview.push_str(&format!(
        "\n\n... output truncated ({line_count} lines total), full content saved to:\n{location}\nuse the read_file tool with offset to read it in chunks"
    ));
    (preview, true)
}

fn spill_output(output: &str) -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(".openlink").join("tool-output");
    if let Err(err) = std::fs::create_dir_all(&dir) {
        tracing::warn!(?dir, %err, "failed to create spill directory");
        return None;
    }
    let id = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let path = dir.join(id.to_string());
    match std::fs::write(&path, output) {
        Ok(()) => Some(path),
        Err(err) => {
            tracing::warn!(?path, %err, "failed to spill tool output");
            None
        }
    }
}
