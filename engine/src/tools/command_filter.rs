//! Shell-aware dangerous-command detection for `exec_cmd`.
//!
//! Two pattern classes: multi-word patterns match anywhere as substrings
//! (they contain spaces or punctuation and cannot collide with path
//! segments), while single-word commands only match between shell
//! separators or string edges, so `ncdu` is not `nc` and `shutdownapp` is
//! not `shutdown`.

/// Multi-word patterns, matched as plain substrings.
const SUBSTRING_PATTERNS: &[&str] = &["rm -rf", "rm -fr", "> /dev/", "chmod 777", "kill -9"];

/// Single-word commands, matched only at separator or string boundaries.
/// curl/wget are ordinary network tools and deliberately not listed.
const WORD_PATTERNS: &[&str] = &[
    "mkfs", "format", "nc", "netcat", "sudo", "reboot", "shutdown",
];

fn is_separator(byte: u8) -> bool {
    matches!(
        byte,
        b' ' | b'\t' | b'\n' | b';' | b'|' | b'&' | b'(' | b')' | b'`' | b'\'' | b'"' | b'<' | b'>'
    )
}

/// Case-insensitive check over the whole command line.
pub fn is_dangerous_command(command: &str) -> bool {
    let lower = command.to_lowercase();

    if SUBSTRING_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    let bytes = lower.as_bytes();
    for word in WORD_PATTERNS {
        for (pos, matched) in lower.match_indices(word) {
            let before = pos == 0 || is_separator(bytes[pos - 1]);
            let end = pos + matched.len();
            // A dotted suffix still names the command (mkfs.ext4, shutdown.exe).
            let after = end >= bytes.len() || is_separator(bytes[end]) || bytes[end] == b'.';
            if before && after {
                return true;
            }
        }
    }
    false
}
