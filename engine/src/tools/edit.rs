//! Fuzzy string replacement: locate one unique occurrence of `old_string`
//! under the deformations LLM output commonly introduces (CRLF, shifted
//! indentation, escape-encoded newlines, collapsed whitespace, structurally
//! similar blocks) and rewrite it.
//!
//! Each replacer proposes candidate substrings of the content; the engine
//! arbitrates uniqueness. Earlier replacers are stricter; the order is
//! load-bearing.

use std::sync::LazyLock;

use regex::Regex;

use super::sandbox::resolve_tool_path;
use super::{Context, ResultTimer, Tool, ToolError, ToolFut, arg_bool, arg_str};

const MULTI_CANDIDATE_SIMILARITY_THRESHOLD: f64 = 0.3;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReplaceError {
    #[error("no changes to apply: old_string and new_string are identical")]
    NoChange,
    #[error(
        "could not find old_string in the file; it must match exactly, including whitespace, indentation, and line endings"
    )]
    NotFound,
    #[error(
        "found multiple matches for old_string; provide more surrounding context to make the match unique"
    )]
    MultipleMatches,
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Classical edit distance over bytes, unit costs.
fn levenshtein(a: &str, b: &str) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (prev[j + 1] + 1).min(current[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

/// `1 - lev/maxlen` per line pair, averaged over the overlapping interior.
/// An empty overlap, or a pair of empty lines, counts as fully similar.
fn block_similarity(
    original_lines: &[&str],
    start: usize,
    end: usize,
    search_lines: &[&str],
) -> f64 {
    let search_block = search_lines.len();
    let actual_block = end - start + 1;
    let lines_to_check = (search_block - 2).min(actual_block - 2);
    if lines_to_check == 0 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut j = 1;
    while j < search_block - 1 && j < actual_block - 1 {
        let original = original_lines[start + j].trim();
        let search = search_lines[j].trim();
        let max_len = original.len().max(search.len());
        if max_len == 0 {
            total += 1.0;
        } else {
            total += 1.0 - levenshtein(original, search) as f64 / max_len as f64;
        }
        j += 1;
    }
    total / lines_to_check as f64
}

/// Byte range of the line run `[start, end]` within `content`.
fn line_run_slice<'a>(content: &'a str, lines: &[&str], start: usize, end: usize) -> &'a str {
    let mut offset = 0;
    for line in lines.iter().take(start) {
        offset += line.len() + 1;
    }
    let mut stop = offset;
    for (k, line) in lines.iter().enumerate().take(end + 1).skip(start) {
        stop += line.len();
        if k < end {
            stop += 1;
        }
    }
    &content[offset..stop]
}

type Replacer = fn(&str, &str) -> Vec<String>;

/// 1. Exact: the find string itself is always the first candidate.
fn simple_replacer(_content: &str, find: &str) -> Vec<String> {
    vec![find.to_string()]
}

/// 2. Match a run of content lines whose trimmed forms equal the trimmed
/// find lines; emit the run with its original whitespace.
fn line_trimmed_replacer(content: &str, find: &str) -> Vec<String> {
    let content_lines: Vec<&str> = content.split('\n').collect();
    let mut search_lines: Vec<&str> = find.split('\n').collect();
    if search_lines.last() == Some(&"") {
        search_lines.pop();
    }
    if search_lines.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    if content_lines.len() < search_lines.len() {
        return results;
    }
    for i in 0..=content_lines.len() - search_lines.len() {
        let matches = search_lines
            .iter()
            .enumerate()
            .all(|(j, search)| content_lines[i + j].trim() == search.trim());
        if matches {
            results.push(
                line_run_slice(content, &content_lines, i, i + search_lines.len() - 1).to_string(),
            );
        }
    }
    results
}

/// 3. Anchor on the first and last find lines; pick the interior by
/// similarity. A single anchored candidate is accepted outright; with
/// several, the best average interior similarity wins if it clears the
/// threshold.
fn block_anchor_replacer(content: &str, find: &str) -> Vec<String> {
    let content_lines: Vec<&str> = content.split('\n').collect();
    let mut search_lines: Vec<&str> = find.split('\n').collect();
    if search_lines.len() < 3 {
        return Vec::new();
    }
    if search_lines.last() == Some(&"") {
        search_lines.pop();
    }
    if search_lines.len() < 3 {
        return Vec::new();
    }

    let first_search = search_lines[0].trim();
    let last_search = search_lines[search_lines.len() - 1].trim();

    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for i in 0..content_lines.len() {
        if content_lines[i].trim() != first_search {
            continue;
        }
        for j in i + 2..content_lines.len() {
            if content_lines[j].trim() == last_search {
                candidates.push((i, j));
                break;
            }
        }
    }

    match candidates.len() {
        0 => Vec::new(),
        1 => {
            let (start, end) = candidates[0];
            vec![line_run_slice(content, &content_lines, start, end).to_string()]
        }
        _ => {
            let mut best: Option<(usize, usize)> = None;
            let mut best_similarity = -1.0;
            for &(start, end) in &candidates {
                let similarity = block_similarity(&content_lines, start, end, &search_lines);
                if similarity > best_similarity {
                    best_similarity = similarity;
                    best = Some((start, end));
                }
            }
            match best {
                Some((start, end)) if best_similarity >= MULTI_CANDIDATE_SIMILARITY_THRESHOLD => {
                    vec![line_run_slice(content, &content_lines, start, end).to_string()]
                }
                _ => Vec::new(),
            }
        }
    }
}

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// 4. Collapse whitespace runs. Single-line equality emits the original
/// line; containment rebuilds the original span with a token regex;
/// a multi-line find additionally slides a window over normalized blocks.
fn whitespace_normalized_replacer(content: &str, find: &str) -> Vec<String> {
    let normalized_find = normalize_whitespace(find);
    let lines: Vec<&str> = content.split('\n').collect();
    let mut results = Vec::new();

    for line in &lines {
        let normalized_line = normalize_whitespace(line);
        if normalized_line == normalized_find {
            results.push((*line).to_string());
        } else if normalized_line.contains(&normalized_find) {
            let tokens: Vec<String> = find.trim().split_whitespace().map(regex::escape).collect();
            if tokens.is_empty() {
                continue;
            }
            let pattern = tokens.join(r"\s+");
            if let Ok(re) = Regex::new(&pattern) {
                if let Some(found) = re.find(line) {
                    results.push(found.as_str().to_string());
                }
            }
        }
    }

    let find_lines: Vec<&str> = find.split('\n').collect();
    if find_lines.len() > 1 && lines.len() >= find_lines.len() {
        for i in 0..=lines.len() - find_lines.len() {
            let block = lines[i..i + find_lines.len()].join("\n");
            if normalize_whitespace(&block) == normalized_find {
                results.push(block);
            }
        }
    }
    results
}

/// Strip the common minimum leading whitespace from non-blank lines.
fn remove_indentation(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    if min_indent == 0 {
        return text.to_string();
    }
    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                (*line).to_string()
            } else {
                line[min_indent..].to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 5. Compare indent-stripped forms over a sliding window.
fn indentation_flexible_replacer(content: &str, find: &str) -> Vec<String> {
    let normalized_find = remove_indentation(find);
    let content_lines: Vec<&str> = content.split('\n').collect();
    let find_lines: Vec<&str> = find.split('\n').collect();

    let mut results = Vec::new();
    if content_lines.len() < find_lines.len() {
        return results;
    }
    for i in 0..=content_lines.len() - find_lines.len() {
        let block = content_lines[i..i + find_lines.len()].join("\n");
        if remove_indentation(&block) == normalized_find {
            results.push(block);
        }
    }
    results
}

static ESCAPE_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\(n|t|r|'|"|`|\\|\n|\$)"#).unwrap());

fn unescape_string(text: &str) -> String {
    ESCAPE_SEQUENCE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match &caps[1] {
                "n" | "\n" => "\n",
                "t" => "\t",
                "r" => "\r",
                "'" => "'",
                "\"" => "\"",
                "`" => "`",
                "\\" => "\\",
                "$" => "$",
                other => other,
            }
            .to_string()
        })
        .into_owned()
}

/// 6. Decode backslash escapes in the find string; match the decoded form
/// directly or against per-block decoded windows.
fn escape_normalized_replacer(content: &str, find: &str) -> Vec<String> {
    let unescaped_find = unescape_string(find);
    let mut results = Vec::new();

    if content.contains(&unescaped_find) {
        results.push(unescaped_find.clone());
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let find_lines: Vec<&str> = unescaped_find.split('\n').collect();
    if lines.len() >= find_lines.len() {
        for i in 0..=lines.len() - find_lines.len() {
            let block = lines[i..i + find_lines.len()].join("\n");
            if unescape_string(&block) == unescaped_find {
                results.push(block);
            }
        }
    }
    results
}

/// 7. Only active when trimming the find string changes it: match the
/// trimmed form directly or via trimmed windows.
fn trimmed_boundary_replacer(content: &str, find: &str) -> Vec<String> {
    let trimmed_find = find.trim();
    if trimmed_find == find {
        return Vec::new();
    }

    let mut results = Vec::new();
    if content.contains(trimmed_find) {
        results.push(trimmed_find.to_string());
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let find_lines: Vec<&str> = find.split('\n').collect();
    if lines.len() >= find_lines.len() {
        for i in 0..=lines.len() - find_lines.len() {
            let block = lines[i..i + find_lines.len()].join("\n");
            if block.trim() == trimmed_find {
                results.push(block);
            }
        }
    }
    results
}

/// 8. Some models collapse newline+indent to a bare tab; re-expand and let
/// the arbitration check whether the expanded form exists.
fn tab_newline_replacer(_content: &str, find: &str) -> Vec<String> {
    if find.contains('\n') || !find.contains('\t') {
        return Vec::new();
    }
    vec![find.replace('\t', "\n\t")]
}

/// 9. Anchor first/last lines over windows of exactly the find's length and
/// accept the first window whose interior matches at least half of the
/// non-empty line pairs.
fn context_aware_replacer(content: &str, find: &str) -> Vec<String> {
    let mut find_lines: Vec<&str> = find.split('\n').collect();
    if find_lines.len() < 3 {
        return Vec::new();
    }
    if find_lines.last() == Some(&"") {
        find_lines.pop();
    }
    if find_lines.len() < 3 {
        return Vec::new();
    }

    let first_line = find_lines[0].trim();
    let last_line = find_lines[find_lines.len() - 1].trim();
    let content_lines: Vec<&str> = content.split('\n').collect();

    for i in 0..content_lines.len() {
        if content_lines[i].trim() != first_line {
            continue;
        }
        for j in i + 2..content_lines.len() {
            if content_lines[j].trim() != last_line {
                continue;
            }
            let block = &content_lines[i..=j];
            if block.len() != find_lines.len() {
                break;
            }
            let mut matching = 0usize;
            let mut non_empty = 0usize;
            for k in 1..block.len() - 1 {
                let block_line = block[k].trim();
                let find_line = find_lines[k].trim();
                if !block_line.is_empty() || !find_line.is_empty() {
                    non_empty += 1;
                    if block_line == find_line {
                        matching += 1;
                    }
                }
            }
            if non_empty == 0 || matching as f64 / non_empty as f64 >= 0.5 {
                return vec![block.join("\n")];
            }
            break;
        }
    }
    Vec::new()
}

/// 10. One candidate per literal occurrence: surfaces multiplicity for
/// error reporting and enables replace_all.
fn multi_occurrence_replacer(content: &str, find: &str) -> Vec<String> {
    content.matches(find).map(str::to_string).collect()
}

const REPLACERS: &[Replacer] = &[
    simple_replacer,
    line_trimmed_replacer,
    block_anchor_replacer,
    whitespace_normalized_replacer,
    indentation_flexible_replacer,
    escape_normalized_replacer,
    trimmed_boundary_replacer,
    tab_newline_replacer,
    context_aware_replacer,
    multi_occurrence_replacer,
];

/// Replace one unique occurrence of `old` with `new` (or every occurrence
/// when `replace_all`). Candidates that appear more than once are skipped as
/// ambiguous; if every matching candidate was ambiguous the whole call fails
/// with `MultipleMatches`.
pub fn replace(
    content: &str,
    old: &str,
    new: &str,
    replace_all: bool,
) -> Result<String, ReplaceError> {
    if old == new {
        return Err(ReplaceError::NoChange);
    }
    if old.is_empty() {
        return Err(ReplaceError::NotFound);
    }

    let mut found = false;
    for replacer in REPLACERS {
        for candidate in replacer(content, old) {
            let Some(first) = content.find(&candidate) else {
                continue;
            };
            found = true;
            if replace_all {
                return Ok(content.replace(&candidate, new));
            }
            let last = content.rfind(&candidate).unwrap_or(first);
            if first != last {
                continue;
            }
            let mut result = String::with_capacity(content.len() + new.len());
            result.push_str(&content[..first]);
            result.push_str(new);
            result.push_str(&content[first + candidate.len()..]);
            return Ok(result);
        }
    }

    Err(if found {
        ReplaceError::MultipleMatches
    } else {
        ReplaceError::NotFound
    })
}

// ── The edit tool ───────────────────────────────────────────────────────────

pub struct EditTool;

impl Tool for EditTool {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn description(&self) -> &'static str {
        "Replace a string in a file (exact match)"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "file path" },
                "old_string": { "type": "string", "description": "text to replace" },
                "new_string": { "type": "string", "description": "replacement text" },
                "replace_all": {
                    "type": "boolean",
                    "description": "replace all occurrences (default false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    fn validate(&self, args: &openlink_types::ArgMap) -> Result<(), ToolError> {
        if arg_str(args, "path").is_none_or(str::is_empty) {
            return Err(ToolError::bad_args("path is required"));
        }
        if arg_str(args, "old_string").is_none() {
            return Err(ToolError::bad_args("old_string is required"));
        }
        if arg_str(args, "new_string").is_none() {
            return Err(ToolError::bad_args("new_string is required"));
        }
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: Context<'a>) -> ToolFut<'a> {
        Box::pin(async move {
            let timer = ResultTimer::start();
            let path = arg_str(ctx.args, "path").unwrap_or_default();
            let old = arg_str(ctx.args, "old_string").unwrap_or_default();
            let new = arg_str(ctx.args, "new_string").unwrap_or_default();
            let replace_all = arg_bool(ctx.args, "replace_all");

            let resolved = match resolve_tool_path(path, &ctx.config.root_dir) {
                Ok(p) => p,
                Err(err) => return timer.failure(err.to_string()),
            };

            let raw = match tokio::fs::read_to_string(&resolved).await {
                Ok(raw) => raw,
                Err(err) => return timer.failure(err.to_string()),
            };
            let content = normalize_line_endings(&raw);

            let replaced = match replace(&content, old, new, replace_all) {
                Ok(replaced) => replaced,
                Err(err) => return timer.failure(err.to_string()),
            };

            if let Err(err) = tokio::fs::write(&resolved, &replaced).await {
                return timer.failure(err.to_string());
            }
            timer.success(format!("Replaced '{old}' with '{new}'"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_replaces_once() {
        assert_eq!(replace("hello world", "world", "go", false).unwrap(), "hello go");
    }

    #[test]
    fn replace_all_occurrences() {
        assert_eq!(replace("a a a", "a", "b", true).unwrap(), "b b b");
        assert_eq!(replace("foo foo", "foo", "bar", true).unwrap(), "bar bar");
    }

    #[test]
    fn missing_old_string_errors() {
        assert_eq!(
            replace("hello", "missing", "x", false).unwrap_err(),
            ReplaceError::NotFound
        );
    }

    #[test]
    fn identical_old_and_new_errors() {
        assert_eq!(
            replace("hello", "hello", "hello", false).unwrap_err(),
            ReplaceError::NoChange
        );
    }

    #[test]
    fn multiple_matches_error() {
        assert_eq!(
            replace("foo foo", "foo", "bar", false).unwrap_err(),
            ReplaceError::MultipleMatches
        );
    }

    #[test]
    fn crlf_normalized_match() {
        let content = normalize_line_endings("a\r\nb");
        assert!(replace(&content, "a\nb", "x", false).is_ok());
    }

    #[test]
    fn line_trimmed_match_preserves_site_whitespace() {
        let got = replace("  hello\n  world\n", "hello\nworld", "hi\nthere", false).unwrap();
        assert_eq!(got, "hi\nthere\n");
    }

    #[test]
    fn indentation_flexible_match() {
        let content = "func main() {\n\t\tfmt.Println(\"hello\")\n\t}";
        let find = "func main() {\n\tfmt.Println(\"hello\")\n}";
        assert!(replace(content, find, "X", false).is_ok());
    }

    #[test]
    fn escape_normalized_match() {
        assert!(replace("line1\nline2\nline3", "line1\\nline2\\nline3", "X", false).is_ok());
    }

    #[test]
    fn trimmed_boundary_match() {
        assert!(replace("  hello world  ", "  hello world  \n", "X", false).is_ok());
    }

    #[test]
    fn tab_newline_match() {
        let content = "line\n\tindented";
        let find = "line\tindented";
        assert_eq!(replace(content, find, "X", false).unwrap(), "X");
    }

    #[test]
    fn whitespace_normalized_single_line() {
        let content = "let  x   =  1;";
        let find = "let x = 1;";
        assert_eq!(replace(content, find, "let y = 2;", false).unwrap(), "let y = 2;");
    }

    #[test]
    fn block_anchor_single_candidate_accepted() {
        let content = "fn start() {\n    let a = compute();\n    a.await\n}";
        let find = "fn start() {\n    let b = compute();\n    a.await\n}";
        let got = replace(content, find, "REPLACED", false).unwrap();
        assert_eq!(got, "REPLACED");
    }

    #[test]
    fn block_anchor_picks_most_similar_of_many() {
        let content = concat!(
            "if ready {\n    launch_rockets();\n}\n",
            "if ready {\n    write_logs();\n}\n",
        );
        let find = "if ready {\n    write_log();\n}";
        let got = replace(content, find, "DONE", false).unwrap();
        assert!(got.contains("launch_rockets"));
        assert!(got.contains("DONE"));
        assert!(!got.contains("write_logs"));
    }

    #[test]
    fn anchored_block_with_edited_interior_resolved() {
        let content = "begin\none\ntwo\nthree\nend";
        let find = "begin\none\nTWO\nthree\nend";
        let got = replace(content, find, "X", false).unwrap();
        assert_eq!(got, "X");
    }

    #[test]
    fn context_aware_replacer_accepts_half_matching_interior() {
        let content = "begin\none\ntwo\nthree\nend";
        let find = "begin\none\nTWO\nthree\nend";
        assert_eq!(context_aware_replacer(content, find), vec![content.to_string()]);
    }

    #[test]
    fn context_aware_replacer_rejects_low_interior_match() {
        let content = "begin\nAAA\nBBB\nCCC\nend";
        let find = "begin\nxxx\nyyy\nzzz\nend";
        assert!(context_aware_replacer(content, find).is_empty());
    }

    #[test]
    fn ambiguous_fuzzy_candidates_error() {
        // Both trimmed-line sites resolve to the same ambiguous text.
        let err = replace("  x\n--\n  x", "x", "y", false).unwrap_err();
        assert_eq!(err, ReplaceError::MultipleMatches);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn remove_indentation_strips_common_prefix() {
        assert_eq!(remove_indentation("  a\n    b"), "a\n  b");
        assert_eq!(remove_indentation("a\n  b"), "a\n  b");
        assert_eq!(remove_indentation("\t\ta\n\t\tb"), "a\nb");
    }

    #[test]
    fn unescape_decodes_common_sequences() {
        assert_eq!(unescape_string(r"a\nb"), "a\nb");
        assert_eq!(unescape_string(r"a\tb"), "a\tb");
        assert_eq!(unescape_string(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape_string(r"price \$5"), "price $5");
        assert_eq!(unescape_string(r"back\\slash"), "back\\slash");
    }

    #[test]
    fn empty_old_string_is_not_found() {
        assert_eq!(
            replace("abc", "", "x", false).unwrap_err(),
            ReplaceError::NotFound
        );
    }

    #[test]
    fn multiline_replace_all_via_trimmed_lines() {
        let content = "  a\n  b\n--\n  a\n  b\n";
        let got = replace(content, "  a\n  b", "Z", true).unwrap();
        assert_eq!(got, "Z\n--\nZ\n");
    }
}
