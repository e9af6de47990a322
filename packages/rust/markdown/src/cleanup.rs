//! Post-conversion cleanup passes for Markdown output.
//!
//! Each pass is a function `&str -> String` applied in sequence. Passes that
//! touch spacing leave fenced code blocks alone.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on converted Markdown.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = clean_blank_lines(md);
    result = outside_fences(&result, collapse_tag_adjacent_whitespace);
    result = trim_trailing_whitespace(&result);
    result.trim().to_owned()
}

// ---------------------------------------------------------------------------
// Pass 1: Collapse blank-line runs
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines outside code fences into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for (line, fenced) in fence_map(md) {
        let blank = !fenced && line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        result.push(line);
    }
    result.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Whitespace around inline tags
// ---------------------------------------------------------------------------

/// Collapse runs of spaces next to preserved inline tags to a single space.
fn collapse_tag_adjacent_whitespace(line: &str) -> String {
    static BEFORE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\S)[ \t]{2,}(<[a-zA-Z][a-zA-Z0-9]*(?:\s[^>]*)?>)").expect("valid regex")
    });
    static AFTER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(</[a-zA-Z][a-zA-Z0-9]*>)[ \t]{2,}(\S)").expect("valid regex")
    });

    let line = BEFORE_TAG_RE.replace_all(line, "$1 $2");
    AFTER_TAG_RE.replace_all(&line, "$1 $2").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: Trailing whitespace
// ---------------------------------------------------------------------------

/// Trim line ends outside code fences. Two or more trailing spaces before a
/// non-blank line are a hard break and are kept as exactly two.
fn trim_trailing_whitespace(md: &str) -> String {
    let lines = fence_map(md);
    lines
        .iter()
        .enumerate()
        .map(|(i, &(line, fenced))| {
            if fenced {
                return line.to_owned();
            }
            let trimmed = line.trim_end();
            let hard_break = line.ends_with("  ")
                && !trimmed.is_empty()
                && lines
                    .get(i + 1)
                    .is_some_and(|(next, _)| !next.trim().is_empty());
            if hard_break {
                format!("{trimmed}  ")
            } else {
                trimmed.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Fence tracking
// ---------------------------------------------------------------------------

/// Pair every line with whether it belongs to a fenced code block
/// (delimiters included).
fn fence_map(md: &str) -> Vec<(&str, bool)> {
    let mut lines = Vec::new();
    let mut open: Option<usize> = None;

    for line in md.lines() {
        let trimmed = line.trim_start();
        let ticks = trimmed.chars().take_while(|c| *c == '`').count();
        match open {
            Some(width) => {
                if ticks >= width && trimmed[ticks..].trim().is_empty() {
                    open = None;
                }
                lines.push((line, true));
            }
            None if ticks >= 3 => {
                open = Some(ticks);
                lines.push((line, true));
            }
            None => lines.push((line, false)),
        }
    }
    lines
}

/// Apply `pass` to every line outside fenced code blocks.
fn outside_fences(md: &str, pass: impl Fn(&str) -> String) -> String {
    fence_map(md)
        .into_iter()
        .map(|(line, fenced)| if fenced { line.to_owned() } else { pass(line) })
        .collect::<Vec<_>>()
        .join("\n")
}
