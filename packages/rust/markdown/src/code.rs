//! Code block language detection and formatting.

use std::sync::LazyLock;

use feedport_shared::{FeedportError, Result};
use regex::Regex;

static LANGUAGE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:language|lang)-([\w#+.-]+)").expect("valid regex")
});

static BRUSH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)brush:\s*([\w#+.-]+)").expect("valid regex"));

/// Language named by a class attribute, either `language-xxx`/`lang-xxx`
/// or the legacy SyntaxHighlighter `brush: xxx` form.
pub fn language_from_class(class: &str) -> Option<String> {
    LANGUAGE_CLASS_RE
        .captures(class)
        .or_else(|| BRUSH_RE.captures(class))
        .map(|caps| canonical_language(&caps[1]))
}

/// Canonical name for a language label, translating legacy aliases.
pub fn canonical_language(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    let canonical = match label.as_str() {
        "jscript" | "javascript" => "js",
        "plain" | "text" => "text",
        "xml" | "xhtml" | "html" => "markup",
        "c#" | "c-sharp" | "csharp" => "csharp",
        "vb" => "vbnet",
        "py" => "python",
        "rb" => "ruby",
        "ps" => "powershell",
        "shell" | "sh" => "bash",
        "delphi" => "pascal",
        "erl" => "erlang",
        other => other,
    };
    canonical.to_owned()
}

/// Reformats code of one language.
pub trait CodeFormatter: Send + Sync {
    /// Canonical language names this formatter handles.
    fn languages(&self) -> &[&str];

    fn format(&self, code: &str) -> Result<String>;
}

/// Pretty-prints JSON with two-space indentation.
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl CodeFormatter for JsonFormatter {
    fn languages(&self) -> &[&str] {
        &["json"]
    }

    fn format(&self, code: &str) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(code)
            .map_err(|e| FeedportError::Conversion(format!("invalid JSON in code block: {e}")))?;
        serde_json::to_string_pretty(&value)
            .map_err(|e| FeedportError::Conversion(format!("failed to print JSON: {e}")))
    }
}

/// Fenced block for `code`, with a fence long enough that no backtick run
/// inside the code can close it.
pub fn fenced_block(code: &str, language: Option<&str>) -> String {
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest_run + 1).max(3));
    let code = code.trim_matches('\n');
    format!("{fence}{}\n{code}\n{fence}", language.unwrap_or_default())
}
