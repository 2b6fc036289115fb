use regex::Regex;
use std::sync::LazyLock;

const FALLBACK: &str = "Backend exited unexpectedly.";

// Stack frames from JS, Python and Rust panics
static TRACE_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^\s*(at\s.+|File\s+".*|Traceback\b.*|\d+:\s+0x[0-9a-f]+.*|stack backtrace:.*)$"#).ok()
});

static TYPE_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*(?:\[error\]|anyhow::Error:|[A-Za-z]*Error:|error:))+\s*").ok()
});

static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Turn raw backend stderr into one readable sentence.
///
/// ```
/// use agbridge_runtime::sanitize_error;
///
/// let raw = "TypeError: cannot read config\n    at main (cli.js:10:3)";
/// assert_eq!(sanitize_error(raw), "Cannot read config.");
/// ```
pub fn sanitize_error(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !TRACE_LINE.as_ref().is_some_and(|re| re.is_match(line)))
        .collect();
    let joined = kept.join(" ");

    let without_prefix = match TYPE_PREFIX.as_ref() {
        Some(re) => re.replace(&joined, "").into_owned(),
        None => joined,
    };
    let collapsed = match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(without_prefix.trim(), " ").into_owned(),
        None => without_prefix.trim().to_string(),
    };

    let mut chars = collapsed.chars();
    let Some(first) = chars.next() else {
        return FALLBACK.to_string();
    };
    let mut message: String = first.to_uppercase().chain(chars).collect();
    if !message.ends_with(['.', '!', '?']) {
        message.push('.');
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_js_stack() {
        let raw = "Error: Invalid API key\n    at Object.run (/usr/lib/node_modules/x/cli.js:1:2)\n    at process.processTicksAndRejections (node:internal)\n";
        assert_eq!(sanitize_error(raw), "Invalid API key.");
    }

    #[test]
    fn test_strips_python_traceback() {
        let raw = "Traceback (most recent call last):\n  File \"main.py\", line 3, in <module>\nValueError: model not found";
        assert_eq!(sanitize_error(raw), "Model not found.");
    }

    #[test]
    fn test_prefixes_and_whitespace() {
        assert_eq!(sanitize_error("[error]   rate   limited"), "Rate limited.");
        assert_eq!(sanitize_error("error: no such session!"), "No such session!");
        assert_eq!(sanitize_error("anyhow::Error: boom"), "Boom.");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(sanitize_error(""), FALLBACK);
        assert_eq!(sanitize_error("   \n  at foo (bar.js:1:1)\n"), FALLBACK);
    }
}
