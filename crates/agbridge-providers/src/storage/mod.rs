mod container;
mod local;

pub use container::{ContainerExec, ContainerStorage, DockerExec, ExecOutput};
pub use local::LocalStorage;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};

/// One file or directory as seen by a storage scan.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl StorageEntry {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn file_stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|n| n.to_str())
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.path.extension().is_some_and(|e| e == ext)
    }
}

/// Search query compiled once, usable both in-process and as a grep argument.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    source: String,
    literal: bool,
    case_insensitive: bool,
    regex: Regex,
}

impl SearchPattern {
    /// Plain substring match.
    pub fn literal(query: &str) -> Result<Self> {
        Self::build(query, true, false)
    }

    /// Regular expression in Rust `regex` syntax.
    ///
    /// Container search runs `grep -E`, which gets [`SearchPattern::posix_ere`]:
    /// `\d`, `\w`, `\s` and their negations, lazy quantifiers and `(?:` groups
    /// are rewritten. Anything else ERE lacks (Unicode classes, `\b`, inline
    /// flags) can match differently inside a container.
    pub fn regex(query: &str) -> Result<Self> {
        Self::build(query, false, false)
    }

    pub fn build(query: &str, literal: bool, case_insensitive: bool) -> Result<Self> {
        if query.is_empty() {
            return Err(Error::Parse("Search query is empty".to_string()));
        }
        let pattern = if literal {
            regex::escape(query)
        } else {
            query.to_string()
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            source: query.to_string(),
            literal,
            case_insensitive,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The query as a POSIX extended regular expression for `grep -E`.
    pub fn posix_ere(&self) -> String {
        if self.literal {
            return self.source.clone();
        }
        to_posix_ere(&self.source)
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Read-mostly view of a backend's storage root.
///
/// Every method is one blocking round trip. A missing path is reported as an
/// `Io` error of kind `NotFound`; use [`or_empty`] where absence means "no
/// sessions".
pub trait Storage: Send + Sync {
    /// Direct children of `dir` (files and directories).
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>>;

    /// Regular files below `root`, at most `max_depth` levels deep.
    fn walk_files(&self, root: &Path, max_depth: usize) -> Result<Vec<StorageEntry>>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    fn read_first_line(&self, path: &Path) -> Result<Option<String>>;

    /// Remove a file or directory tree. Returns false when nothing was there.
    fn remove(&self, path: &Path) -> Result<bool>;

    /// Files under `root` with at least one matching line, with the number of
    /// matching lines per file.
    fn grep(&self, root: &Path, pattern: &SearchPattern) -> Result<Vec<(PathBuf, usize)>>;
}

/// Map "not found" to an empty listing; propagate everything else.
pub fn or_empty<T>(result: Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

pub(crate) fn not_found(path: &Path) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No such file or directory: {}", path.display()),
    ))
}

/// Bracket body for a Perl class escape, and whether it is negated.
fn class_body(escape: char) -> Option<(&'static str, bool)> {
    match escape {
        'd' => Some(("[:digit:]", false)),
        'D' => Some(("[:digit:]", true)),
        'w' => Some(("[:alnum:]_", false)),
        'W' => Some(("[:alnum:]_", true)),
        's' => Some(("[:space:]", false)),
        'S' => Some(("[:space:]", true)),
        _ => None,
    }
}

fn to_posix_ere(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut chars = source.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(next) = chars.next() else {
                    out.push('\\');
                    break;
                };
                match class_body(next) {
                    Some((body, false)) if in_class => out.push_str(body),
                    Some((body, negated)) if !in_class => {
                        out.push('[');
                        if negated {
                            out.push('^');
                        }
                        out.push_str(body);
                        out.push(']');
                    }
                    // negated class inside brackets has no ERE spelling
                    _ => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                if chars.peek() == Some(&']') {
                    chars.next();
                    out.push(']');
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '(' if !in_class => {
                let mut ahead = chars.clone();
                if ahead.next() == Some('?') && ahead.next() == Some(':') {
                    chars.next();
                    chars.next();
                }
                out.push('(');
            }
            '+' | '*' | '?' | '}' if !in_class => {
                out.push(c);
                // lazy and greedy agree on whether a line matches
                if chars.peek() == Some(&'?') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}
