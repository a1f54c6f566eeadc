//! Terraform variable files and command-line variable overrides.
//!
//! Pure functions only; file contents are read by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::ConfigError;

/// Flat key/value view of one or more variable files.
pub type VarMap = BTreeMap<String, String>;

static ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // static pattern, verified by tests
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(.*?)\s*$").expect("valid regex")
});

static HEREDOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // static pattern, verified by tests
    Regex::new(r"^<<(-?)([A-Za-z_][A-Za-z0-9_]*)$").expect("valid regex")
});

/// Parse the contents of a `.tfvars` file into a flat mapping.
///
/// Quoted strings are unquoted, bare scalars (numbers, bools) are kept as
/// written, and multi-line list/map values are kept as raw text. Heredoc
/// values (`<<EOF`, `<<-EOF`) become their body; `<<-` strips the common
/// indentation. `/* */` block comments are skipped.
///
/// # Errors
///
/// Returns `ConfigError::InvalidVarLine` for a line that is not a comment,
/// blank, or `key = value` assignment, and for an unterminated heredoc,
/// block comment, or multi-line value.
pub fn parse_tfvars(file: &str, text: &str) -> Result<VarMap, ConfigError> {
    let mut vars = VarMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((idx, raw)) = lines.next() {
        let mut line = raw.trim();
        if line.starts_with("/*") {
            line = skip_block_comment(line, &mut lines).ok_or_else(|| ConfigError::InvalidVarLine {
                file: file.to_string(),
                line: idx + 1,
                text: raw.trim().to_string(),
            })?;
        }
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let invalid = || ConfigError::InvalidVarLine {
            file: file.to_string(),
            line: idx + 1,
            text: line.to_string(),
        };
        let caps = ASSIGNMENT_RE.captures(line).ok_or_else(invalid)?;
        let key = caps[1].to_string();
        let mut value = caps[2].to_string();

        if let Some(heredoc) = HEREDOC_RE.captures(&value) {
            let indented = !heredoc[1].is_empty();
            let marker = &heredoc[2];
            let mut body = Vec::new();
            loop {
                let (_, next) = lines.next().ok_or_else(invalid)?;
                if next.trim() == marker {
                    break;
                }
                body.push(next);
            }
            let text = if indented { dedent(&body) } else { body.join("\n") };
            vars.insert(key, text);
            continue;
        }

        if value.starts_with('[') || value.starts_with('{') {
            while bracket_depth(&value) > 0 {
                let (_, next) = lines.next().ok_or_else(invalid)?;
                value.push('\n');
                value.push_str(next.trim());
            }
            vars.insert(key, value);
            continue;
        }

        let parsed = if value.starts_with('"') {
            unquote(&value).ok_or_else(invalid)?
        } else {
            strip_trailing_comment(&value).to_string()
        };
        if parsed.is_empty() && !value.starts_with('"') {
            return Err(invalid());
        }
        vars.insert(key, parsed);
    }

    Ok(vars)
}

/// Merge variable maps in order; later maps override earlier keys.
pub fn merge<I>(maps: I) -> VarMap
where
    I: IntoIterator<Item = VarMap>,
{
    let mut merged = VarMap::new();
    for map in maps {
        merged.extend(map);
    }
    merged
}

/// Consume a `/* ... */` comment starting at `first`; returns whatever
/// follows the closing `*/` on its line.
fn skip_block_comment<'a, I>(first: &'a str, lines: &mut I) -> Option<&'a str>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut current = &first[2..];
    loop {
        if let Some(end) = current.find("*/") {
            return Some(current[end + 2..].trim());
        }
        current = lines.next()?.1;
    }
}

fn dedent(body: &[&str]) -> String {
    let indent = body
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    body.iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bracket_depth(text: &str) -> i32 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn unquote(value: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = value.chars().skip(1);
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            '"' => {
                let rest: String = chars.collect();
                let rest = rest.trim();
                return (rest.is_empty() || rest.starts_with('#') || rest.starts_with("//"))
                    .then_some(out);
            }
            c => out.push(c),
        }
    }
    None
}

fn strip_trailing_comment(value: &str) -> &str {
    let cut = [" #", " //"]
        .iter()
        .filter_map(|marker| value.find(marker))
        .min()
        .unwrap_or(value.len());
    value[..cut].trim_end()
}

// ── Command-line overrides ────────────────────────────────────────────────────

/// A `KEY=VALUE` variable passed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarOverride {
    pub key: String,
    pub value: String,
}

impl VarOverride {
    /// Render as a provisioning-tool argument.
    #[must_use]
    pub fn to_arg(&self) -> String {
        format!("-var={}={}", self.key, self.value)
    }
}

impl fmt::Display for VarOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for VarOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.to_string(),
            }),
            _ => Err(ConfigError::InvalidVarOverride(s.to_string())),
        }
    }
}

/// Apply command-line overrides on top of file variables.
pub fn apply_overrides(vars: &mut VarMap, overrides: &[VarOverride]) {
    for o in overrides {
        vars.insert(o.key.clone(), o.value.clone());
    }
}
