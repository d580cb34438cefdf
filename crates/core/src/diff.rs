//! Unified diffs between unit versions, and patch application
//!
//! Diffs are produced by `similar` over line tokens. The "stripped" form has
//! no `---`/`+++` header so it can be compared and regenerated regardless of
//! what the unit is called.
//!
//! Patches coming back from a translator are untrusted text: [`apply_patch`]
//! parses them leniently but only accepts hunks whose old side matches the
//! base exactly. Anything else yields `None`, which callers treat as "fall
//! back to a full translation".

use std::borrow::Cow;

use similar::TextDiff;
use tracing::debug;

/// Default number of unchanged lines around each hunk
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Label used when a patch arrives without a header and none was supplied
pub const DEFAULT_LABEL: &str = "unit";

const NO_NEWLINE_HINT: char = '\\';

/// True if the two versions differ at all
pub fn has_changed(old: &str, new: &str) -> bool {
    old != new
}

/// Unified diff body (hunks only, no file header)
pub fn compute_diff(old: &str, new: &str, context_lines: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified.context_radius(context_lines).to_string()
}

/// Unified diff with a `--- a/<label>` / `+++ b/<label>` header
pub fn compute_labeled_diff(old: &str, new: &str, label: &str, context_lines: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified
        .context_radius(context_lines)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}

fn is_header_line(line: &str) -> bool {
    line.starts_with("--- ")
        || line.starts_with("+++ ")
        || line.starts_with("diff ")
        || line.starts_with("index ")
}

/// Remove any lines before the first hunk header
pub fn strip_header(patch: &str) -> &str {
    if patch.starts_with("@@") {
        return patch;
    }
    match patch.find("\n@@") {
        Some(idx) => &patch[idx + 1..],
        None => patch,
    }
}

/// Make sure a patch starts with a file header, synthesizing a neutral one
pub fn ensure_header(patch: &str, label: &str) -> String {
    let has_header = patch
        .lines()
        .take_while(|line| !line.starts_with("@@"))
        .any(|line| line.starts_with("--- "));
    if has_header {
        patch.to_string()
    } else {
        format!("--- a/{label}\n+++ b/{label}\n{}", strip_header(patch))
    }
}

/// One line of a hunk body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

/// A single `@@` hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHunk {
    /// 1-based start line on the old side, as declared
    pub old_start: usize,
    /// 1-based start line on the new side, as declared
    pub new_start: usize,
    pub lines: Vec<HunkLine>,
    /// Old side's last line had no trailing newline
    pub old_missing_newline: bool,
    /// New side's last line has no trailing newline
    pub new_missing_newline: bool,
}

impl PatchHunk {
    fn old_side(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(s) | HunkLine::Remove(s) => Some(s.as_str()),
            HunkLine::Add(_) => None,
        })
    }

    fn new_len(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| !matches!(line, HunkLine::Remove(_)))
            .count()
    }
}

/// A patch parsed into hunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPatch {
    pub hunks: Vec<PatchHunk>,
}

/// Parse `-a[,b]` or `+c[,d]` into the start line
fn parse_range(token: &str, sign: char) -> Option<usize> {
    let rest = token.strip_prefix(sign)?;
    let start = rest.split(',').next()?;
    start.parse().ok()
}

fn parse_hunk_header(line: &str) -> Option<PatchHunk> {
    // @@ -12,7 +12,8 @@ optional section text
    let inner = line.strip_prefix("@@")?;
    let end = inner.find("@@")?;
    let mut ranges = inner[..end].split_ascii_whitespace();
    let old_start = parse_range(ranges.next()?, '-')?;
    let new_start = parse_range(ranges.next()?, '+')?;
    Some(PatchHunk {
        old_start,
        new_start,
        lines: Vec::new(),
        old_missing_newline: false,
        new_missing_newline: false,
    })
}

impl ParsedPatch {
    /// Parse patch text
    ///
    /// Lines before the first hunk are ignored. Hunk line counts are not
    /// trusted; a hunk runs until the next `@@` or the end of the text. A bare
    /// empty line inside a hunk is read as an empty context line. Returns
    /// `None` for text with no hunks, empty hunks, or unprefixed lines.
    pub fn parse(patch: &str) -> Option<Self> {
        let mut lines: Vec<&str> = patch.split('\n').collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }

        let mut hunks: Vec<PatchHunk> = Vec::new();
        let mut current: Option<PatchHunk> = None;
        // Which side the previous body line belonged to, for `\ No newline` hints
        let mut last_tag: Option<char> = None;

        for raw in lines {
            // Line endings come from the base, never from the patch
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            if raw.starts_with("@@") {
                if let Some(hunk) = current.take() {
                    hunks.push(hunk);
                }
                current = Some(parse_hunk_header(raw)?);
                last_tag = None;
                continue;
            }

            let hunk = match current.as_mut() {
                Some(hunk) => hunk,
                None => continue,
            };

            let mut chars = raw.chars();
            match chars.next() {
                Some(' ') => hunk.lines.push(HunkLine::Context(chars.as_str().to_string())),
                Some('-') => hunk.lines.push(HunkLine::Remove(chars.as_str().to_string())),
                Some('+') => hunk.lines.push(HunkLine::Add(chars.as_str().to_string())),
                Some(NO_NEWLINE_HINT) => {
                    match last_tag {
                        Some('-') => hunk.old_missing_newline = true,
                        Some('+') => hunk.new_missing_newline = true,
                        Some(' ') => {
                            hunk.old_missing_newline = true;
                            hunk.new_missing_newline = true;
                        }
                        _ => return None,
                    }
                    continue;
                }
                None => hunk.lines.push(HunkLine::Context(String::new())),
                Some(_) if is_header_line(raw) => continue,
                Some(_) => return None,
            }
            last_tag = raw.chars().next().filter(|c| matches!(c, ' ' | '-' | '+'));
            if last_tag.is_none() {
                last_tag = Some(' ');
            }
        }
        if let Some(hunk) = current {
            hunks.push(hunk);
        }

        if hunks.is_empty() || hunks.iter().any(|hunk| hunk.lines.is_empty()) {
            return None;
        }
        Some(Self { hunks })
    }

    pub fn hunk_count(&self) -> usize {
        self.hunks.len()
    }

    /// Number of added plus removed lines
    pub fn changed_lines(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|hunk| hunk.lines.iter())
            .filter(|line| !matches!(line, HunkLine::Context(_)))
            .count()
    }
}

fn lines_match(base: &[&str], old_side: &[&str]) -> bool {
    base.len() == old_side.len()
        && base
            .iter()
            .zip(old_side)
            .all(|(b, o)| b.trim_end() == o.trim_end())
}

/// Locate a hunk's old side in `base_lines`, at or after `cursor`
///
/// Prefers the declared position; otherwise the nearest matching offset.
fn locate_hunk(base_lines: &[&str], hunk: &PatchHunk, cursor: usize) -> Option<usize> {
    let old_side: Vec<&str> = hunk.old_side().collect();

    if old_side.is_empty() {
        // Pure insertion: `-k,0` means "after line k".
        let pos = hunk.old_start;
        return (pos >= cursor && pos <= base_lines.len()).then_some(pos);
    }

    if old_side.len() > base_lines.len() {
        return None;
    }
    let expected = hunk.old_start.saturating_sub(1);
    let last = base_lines.len() - old_side.len();

    (cursor..=last)
        .filter(|&pos| lines_match(&base_lines[pos..pos + old_side.len()], &old_side))
        .min_by_key(|&pos| pos.abs_diff(expected))
}

/// Apply a unified-diff patch to `base`
///
/// Tolerates a missing header (a neutral one using `label` is assumed).
/// Returns `None` when the patch is empty or whitespace-only, cannot be
/// parsed, or any hunk does not apply cleanly. Never panics.
pub fn apply_patch(base: &str, patch: &str, label: Option<&str>) -> Option<String> {
    if patch.trim().is_empty() {
        return None;
    }
    let label = label.unwrap_or(DEFAULT_LABEL);
    let parsed = match ParsedPatch::parse(&ensure_header(patch, label)) {
        Some(parsed) => parsed,
        None => {
            debug!(label, "patch has no usable hunks");
            return None;
        }
    };

    let base_has_newline = base.ends_with('\n');
    let base_lines: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.strip_suffix('\n').unwrap_or(base).split('\n').collect()
    };

    let crlf = base_lines.first().is_some_and(|line| line.ends_with('\r'));

    let mut out: Vec<Cow<'_, str>> = Vec::with_capacity(base_lines.len());
    let mut cursor = 0;
    let mut trailing_newline = base_has_newline;

    for (idx, hunk) in parsed.hunks.iter().enumerate() {
        let pos = match locate_hunk(&base_lines, hunk, cursor) {
            Some(pos) => pos,
            None => {
                debug!(label, hunk = idx, old_start = hunk.old_start, "hunk context does not match");
                return None;
            }
        };

        out.extend(base_lines[cursor..pos].iter().map(|line| Cow::Borrowed(*line)));
        let mut base_idx = pos;
        for line in &hunk.lines {
            match line {
                HunkLine::Context(_) => {
                    out.push(Cow::Borrowed(base_lines[base_idx]));
                    base_idx += 1;
                }
                HunkLine::Remove(_) => base_idx += 1,
                HunkLine::Add(text) if crlf => out.push(Cow::Owned(format!("{text}\r"))),
                HunkLine::Add(text) => out.push(Cow::Borrowed(text.as_str())),
            }
        }
        cursor = base_idx;

        if cursor == base_lines.len() {
            trailing_newline = if hunk.new_missing_newline {
                false
            } else if hunk.old_missing_newline || base.is_empty() {
                true
            } else if hunk.new_len() == 0 {
                // Deleted the tail; the previous line kept its terminator
                !out.is_empty()
            } else {
                base_has_newline
            };
        }
    }
    out.extend(base_lines[cursor..].iter().map(|line| Cow::Borrowed(*line)));

    if out.is_empty() {
        return Some(String::new());
    }
    let mut result = out.join("\n");
    if trailing_newline {
        result.push('\n');
    }
    Some(result)
}
