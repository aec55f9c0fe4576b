//! Annotations embedded in frame names.
//!
//! Two tags are understood, anywhere inside a name:
//! - a duration, `(NNNms)`, with spaces allowed after `(`, around the number and before `)`,
//!   and `ms` matched case-insensitively;
//! - a disposal keyword, the exact literals `(combine)` or `(replace)`.
//!
//! Only the first occurrence of a tag is ever parsed or stripped.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Duration used when a name carries no duration tag, or a zero one.
pub const DEFAULT_DURATION_MS: u32 = 100;

const COMBINE_TAG: &str = "(combine)";
const REPLACE_TAG: &str = "(replace)";

/// How a frame is laid onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposal {
    /// No tag present. Behaves as `Combine`.
    #[default]
    Undefined,
    /// Overlay onto whatever the canvas already shows.
    Combine,
    /// Clear the canvas to transparent before drawing.
    Replace,
}

impl Disposal {
    pub fn is_replace(self) -> bool {
        self == Disposal::Replace
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagMatch {
    span: Range<usize>,
    value: u64,
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos) == Some(&b' ') {
        pos += 1;
    }
    pos
}

/// Try to match a duration tag starting exactly at `start`.
fn match_duration_at(bytes: &[u8], start: usize) -> Option<TagMatch> {
    if bytes.get(start) != Some(&b'(') {
        return None;
    }
    let mut pos = skip_spaces(bytes, start + 1);

    let digits_start = pos;
    let mut value: u64 = 0;
    while let Some(digit) = bytes.get(pos).filter(|b| b.is_ascii_digit()) {
        value = value
            .saturating_mul(10)
            .saturating_add(u64::from(digit - b'0'));
        pos += 1;
    }
    if pos == digits_start {
        return None;
    }

    pos = skip_spaces(bytes, pos);
    if !bytes.get(pos)?.eq_ignore_ascii_case(&b'm') {
        return None;
    }
    if !bytes.get(pos + 1)?.eq_ignore_ascii_case(&b's') {
        return None;
    }
    pos = skip_spaces(bytes, pos + 2);
    if bytes.get(pos) != Some(&b')') {
        return None;
    }

    Some(TagMatch {
        span: start..pos + 1,
        value,
    })
}

fn find_duration(name: &str) -> Option<TagMatch> {
    let bytes = name.as_bytes();
    name.match_indices('(')
        .find_map(|(start, _)| match_duration_at(bytes, start))
}

fn find_disposal(name: &str) -> Option<(Disposal, Range<usize>)> {
    let combine = name.find(COMBINE_TAG).map(|at| (Disposal::Combine, at));
    let replace = name.find(REPLACE_TAG).map(|at| (Disposal::Replace, at));

    let (kind, at) = match (combine, replace) {
        (Some(c), Some(r)) => {
            if c.1 < r.1 {
                c
            } else {
                r
            }
        }
        (Some(found), None) | (None, Some(found)) => found,
        (None, None) => return None,
    };
    // Both literals are nine bytes long.
    Some((kind, at..at + COMBINE_TAG.len()))
}

fn splice_out(name: &str, span: Range<usize>) -> String {
    let mut out = String::with_capacity(name.len() - span.len());
    out.push_str(&name[..span.start]);
    out.push_str(&name[span.end..]);
    out
}

/// The value of the first duration tag in `name`, if any.
///
/// Values too large for a `u32` saturate. A returned `Some(0)` is legal here;
/// use [`duration_or_default`] to get the value a frame should actually play for.
pub fn parse_duration_tag(name: &str) -> Option<u32> {
    let found = find_duration(name)?;
    Some(u32::try_from(found.value).unwrap_or_else(|_| {
        tracing::warn!("Duration tag in '{name}' exceeds the supported range, clamping");
        u32::MAX
    }))
}

/// Duration a frame named `name` plays for: its tag, or [`DEFAULT_DURATION_MS`]
/// when the tag is missing or zero.
pub fn duration_or_default(name: &str) -> u32 {
    match parse_duration_tag(name) {
        Some(0) | None => DEFAULT_DURATION_MS,
        Some(ms) => ms,
    }
}

/// The first disposal keyword in `name`, scanning left to right.
pub fn parse_disposal_tag(name: &str) -> Disposal {
    find_disposal(name)
        .map(|(kind, _)| kind)
        .unwrap_or(Disposal::Undefined)
}

/// Remove the first duration tag from `name`, leaving everything else untouched.
pub fn strip_duration_tag(name: &str) -> String {
    match find_duration(name) {
        Some(found) => splice_out(name, found.span),
        None => name.to_string(),
    }
}

/// Remove the first disposal tag from `name`, leaving everything else untouched.
pub fn strip_disposal_tag(name: &str) -> String {
    match find_disposal(name) {
        Some((_, span)) => splice_out(name, span),
        None => name.to_string(),
    }
}

pub fn format_duration_tag(ms: u32) -> String {
    format!("({ms}ms)")
}

/// Tag text for `kind`; empty for `Undefined`.
pub fn format_disposal_tag(kind: Disposal) -> &'static str {
    match kind {
        Disposal::Undefined => "",
        Disposal::Combine => COMBINE_TAG,
        Disposal::Replace => REPLACE_TAG,
    }
}

/// `name` with its first duration tag and first disposal tag removed.
pub fn base_name(name: &str) -> String {
    strip_disposal_tag(&strip_duration_tag(name))
}
