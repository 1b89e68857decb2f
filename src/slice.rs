//! Fixed-width column extraction and the small pile of string predicates the
//! field parsers share. Every slice leaves here with exactly the declared
//! width so the parsers never re-check bounds.

use serde::Deserialize;
use std::iter;

/// Extract `length` characters from `line` starting at the 0-based
/// `start_index`. A start past the end of the line yields all spaces; a line
/// that runs out mid-field is right-padded with spaces.
pub fn slice(line: &str, start_index: usize, length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    let mut out: String = line.chars().skip(start_index).take(length).collect();
    let have = out.chars().count();
    if have < length {
        out.extend(iter::repeat(' ').take(length - have));
    }
    out
}

pub fn is_all_spaces(s: &str) -> bool {
    s.chars().all(|c| c == ' ')
}

/// A field counts as all zeros when it holds nothing but `0` and decimal
/// points, with at least one actual zero. Spaces disqualify it.
pub fn is_all_zeros(s: &str) -> bool {
    s.chars().all(|c| c == '0' || c == '.') && s.contains('0')
}

pub fn collapse_spaces(s: &str) -> String {
    s.chars().filter(|c| *c != ' ').collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TrimMode {
    Left,
    Right,
    Both,
    None,
}

impl TrimMode {
    /// Lenient tag decoding: unrecognized tags fall back to `Both`.
    pub fn from_tag(tag: &str) -> TrimMode {
        match tag.to_ascii_lowercase().as_str() {
            "left" => TrimMode::Left,
            "right" => TrimMode::Right,
            "none" => TrimMode::None,
            _ => TrimMode::Both,
        }
    }
}

impl From<String> for TrimMode {
    fn from(tag: String) -> TrimMode {
        TrimMode::from_tag(&tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum CaseMode {
    Upper,
    Lower,
    None,
}

impl CaseMode {
    /// Lenient tag decoding: unrecognized tags fall back to `None`.
    pub fn from_tag(tag: &str) -> CaseMode {
        match tag.to_ascii_lowercase().as_str() {
            "upper" => CaseMode::Upper,
            "lower" => CaseMode::Lower,
            _ => CaseMode::None,
        }
    }
}

impl From<String> for CaseMode {
    fn from(tag: String) -> CaseMode {
        CaseMode::from_tag(&tag)
    }
}

pub fn apply_trim(s: &str, mode: TrimMode) -> String {
    match mode {
        TrimMode::Left => s.trim_start().to_string(),
        TrimMode::Right => s.trim_end().to_string(),
        TrimMode::Both => s.trim().to_string(),
        TrimMode::None => s.to_string(),
    }
}

pub fn apply_case(s: &str, mode: CaseMode) -> String {
    match mode {
        CaseMode::Upper => s.to_uppercase(),
        CaseMode::Lower => s.to_lowercase(),
        CaseMode::None => s.to_string(),
    }
}
