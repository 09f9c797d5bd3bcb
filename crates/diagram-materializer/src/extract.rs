//! Source extraction.
//!
//! Highlighters expose a block's text in different shapes. The strategies below are tried in
//! order and the first one yielding non-blank text wins.

use crate::rewrite::decode;
use crate::scan::ScannedBlock;
use serde::Serialize;

/// Line separator used by the copy button's raw-code attribute.
pub const LINE_SENTINEL: char = '\u{7f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionSource {
    RawAttribute,
    LineMarkup,
    CodeText,
}

impl ExtractionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RawAttribute => "raw-attribute",
            Self::LineMarkup => "line-markup",
            Self::CodeText => "code-text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub source: ExtractionSource,
}

type Strategy = fn(&ScannedBlock) -> Option<String>;

const STRATEGIES: &[(ExtractionSource, Strategy)] = &[
    (ExtractionSource::RawAttribute, from_raw_attribute),
    (ExtractionSource::LineMarkup, from_line_markup),
    (ExtractionSource::CodeText, from_code_text),
];

/// Returns the block's literal text, or `None` when every strategy comes up blank.
pub fn extract(block: &ScannedBlock) -> Option<Extracted> {
    STRATEGIES.iter().find_map(|&(source, strategy)| {
        strategy(block)
            .filter(|text| !text.trim().is_empty())
            .map(|text| Extracted { text, source })
    })
}

fn from_raw_attribute(block: &ScannedBlock) -> Option<String> {
    let raw = block.raw_code.as_deref()?;
    Some(decode(raw).replace(LINE_SENTINEL, "\n"))
}

fn from_line_markup(block: &ScannedBlock) -> Option<String> {
    if block.lines.is_empty() {
        return None;
    }
    let lines: Vec<String> = block.lines.iter().map(|line| decode(line)).collect();
    Some(lines.join("\n"))
}

fn from_code_text(block: &ScannedBlock) -> Option<String> {
    Some(decode(&block.code_text))
}
