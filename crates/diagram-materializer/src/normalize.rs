//! Diagram source cleanup and legacy syntax repair.
//!
//! Highlighters and copy buttons leave invisible characters, non-breaking spaces and mixed line
//! endings in the text they expose. Older pages also use a `subgraph id (label)` form that current
//! Mermaid grammars reject. Everything here is a pure text transform.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Prefix for identifiers synthesized for anonymous subgraphs.
pub const AUTO_SUBGRAPH_PREFIX: &str = "SG_AUTO_";

fn legacy_subgraph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^(?P<indent>[ \t]*)subgraph[ \t]+(?P<id>[^\s\[\]("']+)[ \t]*\((?P<label>.*)\)[ \t]*$"#)
            .expect("valid regex")
    })
}

fn anonymous_subgraph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^(?P<indent>[ \t]*)subgraph[ \t]*(?:\[[ \t]*(?P<bracket>.*?)[ \t]*\]|"(?P<quoted>.*)")[ \t]*$"#)
            .expect("valid regex")
    })
}

/// Characters removed outright. `\t`, `\n` and `\r` are handled separately; U+200D stays so emoji
/// sequences inside labels survive.
fn is_stripped(ch: char) -> bool {
    matches!(
        ch,
        '\u{0000}'..='\u{0008}'
            | '\u{000B}'
            | '\u{000C}'
            | '\u{000E}'..='\u{001F}'
            | '\u{007F}'..='\u{009F}'
            | '\u{00AD}'
            | '\u{200B}'
            | '\u{200C}'
            | '\u{200E}'
            | '\u{200F}'
            | '\u{2060}'
            | '\u{FEFF}'
    )
}

/// Normalizes diagram sources for one render pass.
///
/// Synthesized subgraph identifiers are numbered sequentially across every source normalized by
/// the same instance, so a fresh `Normalizer` is created per pass.
#[derive(Debug, Default)]
pub struct Normalizer {
    auto_ids: usize,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subgraph identifiers synthesized so far.
    pub fn synthesized_ids(&self) -> usize {
        self.auto_ids
    }

    pub fn normalize(&mut self, source: &str) -> String {
        let cleaned = clean_text(source);
        if cleaned.is_empty() {
            return cleaned;
        }
        self.repair(&cleaned)
    }

    /// Rewrites legacy subgraph declarations. Already-modern input is returned unchanged.
    pub fn repair(&mut self, source: &str) -> String {
        let with_labels = legacy_subgraph_regex().replace_all(source, |caps: &Captures| {
            format!(
                "{}subgraph {}[\"{}\"]",
                &caps["indent"],
                &caps["id"],
                escape_label(&caps["label"])
            )
        });

        let counter = &mut self.auto_ids;
        anonymous_subgraph_regex()
            .replace_all(&with_labels, |caps: &Captures| {
                let label = caps
                    .name("bracket")
                    .or_else(|| caps.name("quoted"))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                *counter += 1;
                format!(
                    "{}subgraph {AUTO_SUBGRAPH_PREFIX}{}[\"{}\"]",
                    &caps["indent"],
                    *counter,
                    escape_label(label)
                )
            })
            .into_owned()
    }
}

/// Strips invisible characters and unifies whitespace without touching diagram syntax.
pub fn clean_text(source: &str) -> String {
    let unified = source
        .replace("\r\n", "\n")
        .replace(['\r', '\u{2028}', '\u{2029}'], "\n");

    let filtered: String = unified
        .chars()
        .filter(|&c| !is_stripped(c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();

    let mut out = String::with_capacity(filtered.len());
    for (i, line) in filtered.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.trim_end());
    }
    out.trim().to_string()
}

fn escape_label(raw: &str) -> String {
    let raw = raw.trim();
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    unquoted.replace('"', "#quot;")
}
