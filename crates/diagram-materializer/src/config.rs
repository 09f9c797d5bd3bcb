//! Materializer configuration.
//!
//! Every field has a default matching a Starlight site highlighted by Expressive Code, so an
//! empty YAML document is a valid configuration.

use crate::theme::DisplayMode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterializerConfig {
    /// Container under which diagram blocks are recognized. Empty means "anywhere".
    pub content_selector: String,
    /// Language tag identifying diagram blocks (`data-language="…"` / `language-…`).
    pub language: String,
    /// Highlighting wrapper that groups a `<pre>` with its frame and copy button.
    pub wrapper_selector: String,
    /// Per-line wrapper emitted by the highlighter.
    pub line_selector: String,
    /// Token container inside a line wrapper. Empty means the whole line wrapper.
    pub token_selector: String,
    /// Attribute carrying the full raw code (copy button).
    pub raw_code_attribute: String,
    pub themes: ThemeNames,
    /// Display mode assumed when the root element carries no `data-theme`.
    pub default_display_mode: DisplayMode,
    pub security_level: String,
    pub suppress_error_rendering: bool,
    pub debounce_ms: u64,
    /// Leading part of every diagram element id: an ASCII letter followed by letters, digits,
    /// `-` or `_`.
    pub id_prefix: String,
    pub renderer: CommandConfig,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            content_selector: ".sl-markdown-content".to_string(),
            language: "mermaid".to_string(),
            wrapper_selector: ".expressive-code".to_string(),
            line_selector: ".ec-line".to_string(),
            token_selector: ".code".to_string(),
            raw_code_attribute: "data-code".to_string(),
            themes: ThemeNames::default(),
            default_display_mode: DisplayMode::Light,
            security_level: "loose".to_string(),
            suppress_error_rendering: true,
            debounce_ms: 150,
            id_prefix: "diagram".to_string(),
            renderer: CommandConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeNames {
    pub light: String,
    pub dark: String,
}

impl Default for ThemeNames {
    fn default() -> Self {
        Self {
            light: "default".to_string(),
            dark: "dark".to_string(),
        }
    }
}

/// External renderer command.
///
/// `args` may contain the placeholders `{id}`, `{theme}` and `{config}`; the latter expands to
/// the path of a JSON file holding the renderer configuration for the current pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub probe_args: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: "mmdc".to_string(),
            args: [
                "--input",
                "-",
                "--output",
                "-",
                "--outputFormat",
                "svg",
                "--theme",
                "{theme}",
                "--configFile",
                "{config}",
                "--svgId",
                "{id}",
                "--quiet",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            probe_args: vec!["--version".to_string()],
        }
    }
}

impl MaterializerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // `serde_yaml` rejects an empty document; treat it as "all defaults".
        let cfg = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str::<Self>(text)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(Error::Config {
                message: "language must not be empty".to_string(),
            });
        }
        if self.line_selector.trim().is_empty() {
            return Err(Error::Config {
                message: "lineSelector must not be empty".to_string(),
            });
        }
        if self.raw_code_attribute.trim().is_empty() {
            return Err(Error::Config {
                message: "rawCodeAttribute must not be empty".to_string(),
            });
        }
        if !is_id_token(&self.id_prefix) {
            return Err(Error::Config {
                message: format!(
                    "idPrefix {:?} must start with an ASCII letter and contain only letters, digits, '-' or '_'",
                    self.id_prefix
                ),
            });
        }
        if self.renderer.program.trim().is_empty() {
            return Err(Error::Config {
                message: "renderer.program must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn theme_name(&self, mode: DisplayMode) -> &str {
        match mode {
            DisplayMode::Light => &self.themes.light,
            DisplayMode::Dark => &self.themes.dark,
        }
    }
}

fn is_id_token(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
