//! Renderer backed by an external Mermaid-compatible command-line tool.
//!
//! The diagram source is written to the command's stdin and the SVG is read from its stdout.
//! `{id}`, `{theme}` and `{config}` in the configured arguments are substituted per call; the
//! config file holds the serialized [`RenderConfig`] of the current pass.

use crate::config::CommandConfig;
use crate::render::{
    DiagramRenderer, RenderConfig, RenderFailure, RenderedDiagram, RendererLoader,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Probes the configured program once and hands out a [`CommandRenderer`].
#[derive(Debug, Clone)]
pub struct CommandLoader {
    config: CommandConfig,
}

impl CommandLoader {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RendererLoader for CommandLoader {
    async fn load(&self) -> Result<Arc<dyn DiagramRenderer>> {
        let program = &self.config.program;
        let status = Command::new(program)
            .args(&self.config.probe_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| Error::RendererLoad {
                message: format!("cannot start `{program}`: {err}"),
            })?;
        if !status.success() {
            return Err(Error::RendererLoad {
                message: format!("`{program}` probe exited with {status}"),
            });
        }
        debug!(program = %program, "diagram renderer available");
        Ok(Arc::new(CommandRenderer::new(self.config.clone())))
    }
}

struct PassSettings {
    theme: String,
    config_file: TempPath,
}

pub struct CommandRenderer {
    config: CommandConfig,
    pass: Mutex<Option<PassSettings>>,
}

impl CommandRenderer {
    pub fn new(config: CommandConfig) -> Self {
        Self {
            config,
            pass: Mutex::new(None),
        }
    }

    fn arguments(&self, id: &str) -> std::result::Result<Vec<String>, RenderFailure> {
        let guard = self
            .pass
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(settings) = guard.as_ref() else {
            return Err(RenderFailure::new("renderer used before initialize"));
        };
        let config_path = PathBuf::from(&*settings.config_file);
        let config_path = config_path.to_string_lossy();
        Ok(self
            .config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{id}", id)
                    .replace("{theme}", &settings.theme)
                    .replace("{config}", &config_path)
            })
            .collect())
    }
}

fn write_config_file(config: &RenderConfig) -> Result<TempPath> {
    let json = serde_json::to_vec_pretty(config)?;
    let mut file = tempfile::Builder::new()
        .prefix("diagram-materializer-")
        .suffix(".json")
        .tempfile()?;
    file.write_all(&json)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

#[async_trait]
impl DiagramRenderer for CommandRenderer {
    async fn initialize(&self, config: &RenderConfig) -> Result<()> {
        let config_file = write_config_file(config).map_err(|err| Error::RendererConfig {
            message: format!("cannot write renderer configuration: {err}"),
        })?;
        let settings = PassSettings {
            theme: config.theme.clone(),
            config_file,
        };
        *self
            .pass
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(settings);
        Ok(())
    }

    async fn render(
        &self,
        id: &str,
        source: &str,
    ) -> std::result::Result<RenderedDiagram, RenderFailure> {
        let args = self.arguments(id)?;
        let program = &self.config.program;

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| RenderFailure::new(format!("cannot start `{program}`: {err}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderFailure::new("renderer stdin unavailable"))?;
        let input = source.as_bytes().to_vec();
        let feed = async move {
            // Write errors from an early exit surface through the exit status.
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|err| RenderFailure::new(format!("`{program}`: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(RenderFailure::new(if message.is_empty() {
                format!("`{program}` exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }

        let svg = String::from_utf8(output.stdout)
            .map_err(|_| RenderFailure::new("renderer produced non-UTF-8 output"))?;
        let svg = svg.trim();
        if !svg.contains("<svg") {
            return Err(RenderFailure::new("renderer produced no SVG"));
        }
        Ok(RenderedDiagram::new(svg))
    }
}
