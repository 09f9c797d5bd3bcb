use crate::rewrite;
use crate::theme::DisplayMode;
use crate::Result;

/// The document a materializer works on.
///
/// `generation` changes whenever the document is replaced or mutated from outside a render
/// pass; a pass that suspended on one generation must not commit into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    html: String,
    generation: u64,
    display_mode: Option<DisplayMode>,
}

impl Page {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            generation: 0,
            display_mode: None,
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Display mode last applied through [`Page::set_display_mode`] to the current document.
    pub fn display_mode(&self) -> Option<DisplayMode> {
        self.display_mode
    }

    /// Swaps in a new document. A mode set on the previous document does not carry over.
    pub fn replace(&mut self, html: impl Into<String>) {
        self.html = html.into();
        self.display_mode = None;
        self.generation += 1;
    }

    /// Writes `data-theme` on the root element. Fragments without an `<html>` element only
    /// record the mode.
    pub fn set_display_mode(&mut self, mode: DisplayMode) -> Result<()> {
        let html = rewrite::run(
            &self.html,
            vec![rewrite::on_element("html", move |el| {
                el.set_attribute("data-theme", mode.as_str())?;
                Ok(())
            })?],
        )?;
        self.html = html;
        self.display_mode = Some(mode);
        self.generation += 1;
        Ok(())
    }

    pub(crate) fn commit(&mut self, html: String) {
        self.html = html;
    }
}
