use crate::rewrite::{self, OUTPUT_ATTR, STATE_ATTR, STATE_HIDDEN};
use crate::Result;

/// Undoes everything a previous pass did to `html`.
///
/// Inserted graphics and error annotations are removed, hidden sources are shown again and state
/// markers are dropped. Markup never touched by a pass is left byte-identical.
pub fn cleanup(html: &str) -> Result<String> {
    let handlers = vec![
        rewrite::on_element(&format!("[{OUTPUT_ATTR}]"), |el| {
            el.remove();
            Ok(())
        })?,
        rewrite::on_element(&format!("[{STATE_ATTR}]"), |el| {
            // `hidden-kept` marks an author-hidden element; its attribute stays.
            if el.get_attribute(STATE_ATTR).as_deref() == Some(STATE_HIDDEN) {
                el.remove_attribute("hidden");
            }
            el.remove_attribute(STATE_ATTR);
            Ok(())
        })?,
    ];
    rewrite::run(html, handlers)
}
