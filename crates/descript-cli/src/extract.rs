//! One-shot scan of an HTML page for managed script elements.
//!
//! A page opts scripts into management by either renaming `src` to `x-src`
//! (external) or setting `type="text/mobify-script"` (inline). Both kinds
//! are inert in the browser until materialized.

use std::path::Path;

use descript::RawScript;
use scraper::{Html, Selector};

use crate::types::{CliError, CliResult};

/// Attribute carrying the locator of a deferred external script.
pub const EXTERNAL_ATTR: &str = "x-src";

/// Type attribute marking a deferred inline script.
pub const INLINE_TYPE: &str = "text/mobify-script";

/// Selector for both markers, matched in document order.
pub const MANAGED_SCRIPT_SELECTOR: &str = r#"script[x-src], script[type="text/mobify-script"]"#;

/// Extract managed scripts from an HTML document, in document order.
pub fn extract_scripts(html: &str) -> CliResult<Vec<RawScript>> {
    let selector = Selector::parse(MANAGED_SCRIPT_SELECTOR)
        .map_err(|e| CliError::Selector(format!("{e:?}")))?;
    let document = Html::parse_document(html);

    let scripts: Vec<RawScript> = document
        .select(&selector)
        .map(|element| {
            let el = element.value();
            let attributes: Vec<(String, String)> = el
                .attrs()
                .filter(|(name, _)| *name != EXTERNAL_ATTR)
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();

            let mut raw = match el.attr(EXTERNAL_ATTR) {
                Some(src) => RawScript::external(src),
                None => RawScript::inline(element.text().collect::<String>()),
            };
            raw.attributes = attributes;
            raw
        })
        .collect();

    tracing::debug!(
        count = scripts.len(),
        inline = scripts
            .iter()
            .filter(|s| matches!(s.content, descript::ScriptContent::Inline { .. }))
            .count(),
        "extracted managed scripts"
    );
    Ok(scripts)
}

/// Read a page from disk and extract its managed scripts.
pub fn extract_from_file(path: &Path) -> CliResult<Vec<RawScript>> {
    let html = std::fs::read_to_string(path)?;
    extract_scripts(&html)
}
