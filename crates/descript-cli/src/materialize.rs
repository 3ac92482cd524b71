//! Turns registry entries back into active script markup or JSON.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use descript::{ScriptContent, ScriptEntry};
use regex::Regex;

use crate::extract::INLINE_TYPE;
use crate::types::CliResult;

/// Output format for materialized containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

/// Render one entry as an executable `<script>` element.
pub fn render_entry(entry: &ScriptEntry) -> String {
    let attrs: String = entry
        .attributes
        .iter()
        .filter(|(name, value)| !(name == "type" && value == INLINE_TYPE) && name != "src")
        .map(|(name, value)| {
            if value.is_empty() {
                format!(" {name}")
            } else {
                format!(" {name}=\"{}\"", escape_attr(value))
            }
        })
        .collect();

    match &entry.content {
        ScriptContent::External { src } => {
            format!("<script src=\"{}\"{attrs}></script>", escape_attr(src))
        }
        ScriptContent::Inline { source } => {
            let ty = if entry.attribute("type").is_some_and(|t| t != INLINE_TYPE) {
                String::new()
            } else {
                " type=\"text/javascript\"".to_string()
            };
            format!("<script{ty}{attrs}>{}</script>", escape_script(source))
        }
    }
}

/// Render a container's entries, one element per line.
pub fn render_container(entries: &[&ScriptEntry]) -> String {
    entries
        .iter()
        .map(|e| render_entry(e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render containers in the requested format.
pub fn render(views: &BTreeMap<&str, Vec<&ScriptEntry>>, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(views)?),
        OutputFormat::Html => Ok(views
            .iter()
            .map(|(name, entries)| {
                format!("<!-- container: {name} -->\n{}", render_container(entries))
            })
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Keep inline source from closing its own element early. End tags match
/// case-insensitively, so `</SCRIPT` is escaped too.
fn escape_script(source: &str) -> String {
    static CLOSE_TAG: OnceLock<Regex> = OnceLock::new();
    let close_tag =
        CLOSE_TAG.get_or_init(|| Regex::new(r"(?i)</(script)").expect("close tag regex is valid"));
    close_tag.replace_all(source, r"<\/$1").into_owned()
}
