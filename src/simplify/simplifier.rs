use tracing::{error, info};

use crate::browser::dom::DomElement;
use crate::browser::page::LivePage;

/// Tags always kept in the digest.
pub const SIGNIFICANT_TAGS: &[&str] = &[
    "a", "button", "input", "textarea", "select", "h1", "h2", "h3", "label",
];

/// Generic containers, kept only when they carry text.
pub const TEXT_CONTAINER_TAGS: &[&str] = &["div", "span", "p"];

/// Inner text longer than this is truncated in the digest.
pub const MAX_TEXT_CHARS: usize = 200;

/// Reduce the live page to a compact tag-per-line digest for the oracle.
///
/// Returns an empty string when extraction fails; callers must treat that as
/// "nothing to prompt with" and abort.
pub fn simplify(page: &mut dyn LivePage) -> String {
    match page.extract() {
        Ok(elements) => {
            let digest = render_digest(&elements);
            info!(
                extracted = elements.len(),
                kept = digest.lines().count(),
                "simplified page for oracle context"
            );
            digest
        }
        Err(e) => {
            error!(error = %e, "page simplification failed");
            String::new()
        }
    }
}

/// Render extracted elements, dropping everything without locator signal.
pub fn render_digest(elements: &[DomElement]) -> String {
    elements
        .iter()
        .filter_map(render_element)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_element(element: &DomElement) -> Option<String> {
    let tag = element.tag.to_ascii_lowercase();
    let text = element.text.as_deref().map(collapse_whitespace).unwrap_or_default();

    let significant = SIGNIFICANT_TAGS.contains(&tag.as_str());
    let container = TEXT_CONTAINER_TAGS.contains(&tag.as_str());
    if !significant && !(container && !text.is_empty()) {
        return None;
    }

    let mut out = format!("<{}", tag);
    for (name, value) in identifying_attributes(element) {
        out.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;")));
    }
    out.push('>');

    if !text.is_empty() {
        out.push_str(&truncate(&text));
        out.push_str(&format!("</{}>", tag));
    }
    Some(out)
}

/// Non-empty identifying attributes in their fixed digest order.
fn identifying_attributes(element: &DomElement) -> Vec<(&'static str, &str)> {
    [
        ("id", &element.id),
        ("class", &element.class),
        ("name", &element.name),
        ("placeholder", &element.placeholder),
        ("aria-label", &element.aria_label),
        ("data-testid", &element.test_id),
        ("role", &element.role),
        ("type", &element.r#type),
        ("href", &element.href),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| (name, v))
    })
    .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_TEXT_CHARS).collect();
    cut.push('…');
    cut
}
