//! Small helpers over `scraper` element trees.

use std::collections::HashSet;

use scraper::{ElementRef, Selector};

/// Concatenated text of `element`, skipping every subtree that matches
/// `excluded`. The document is never mutated.
#[must_use]
pub fn text_without(element: ElementRef<'_>, excluded: &Selector) -> String {
    let skipped: HashSet<_> = element.select(excluded).map(|el| el.id()).collect();
    if skipped.is_empty() {
        return element.text().collect();
    }

    let root = element.id();
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != root)
            .any(|ancestor| skipped.contains(&ancestor.id()));
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

/// Trimmed text of the first descendant matching `selector`, if any.
#[must_use]
pub fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Trimmed text of all descendants matching `selector`, concatenated.
#[must_use]
pub fn all_text(element: ElementRef<'_>, selector: &Selector) -> String {
    element
        .select(selector)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse a selector that is known to be valid at compile time.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}
