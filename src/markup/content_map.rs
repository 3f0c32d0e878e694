use std::collections::HashMap;

use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::warn;

use super::table::Table;

/// One unit of content attributed to a single anchor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Table(Table),
}

/// Anchor id → ordered fragments found between that anchor and the next.
/// Built once per record, consumed by the section merge, then dropped.
pub type ContentMap = HashMap<String, Vec<Fragment>>;

/// Walk the direct children of the markup's top-level container and map
/// content runs to the most recently seen anchor id.
///
/// An element carrying an `id` attribute opens a new anchor and contributes
/// its own text as that section's first fragment. Elements before the first
/// anchor are unattributable and dropped. Adjacent same-tag elements whose
/// texts share a space boundary are merged into one fragment, since markup
/// authors split single sentences across inline tags.
pub fn map_sections(html: &Html) -> ContentMap {
    let mut mapped = ContentMap::new();

    let Some(container) = html.root_element().children().find_map(ElementRef::wrap) else {
        warn!("markup has no top-level container element, skipping content mapping");
        return mapped;
    };

    let mut current_id: Option<String> = None;
    let mut previous: Option<ElementRef> = None;

    for child in container.children() {
        if let Node::Text(text) = child.value() {
            if !text.trim().is_empty() {
                warn!("found non-empty string at top level of markup: {}", text.trim());
            }
            continue;
        }
        let Some(element) = ElementRef::wrap(child) else {
            continue; // comments and the like
        };

        let id = match element.value().attr("id").filter(|id| !id.is_empty()) {
            Some(id) => {
                // New anchor: reset the run so the merge check below starts
                // fresh against this element.
                current_id = Some(id.to_string());
                previous = None;
                id.to_string()
            }
            None => match &current_id {
                Some(id) => id.clone(),
                None => continue, // content before any anchor
            },
        };

        let fragments = mapped.entry(id).or_default();
        if element.value().name() == "table" {
            fragments.push(Fragment::Table(Table::from_element(element)));
        } else {
            let text: String = element.text().collect();
            let same_run = previous.is_some_and(|p| p.value().name() == element.value().name());
            let merges = same_run
                && matches!(fragments.last(), Some(Fragment::Text(prev)) if space_boundary(prev, &text));
            if merges {
                if let Some(Fragment::Text(prev)) = fragments.last_mut() {
                    prev.push_str(&text);
                }
            } else {
                fragments.push(Fragment::Text(text));
            }
        }
        previous = Some(element);
    }

    mapped
}

/// A run continuation concatenates only when the seam already holds a space.
fn space_boundary(prev: &str, this: &str) -> bool {
    !prev.is_empty() && !this.is_empty() && (prev.ends_with(' ') || this.starts_with(' '))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::normalize::normalize;

    fn map(markup: &str) -> ContentMap {
        map_sections(&normalize(markup))
    }

    fn texts(map: &ContentMap, id: &str) -> Vec<String> {
        map[id]
            .iter()
            .filter_map(|f| match f {
                Fragment::Text(t) => Some(t.clone()),
                Fragment::Table(_) => None,
            })
            .collect()
    }

    #[test]
    fn anchor_text_starts_section() {
        let m = map("<div><p id=\"dose\">Once daily.</p></div>");
        assert_eq!(texts(&m, "dose"), vec!["Once daily."]);
    }

    #[test]
    fn run_merges_on_space_boundary() {
        let m = map("<div><p id=\"a\"></p><span>foo </span><span>bar</span></div>");
        assert_eq!(m["a"].last(), Some(&Fragment::Text("foo bar".into())));
    }

    #[test]
    fn run_splits_without_boundary() {
        let m = map("<div><p id=\"a\"></p><span>foo</span><span>bar</span></div>");
        let t = texts(&m, "a");
        assert!(t.contains(&"foo".to_string()));
        assert!(t.contains(&"bar".to_string()));
    }

    #[test]
    fn different_tags_never_merge() {
        let m = map("<div><p id=\"a\"></p><span>foo </span><em>bar</em></div>");
        let t = texts(&m, "a");
        assert!(t.contains(&"foo ".to_string()));
        assert!(t.contains(&"bar".to_string()));
    }

    #[test]
    fn anchor_participates_in_run() {
        let m = map("<div><span id=\"uses\">Take </span><span>daily</span></div>");
        assert_eq!(m["uses"], vec![Fragment::Text("Take daily".into())]);
    }

    #[test]
    fn content_before_first_anchor_dropped() {
        let m = map("<div><p>orphan</p><p id=\"a\">kept</p></div>");
        assert_eq!(m.len(), 1);
        assert_eq!(texts(&m, "a"), vec!["kept"]);
    }

    #[test]
    fn stray_text_skipped() {
        let m = map("<div>stray words<p id=\"a\">kept</p></div>");
        assert_eq!(texts(&m, "a"), vec!["kept"]);
    }

    #[test]
    fn table_is_single_fragment() {
        let m = map("<div><p id=\"a\">x</p><table><tr><td>A</td><td>B</td></tr></table></div>");
        assert!(matches!(m["a"][1], Fragment::Table(ref t) if t.rows[0].len() == 2));
    }

    #[test]
    fn new_anchor_resets_run() {
        let m = map("<div><span id=\"a\">one </span><span id=\"b\">two</span></div>");
        assert_eq!(texts(&m, "a"), vec!["one "]);
        assert_eq!(texts(&m, "b"), vec!["two"]);
    }

    #[test]
    fn repeated_anchor_appends_to_same_entry() {
        let m = map("<div><p id=\"a\">one</p><p id=\"b\">mid</p><p id=\"a\">two</p></div>");
        assert_eq!(texts(&m, "a"), vec!["one", "two"]);
    }

    #[test]
    fn no_container_yields_empty_map() {
        let m = map("just loose text");
        assert!(m.is_empty());
    }

    #[test]
    fn nested_markup_text_flattens() {
        let m = map("<div><p id=\"a\">take <b>two</b> pills</p></div>");
        assert_eq!(texts(&m, "a"), vec!["take two pills"]);
    }
}
