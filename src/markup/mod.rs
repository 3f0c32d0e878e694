pub mod content_map;
pub mod normalize;
pub mod table;

pub use content_map::{ContentMap, Fragment};

/// Two-pass pipeline over one record's markup blob:
/// entity-unescape + lenient parse → anchor-id → fragment map.
pub fn map_content(raw: &str) -> ContentMap {
    let html = normalize::normalize(raw);
    content_map::map_sections(&html)
}
