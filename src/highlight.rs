use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::document::element_at;

pub const DEFAULT_COLOR: &str = "#4a90e2";
pub const SELECTED_COLOR: &str = "#ff4444";
pub const MATCHES_COLOR: &str = "#ffd700";

/// Alpha suffixes appended to the hex colour.
pub const HOVER_OPACITY: &str = "40";
pub const NORMAL_OPACITY: &str = "20";

const TRANSITION: &str = "background-color 0.10s ease-in-out";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightStyles {
    pub outline: String,
    pub outline_offset: String,
    pub background_color: String,
    pub transition: String,
}

impl HighlightStyles {
    pub fn solid(color: &str) -> Self {
        Self {
            outline: format!("2px solid {}", color),
            outline_offset: "1px".to_string(),
            background_color: format!("{}{}", color, NORMAL_OPACITY),
            transition: TRANSITION.to_string(),
        }
    }

    pub fn hover() -> Self {
        Self {
            outline: format!("2px dashed {}", DEFAULT_COLOR),
            outline_offset: "1px".to_string(),
            background_color: format!("{}{}", DEFAULT_COLOR, HOVER_OPACITY),
            transition: TRANSITION.to_string(),
        }
    }

    /// Pick the highlight-relevant declarations out of an inline `style` attribute.
    pub fn from_inline_style(style: &str) -> Self {
        let mut styles = Self::default();

        for declaration in style.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match property.trim().to_ascii_lowercase().as_str() {
                "outline" => styles.outline = value,
                "outline-offset" => styles.outline_offset = value,
                "background-color" => styles.background_color = value,
                "transition" => styles.transition = value,
                _ => {}
            }
        }

        styles
    }

    /// Serialize back to inline-style declarations, skipping blank properties.
    pub fn to_inline_style(&self) -> String {
        [
            ("outline", &self.outline),
            ("outline-offset", &self.outline_offset),
            ("background-color", &self.background_color),
            ("transition", &self.transition),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(property, value)| format!("{}: {};", property, value))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Node id → styles captured the first time the node was highlighted.
#[derive(Debug, Default)]
pub struct StyleMemory {
    originals: HashMap<NodeId, HighlightStyles>,
}

impl StyleMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn is_captured(&self, node: NodeId) -> bool {
        self.originals.contains_key(&node)
    }

    fn capture(&mut self, element: ElementRef<'_>) {
        self.originals
            .entry(element.id())
            .or_insert_with(|| HighlightStyles::from_inline_style(element.value().attr("style").unwrap_or("")));
    }

    pub fn highlight(&mut self, element: ElementRef<'_>, color: &str) -> HighlightStyles {
        self.capture(element);
        HighlightStyles::solid(color)
    }

    pub fn highlight_hovered(&mut self, element: ElementRef<'_>, is_selected: bool) -> HighlightStyles {
        if is_selected {
            return self.highlight(element, SELECTED_COLOR);
        }
        self.capture(element);
        HighlightStyles::hover()
    }

    pub fn highlight_selected(&mut self, element: ElementRef<'_>) -> HighlightStyles {
        self.highlight(element, SELECTED_COLOR)
    }

    /// Highlight every node in `matches` that still exists in `html`.
    pub fn highlight_matches(&mut self, html: &Html, matches: &[NodeId]) -> Vec<(NodeId, HighlightStyles)> {
        matches
            .iter()
            .filter_map(|id| element_at(html, *id))
            .map(|element| (element.id(), self.highlight(element, MATCHES_COLOR)))
            .collect()
    }

    /// Styles that restore `node`, evicting its entry. Blank styles when nothing was captured.
    pub fn clear(&mut self, node: NodeId) -> HighlightStyles {
        self.originals.remove(&node).unwrap_or_default()
    }

    pub fn clear_all(&mut self, nodes: &[NodeId]) -> Vec<(NodeId, HighlightStyles)> {
        nodes.iter().map(|node| (*node, self.clear(*node))).collect()
    }
}
