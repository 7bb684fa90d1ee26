use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{ElementRef, Html, Node};
use url::Url;

use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct LiveDocument {
    html: Rc<RefCell<Html>>,
    generation: Rc<Cell<u64>>,
    url: Option<Url>,
}

impl LiveDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Rc::new(RefCell::new(Html::parse_document(markup))),
            generation: Rc::new(Cell::new(0)),
            url: None,
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Borrow the current tree. Never hold the borrow across an `.await`.
    pub fn read(&self) -> Ref<'_, Html> {
        self.html.borrow()
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Swap in a freshly rendered page. Node ids handed out before this call are invalid afterwards.
    pub fn replace(&self, markup: &str) {
        *self.html.borrow_mut() = Html::parse_document(markup);
        self.generation.set(self.generation.get() + 1);
    }

    /// Append rendered markup under `parent` in place. Existing node ids stay valid.
    pub fn append_markup(&self, parent: NodeId, markup: &str) -> Result<NodeId> {
        let fragment = Fragment::parse(markup)?;
        let mut html = self.html.borrow_mut();
        graft(&mut html.tree, parent, *fragment.root())
            .ok_or_else(|| AppError::invalid_description("append target", "parent node is not in the document"))
    }
}

fn graft(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) -> Option<NodeId> {
    let root_id = tree.get_mut(parent)?.append(source.value().clone()).id();
    let mut pending = vec![(source, root_id)];

    while let Some((src, dst)) = pending.pop() {
        for child in src.children() {
            let id = tree.get_mut(dst)?.append(child.value().clone()).id();
            pending.push((child, id));
        }
    }

    Some(root_id)
}

#[derive(Debug, Clone)]
pub struct Fragment {
    html: Html,
    root: NodeId,
}

impl Fragment {
    pub fn parse(markup: &str) -> Result<Self> {
        let html = Html::parse_fragment(markup.trim());
        // parse_fragment wraps the content in a synthetic <html> element
        let root = html
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .map(|el| el.id())
            .ok_or_else(|| AppError::invalid_description("fragment", "markup contains no element"))?;

        Ok(Self { html, root })
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html
            .tree
            .get(self.root)
            .and_then(ElementRef::wrap)
            .unwrap_or_else(|| self.html.root_element())
    }

    pub fn outer_html(&self) -> String {
        self.root().html()
    }

    /// Find where `child`'s root element sits inside this fragment.
    ///
    /// Prefers a node with the same tag, class set and text; falls back to tag and class set alone.
    pub fn locate(&self, child: &Fragment) -> Option<NodeId> {
        let wanted = child.root();
        let tag = wanted.value().name();
        let classes = class_set(wanted);
        let text = normalized_text(wanted);

        let candidates: Vec<ElementRef<'_>> = self
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == tag && class_set(*el) == classes)
            .collect();

        candidates
            .iter()
            .find(|el| normalized_text(**el) == text)
            .or_else(|| candidates.first())
            .map(|el| el.id())
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        element_at(&self.html, id)
    }
}

#[derive(Debug, Clone)]
pub enum ElementDescription {
    Fragment(Fragment),
    Live(NodeId),
}

impl ElementDescription {
    pub fn from_markup(markup: &str) -> Result<Self> {
        Fragment::parse(markup).map(ElementDescription::Fragment)
    }
}

pub fn element_at(html: &Html, id: NodeId) -> Option<ElementRef<'_>> {
    html.tree.get(id).and_then(ElementRef::wrap)
}

/// Steps from `ancestor` down to `node`: 0 for the node itself, 1 for a direct child.
/// `None` when `ancestor` does not contain `node`.
pub fn depth_below(html: &Html, ancestor: NodeId, node: NodeId) -> Option<usize> {
    let node = html.tree.get(node)?;
    if node.id() == ancestor {
        return Some(0);
    }
    node.ancestors().position(|a| a.id() == ancestor).map(|steps| steps + 1)
}

pub fn contains(html: &Html, ancestor: NodeId, node: NodeId) -> bool {
    depth_below(html, ancestor, node).is_some()
}

pub fn class_set<'a>(el: ElementRef<'a>) -> BTreeSet<&'a str> {
    el.value().classes().collect()
}

pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub fn normalized_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The synthetic <html> element `Html::parse_fragment` wraps fragment content in.
pub fn is_fragment_wrapper(el: ElementRef<'_>) -> bool {
    el.parent().is_some_and(|p| p.value().is_fragment())
}

/// Elements the upward selector walk stops at without emitting a segment.
pub fn is_root_container(el: ElementRef<'_>) -> bool {
    el.value().name() == "body" || is_fragment_wrapper(el)
}

pub fn parent_element<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.parent().and_then(ElementRef::wrap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Parent,
    Child,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "parent" => Ok(Direction::Parent),
            "child" => Ok(Direction::Child),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Widen a picked element to its parent or narrow it to its first element child.
/// Widening stops below `body`.
pub fn relative_element(html: &Html, id: NodeId, direction: Direction) -> Option<NodeId> {
    let el = element_at(html, id)?;
    match direction {
        Direction::Parent => parent_element(el)
            .filter(|parent| parent.value().name() != "body" && !is_fragment_wrapper(*parent))
            .map(|parent| parent.id()),
        Direction::Child => el.children().find_map(ElementRef::wrap).map(|child| child.id()),
    }
}
