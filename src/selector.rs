use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

use crate::document::{class_set, is_fragment_wrapper, is_root_container, parent_element};
use crate::utils::error::{AppError, Result};

static POSITIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("positional predicate pattern is valid"));

/// CSS path for `el`, falling back to the fully indexed, container-anchored form when the
/// minimal one is not unique inside the parent.
pub fn synthesize(el: ElementRef<'_>) -> Option<String> {
    let minimal = build_path(el, false)?;

    match selects_only(el, &minimal) {
        Ok(true) => return Some(minimal),
        Ok(false) => debug!(selector = %minimal, "selector not unique in parent scope, using strict form"),
        Err(err) => warn!(error = %err, "minimal selector rejected"),
    }

    let strict = synthesize_strict(el)?;
    match parse_selector(&strict) {
        Ok(_) => Some(strict),
        Err(err) => {
            warn!(error = %err, "no selector available");
            None
        }
    }
}

pub fn synthesize_strict(el: ElementRef<'_>) -> Option<String> {
    let path = build_path(el, true)?;
    let anchor = container_anchor(el);
    Some(match anchor {
        Some(container) => format!("{} > {}", container, path),
        None => path,
    })
}

fn build_path(el: ElementRef<'_>, strict: bool) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = Some(el);

    while let Some(node) = current {
        if is_root_container(node) {
            break;
        }
        parts.push(segment(node, strict));
        current = parent_element(node);
    }

    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join(" > "))
}

fn container_anchor(el: ElementRef<'_>) -> Option<&'static str> {
    let mut current = parent_element(el);
    while let Some(node) = current {
        if node.value().name() == "body" {
            return Some("body");
        }
        if is_fragment_wrapper(node) {
            return Some("html");
        }
        current = parent_element(node);
    }
    None
}

fn segment(el: ElementRef<'_>, strict: bool) -> String {
    let element = el.value();
    let mut segment = element.name().to_string();

    if let Some(id) = element.id().filter(|id| !id.is_empty()) {
        segment.push('#');
        segment.push_str(&escape_identifier(id));
    }

    for class in element.classes() {
        segment.push('.');
        segment.push_str(&escape_identifier(class));
    }

    if let Some(role) = element.attr("role") {
        segment.push_str(&format!("[role={}]", quote_string(role)));
    }

    let position = type_position(el);
    if strict {
        segment.push_str(&format!(":nth-of-type({})", position));
    } else if similar_siblings(el) > 1 {
        if position == 1 {
            segment.push_str(":first-of-type");
        } else {
            segment.push_str(&format!(":nth-of-type({})", position));
        }
    }

    segment
}

fn type_position(el: ElementRef<'_>) -> usize {
    let tag = el.value().name();
    el.prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == tag)
        .count()
        + 1
}

/// Siblings (self included) sharing both tag and exact class set.
fn similar_siblings(el: ElementRef<'_>) -> usize {
    let Some(parent) = el.parent() else {
        return 1;
    };
    let tag = el.value().name();
    let classes = class_set(el);

    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == tag && class_set(*sibling) == classes)
        .count()
}

/// Does `css`, queried inside `el`'s parent, select exactly `el`?
fn selects_only(el: ElementRef<'_>, css: &str) -> Result<bool> {
    let selector = parse_selector(css)?;
    let scope = el.parent().unwrap_or(*el);

    let selected: Vec<NodeId> = scope
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|candidate| selector.matches(candidate))
        .map(|candidate| candidate.id())
        .collect();

    Ok(selected == [el.id()])
}

pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::SelectorSynthesis {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Build an XPath for `el`: `tag[k]` steps, anchored at the first ancestor carrying an id.
///
/// Paths that run to the top of a full document are absolute; id-anchored paths and paths
/// lifted from a fragment are descendant-anchored (`//`).
pub fn synthesize_xpath(el: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    let mut anchored = false;
    let mut current = Some(el);

    while let Some(node) = current {
        if is_fragment_wrapper(node) {
            break;
        }
        let tag = node.value().name();

        let id_literal = node
            .value()
            .id()
            .filter(|id| !id.is_empty())
            .and_then(xpath_literal);
        if let Some(literal) = id_literal {
            parts.push(format!("{}[@id={}]", tag, literal));
            anchored = true;
            break;
        }

        parts.push(format!("{}[{}]", tag, type_position(node)));
        current = parent_element(node);
    }

    parts.reverse();
    let in_document = el.ancestors().last().is_some_and(|top| top.value().is_document());
    let prefix = if !anchored && in_document { "/" } else { "//" };
    format!("{}{}", prefix, parts.join("/"))
}

/// Strip positional predicates so the path matches structurally similar elements.
pub fn loose_xpath(xpath: &str) -> String {
    POSITIONAL.replace_all(xpath, "").into_owned()
}

/// Translate the XPath subset produced by [`synthesize_xpath`] into a CSS selector.
pub fn xpath_to_css(xpath: &str) -> Result<String> {
    let unsupported = |message: &str| AppError::SelectorSynthesis {
        selector: xpath.to_string(),
        message: message.to_string(),
    };

    let (absolute, body) = if let Some(rest) = xpath.strip_prefix("//") {
        (false, rest)
    } else if let Some(rest) = xpath.strip_prefix('/') {
        (true, rest)
    } else {
        return Err(unsupported("relative paths are not supported"));
    };

    let steps = split_steps(body);
    if steps.iter().any(|step| step.is_empty()) {
        return Err(unsupported("empty step or inner descendant axis"));
    }

    let mut segments = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let mut css = step_to_css(step).map_err(|message| unsupported(&message))?;
        if index == 0 && absolute {
            css.push_str(":root");
        }
        segments.push(css);
    }

    Ok(segments.join(" > "))
}

fn split_steps(path: &str) -> Vec<&str> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                steps.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    steps.push(&path[start..]);
    steps
}

fn step_to_css(step: &str) -> std::result::Result<String, String> {
    let name_end = step.find('[').unwrap_or(step.len());
    let name = &step[..name_end];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!("unsupported node test '{}'", name));
    }

    let mut css = name.to_string();
    let mut rest = &step[name_end..];

    while !rest.is_empty() {
        let close = predicate_end(rest).ok_or_else(|| format!("unterminated predicate in '{}'", step))?;
        let predicate = rest[1..close].trim();

        if let Ok(position) = predicate.parse::<usize>() {
            css.push_str(&format!(":nth-of-type({})", position));
        } else if let Some(literal) = predicate.strip_prefix("@id=") {
            let value = unquote(literal.trim()).ok_or_else(|| format!("bad id literal '{}'", literal))?;
            css.push_str(&format!("[id={}]", quote_string(value)));
        } else {
            return Err(format!("unsupported predicate '{}'", predicate));
        }

        rest = &rest[close + 1..];
    }

    Ok(css)
}

/// Index of the `]` closing the predicate that opens at `predicates[0]`.
fn predicate_end(predicates: &str) -> Option<usize> {
    if !predicates.starts_with('[') {
        return None;
    }
    let mut quote: Option<char> = None;
    for (i, c) in predicates.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn unquote(literal: &str) -> Option<&str> {
    let first = literal.chars().next()?;
    if (first == '"' || first == '\'') && literal.len() >= 2 && literal.ends_with(first) {
        Some(&literal[1..literal.len() - 1])
    } else {
        None
    }
}

fn xpath_literal(value: &str) -> Option<String> {
    if !value.contains('"') {
        Some(format!("\"{}\"", value))
    } else if !value.contains('\'') {
        Some(format!("'{}'", value))
    } else {
        None
    }
}

/// Serialize a CSS identifier (CSSOM "serialize an identifier").
pub fn escape_identifier(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{:x} ", c as u32)),
            '0'..='9' if i == 0 || (i == 1 && chars[0] == '-') => {
                out.push_str(&format!("\\{:x} ", c as u32))
            }
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }

    out
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
