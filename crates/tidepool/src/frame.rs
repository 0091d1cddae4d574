//! The isolated markup preview frame.
//!
//! A `MarkupFrame` owns everything it shows: the input markup is re-parsed
//! into a fresh node tree on every update, and any `<script>` content runs in
//! the frame's own interpreter with a throwaway console. Nothing in here can
//! reach the embedding playground's state.

use tracing::debug;

use crate::dispatch::ExecutionResult;
use crate::interpreter::{ExecutionBackend, TreeWalkBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attributes: Vec<(String, Option<String>)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

/// A sandboxed presentation context for markup-mode previews.
///
/// Frames are never patched in place; build a new one for every input change.
pub struct MarkupFrame {
    nodes: Vec<MarkupNode>,
    script_results: Vec<ExecutionResult>,
}

impl MarkupFrame {
    pub fn new(markup: &str) -> Self {
        let parsed = parse_markup(markup);
        debug!(
            nodes = parsed.nodes.len(),
            scripts = parsed.scripts.len(),
            "rebuilt markup frame"
        );
        // Scripts embedded in the markup run confined to this frame: a
        // private backend, a private console, output kept on the frame.
        let backend = TreeWalkBackend::default();
        let script_results = parsed
            .scripts
            .iter()
            .map(|source| backend.evaluate(source))
            .collect();
        Self {
            nodes: parsed.nodes,
            script_results,
        }
    }

    pub fn nodes(&self) -> &[MarkupNode] {
        &self.nodes
    }

    /// Outcomes of the scripts embedded in the markup, in document order.
    pub fn script_results(&self) -> &[ExecutionResult] {
        &self.script_results
    }

    /// The visible text of the document, with script and style content left
    /// out, whitespace-normalized between nodes.
    pub fn text_content(&self) -> String {
        let mut pieces = Vec::new();
        collect_text(&self.nodes, &mut pieces);
        pieces.join(" ")
    }
}

fn collect_text(nodes: &[MarkupNode], pieces: &mut Vec<String>) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pieces.push(trimmed.to_string());
                }
            }
            MarkupNode::Element { tag, children, .. } => {
                if tag != "script" && tag != "style" {
                    collect_text(children, pieces);
                }
            }
        }
    }
}

struct ParsedMarkup {
    nodes: Vec<MarkupNode>,
    scripts: Vec<String>,
}

/// Elements that never have children and need no closing tag.
const VOID_ELEMENTS: [&str; 8] = ["br", "hr", "img", "input", "meta", "link", "source", "wbr"];

/// A tolerant, minimal tag scanner. Malformed input degrades to text or to
/// auto-closed elements; it never fails.
fn parse_markup(input: &str) -> ParsedMarkup {
    let mut scripts = Vec::new();
    // Stack of open elements; the bottom entry collects the root nodes.
    let mut stack: Vec<(String, Vec<(String, Option<String>)>, Vec<MarkupNode>)> =
        vec![(String::new(), Vec::new(), Vec::new())];
    let bytes = input.as_bytes();
    let mut position = 0;

    while position < bytes.len() {
        let Some(open) = input[position..].find('<').map(|at| position + at) else {
            push_text(&mut stack, &input[position..]);
            break;
        };
        if open > position {
            push_text(&mut stack, &input[position..open]);
        }

        let rest = &input[open..];
        if let Some(comment_body) = rest.strip_prefix("<!--") {
            position = match comment_body.find("-->") {
                Some(end) => open + 4 + end + 3,
                None => bytes.len(),
            };
            continue;
        }

        if let Some(closing) = rest.strip_prefix("</") {
            let Some(end) = closing.find('>') else {
                // Dangling close tag; treat the remainder as text.
                push_text(&mut stack, rest);
                break;
            };
            let name = closing[..end].trim().to_ascii_lowercase();
            close_element(&mut stack, &name);
            position = open + 2 + end + 1;
            continue;
        }

        let Some(end) = rest.find('>') else {
            push_text(&mut stack, rest);
            break;
        };
        let inside = &rest[1..end];
        let self_closing = inside.ends_with('/');
        let inside = inside.trim_end_matches('/');
        let (tag, attributes) = parse_tag(inside);
        position = open + end + 1;

        if tag.is_empty() {
            push_text(&mut stack, &rest[..end + 1]);
            continue;
        }

        if tag == "script" || tag == "style" {
            // Raw-text elements: capture verbatim up to the matching close tag.
            let close = format!("</{tag}");
            let remainder = &input[position..];
            let (content, consumed) = match find_case_insensitive(remainder, &close) {
                Some(at) => {
                    let after = remainder[at..].find('>').map_or(remainder.len(), |g| at + g + 1);
                    (&remainder[..at], after)
                }
                None => (remainder, remainder.len()),
            };
            if tag == "script" {
                scripts.push(content.to_string());
            }
            let element = MarkupNode::Element {
                tag,
                attributes,
                children: vec![MarkupNode::Text(content.to_string())],
            };
            append_node(&mut stack, element);
            position += consumed;
            continue;
        }

        if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            append_node(&mut stack, MarkupNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        } else {
            stack.push((tag, attributes, Vec::new()));
        }
    }

    // Anything still open at the end auto-closes.
    while stack.len() > 1 {
        let (tag, attributes, children) = stack.pop().expect("stack underflow is unreachable");
        append_node(&mut stack, MarkupNode::Element {
            tag,
            attributes,
            children,
        });
    }

    let (_, _, nodes) = stack.pop().expect("root frame is always present");
    ParsedMarkup { nodes, scripts }
}

fn push_text(
    stack: &mut Vec<(String, Vec<(String, Option<String>)>, Vec<MarkupNode>)>,
    text: &str,
) {
    if !text.is_empty() {
        append_node(stack, MarkupNode::Text(text.to_string()));
    }
}

fn append_node(
    stack: &mut Vec<(String, Vec<(String, Option<String>)>, Vec<MarkupNode>)>,
    node: MarkupNode,
) {
    if let Some((_, _, children)) = stack.last_mut() {
        children.push(node);
    }
}

fn close_element(
    stack: &mut Vec<(String, Vec<(String, Option<String>)>, Vec<MarkupNode>)>,
    name: &str,
) {
    // Find the nearest matching open element; ignore a stray close tag.
    let Some(at) = stack.iter().rposition(|(tag, _, _)| tag == name) else {
        return;
    };
    if at == 0 {
        return;
    }
    // Everything opened above the match auto-closes with it.
    while stack.len() > at {
        let (tag, attributes, children) = stack.pop().expect("bounded by rposition");
        append_node(stack, MarkupNode::Element {
            tag,
            attributes,
            children,
        });
    }
}

fn parse_tag(inside: &str) -> (String, Vec<(String, Option<String>)>) {
    let mut parts = inside.trim().splitn(2, char::is_whitespace);
    let tag = parts
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') || tag.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut attributes = Vec::new();
    if let Some(raw) = parts.next() {
        attributes = parse_attributes(raw);
    }
    (tag, attributes)
}

fn parse_attributes(raw: &str) -> Vec<(String, Option<String>)> {
    let mut attributes = Vec::new();
    let mut chars = raw.char_indices().peekable();
    while let Some(&(start, character)) = chars.peek() {
        if character.is_whitespace() {
            chars.next();
            continue;
        }
        // Attribute name runs until '=', whitespace, or the end.
        let mut name_end = raw.len();
        while let Some(&(at, c)) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                name_end = at;
                break;
            }
            chars.next();
            if chars.peek().is_none() {
                name_end = raw.len();
            }
        }
        let name = raw[start..name_end].to_ascii_lowercase();
        if name.is_empty() {
            break;
        }

        let mut value = None;
        if let Some(&(_, '=')) = chars.peek() {
            chars.next();
            match chars.peek() {
                Some(&(value_start, quote @ ('"' | '\''))) => {
                    chars.next();
                    let mut value_end = raw.len();
                    for (at, c) in chars.by_ref() {
                        if c == quote {
                            value_end = at;
                            break;
                        }
                    }
                    value = Some(raw[value_start + 1..value_end].to_string());
                }
                Some(&(value_start, _)) => {
                    let mut value_end = raw.len();
                    while let Some(&(at, c)) = chars.peek() {
                        if c.is_whitespace() {
                            value_end = at;
                            break;
                        }
                        chars.next();
                    }
                    value = Some(raw[value_start..value_end].to_string());
                }
                None => {}
            }
        }
        attributes.push((name, value));
    }
    attributes
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    haystack_lower.find(&needle.to_ascii_lowercase())
}
