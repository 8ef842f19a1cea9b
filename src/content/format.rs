//! Pretty-printing for HTML, JSON and YAML

use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is printed as-is
const VERBATIM_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

/// Re-indents an HTML document, one node per line with one space per level
///
/// Input without an `<html>` tag is treated as a fragment, so no implied
/// `<html>`/`<head>`/`<body>` wrappers are added.
pub fn prettify_html(html: &str) -> String {
    let mut out = String::new();

    if html.to_ascii_lowercase().contains("<html") {
        let document = Html::parse_document(html);
        for child in document.tree.root().children() {
            write_node(child, 0, &mut out);
        }
    } else {
        let fragment = Html::parse_fragment(html);
        let root = fragment.root_element();
        for child in root.children() {
            write_node(child, 0, &mut out);
        }
    }

    out
}

fn write_node(node: NodeRef<'_, Node>, depth: usize, out: &mut String) {
    let indent = " ".repeat(depth);
    match node.value() {
        Node::Doctype(doctype) => {
            out.push_str(&format!("<!DOCTYPE {}>\n", doctype.name()));
        }
        Node::Comment(comment) => {
            out.push_str(&format!("{}<!--{}-->\n", indent, &**comment));
        }
        Node::Text(text) => {
            let text = text.trim();
            if !text.is_empty() {
                out.push_str(&indent);
                out.push_str(&escape_text(text));
                out.push('\n');
            }
        }
        Node::Element(element) => {
            let name = element.name();
            let mut open = format!("{}<{}", indent, name);
            for (attr, value) in element.attrs() {
                open.push_str(&format!(" {}=\"{}\"", attr, escape_attribute(value)));
            }
            open.push('>');

            if VOID_ELEMENTS.contains(&name) {
                out.push_str(&open);
                out.push('\n');
            } else if VERBATIM_ELEMENTS.contains(&name) {
                let inner = ElementRef::wrap(node)
                    .map(|el| el.inner_html())
                    .unwrap_or_default();
                out.push_str(&format!("{}{}</{}>\n", open, inner, name));
            } else {
                out.push_str(&open);
                out.push('\n');
                for child in node.children() {
                    write_node(child, depth + 1, out);
                }
                out.push_str(&format!("{}</{}>\n", indent, name));
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                write_node(child, depth, out);
            }
        }
        _ => {}
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Re-indents JSON with two spaces, keeping key order and non-ASCII text
pub fn prettify_json(json: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    serde_json::to_string_pretty(&value)
}

/// Re-emits YAML in block style
pub fn prettify_yaml(yaml: &str) -> Result<String, serde_yaml::Error> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    serde_yaml::to_string(&value)
}
