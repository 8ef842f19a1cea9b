//! Metadata extraction
//!
//! Every item gets a base record (type, size, digest, timestamp); HTML, CSS
//! and JavaScript add type-specific details.

use super::classify::ContentKind;
use super::css::Stylesheet;
use super::js::{self, ClassDecl, ExportDecl, FunctionDecl, ImportDecl, Node, Visitor};
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMetadata {
    pub content_type: String,
    pub size: usize,
    pub hash: String,
    pub extracted_at: DateTime<Utc>,

    #[serde(flatten)]
    pub details: Option<MetadataDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataDetails {
    Html(HtmlMetadata),
    Css(CssMetadata),
    JavaScript(JsMetadata),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HtmlMetadata {
    pub title: Option<String>,
    pub meta_tags: BTreeMap<String, String>,
    pub links: Vec<LinkInfo>,
    pub scripts: Vec<ScriptInfo>,
    pub images: Vec<ImageInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkInfo {
    pub href: String,
    pub rel: Vec<String>,
    #[serde(rename = "type")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptInfo {
    pub src: String,
    #[serde(rename = "type")]
    pub script_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub src: String,
    pub alt: String,
    pub width: Option<String>,
    pub height: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CssMetadata {
    pub rules_count: usize,
    pub selectors: Vec<String>,
    pub imports: Vec<String>,
    pub media_queries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JsMetadata {
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
}

/// Lowercase hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Builds the metadata record for `content` of the given MIME type
///
/// Type-specific details are omitted when the content does not parse.
pub fn extract_metadata(content: &[u8], content_type: &str) -> ContentMetadata {
    let details = match ContentKind::from_mime(content_type) {
        ContentKind::Html => Some(MetadataDetails::Html(html_metadata(
            &String::from_utf8_lossy(content),
        ))),
        ContentKind::Css => css_metadata(&String::from_utf8_lossy(content)).map(MetadataDetails::Css),
        ContentKind::JavaScript => {
            js_metadata(&String::from_utf8_lossy(content)).map(MetadataDetails::JavaScript)
        }
        _ => None,
    };

    ContentMetadata {
        content_type: content_type.to_string(),
        size: content.len(),
        hash: sha256_hex(content),
        extracted_at: Utc::now(),
        details,
    }
}

pub fn html_metadata(html: &str) -> HtmlMetadata {
    let document = Html::parse_document(html);
    let mut metadata = HtmlMetadata::default();

    if let Ok(selector) = Selector::parse("title") {
        metadata.title = document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string());
    }

    if let Ok(selector) = Selector::parse("meta") {
        for meta in document.select(&selector) {
            let attrs = meta.value();
            if let Some(name) = attrs.attr("name").or_else(|| attrs.attr("property")) {
                metadata.meta_tags.insert(
                    name.to_string(),
                    attrs.attr("content").unwrap_or_default().to_string(),
                );
            }
        }
    }

    if let Ok(selector) = Selector::parse("link[href]") {
        metadata.links = document
            .select(&selector)
            .filter_map(|link| {
                let attrs = link.value();
                Some(LinkInfo {
                    href: attrs.attr("href")?.to_string(),
                    rel: attrs
                        .attr("rel")
                        .map(|rel| rel.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default(),
                    link_type: attrs.attr("type").map(str::to_string),
                })
            })
            .collect();
    }

    if let Ok(selector) = Selector::parse("script[src]") {
        metadata.scripts = document
            .select(&selector)
            .filter_map(|script| {
                let attrs = script.value();
                Some(ScriptInfo {
                    src: attrs.attr("src")?.to_string(),
                    script_type: attrs.attr("type").unwrap_or("text/javascript").to_string(),
                })
            })
            .collect();
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        metadata.images = document
            .select(&selector)
            .filter_map(|img| {
                let attrs = img.value();
                Some(ImageInfo {
                    src: attrs.attr("src")?.to_string(),
                    alt: attrs.attr("alt").unwrap_or_default().to_string(),
                    width: attrs.attr("width").map(str::to_string),
                    height: attrs.attr("height").map(str::to_string),
                })
            })
            .collect();
    }

    metadata
}

pub fn css_metadata(css: &str) -> Option<CssMetadata> {
    match Stylesheet::parse(css) {
        Ok(sheet) => Some(CssMetadata {
            rules_count: sheet.rules.len(),
            selectors: sheet.selectors(),
            imports: sheet.imports(),
            media_queries: sheet.media_queries(),
        }),
        Err(e) => {
            tracing::debug!("Skipping CSS metadata: {}", e);
            None
        }
    }
}

pub fn js_metadata(source: &str) -> Option<JsMetadata> {
    match js::parse(source) {
        Ok(program) => {
            let mut metadata = JsMetadata::default();
            js::walk_program(&mut metadata, &program);
            Some(metadata)
        }
        Err(e) => {
            tracing::debug!("Skipping JavaScript metadata: {}", e);
            None
        }
    }
}

impl Visitor for JsMetadata {
    fn visit_function(&mut self, function: &FunctionDecl) {
        self.functions.push(function.name.clone());
    }

    fn visit_class(&mut self, class: &ClassDecl) {
        self.classes.push(class.name.clone());
    }

    fn visit_import(&mut self, import: &ImportDecl) {
        self.imports.push(import.source.clone());
    }

    fn visit_export(&mut self, export: &ExportDecl) {
        match export {
            ExportDecl::Declaration(node) => match node.as_ref() {
                Node::Function(function) => self.exports.push(function.name.clone()),
                Node::Class(class) => self.exports.push(class.name.clone()),
                _ => {}
            },
            ExportDecl::Variables(names) | ExportDecl::Specifiers { names, .. } => {
                self.exports.extend(names.iter().cloned());
            }
            ExportDecl::All {
                alias: Some(alias), ..
            } => self.exports.push(alias.clone()),
            _ => {}
        }
        js::walk_export(self, export);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_fields() {
        let metadata = extract_metadata(b"hello", "text/plain");
        assert_eq!(metadata.content_type, "text/plain");
        assert_eq!(metadata.size, 5);
        assert_eq!(
            metadata.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(metadata.details.is_none());
    }

    #[test]
    fn test_html_metadata() {
        let html = r#"<html><head>
            <title> Example </title>
            <meta name="description" content="A page">
            <meta property="og:title" content="OG">
            <meta charset="utf-8">
            <link rel="stylesheet icon" href="/s.css" type="text/css">
            <script src="/a.js"></script>
            <script type="module" src="/m.js"></script>
            <script>inline()</script>
        </head><body><img src="a.png" alt="A" width="10"><img></body></html>"#;

        let metadata = html_metadata(html);
        assert_eq!(metadata.title.as_deref(), Some("Example"));
        assert_eq!(metadata.meta_tags.len(), 2);
        assert_eq!(metadata.meta_tags["og:title"], "OG");
        assert_eq!(metadata.links[0].rel, vec!["stylesheet", "icon"]);
        assert_eq!(metadata.links[0].link_type.as_deref(), Some("text/css"));
        assert_eq!(metadata.scripts.len(), 2);
        assert_eq!(metadata.scripts[0].script_type, "text/javascript");
        assert_eq!(metadata.scripts[1].script_type, "module");
        assert_eq!(metadata.images.len(), 1);
        assert_eq!(metadata.images[0].width.as_deref(), Some("10"));
        assert_eq!(metadata.images[0].height, None);
    }

    #[test]
    fn test_css_metadata() {
        let metadata = extract_metadata(
            b"@import 'a.css';\nbody { margin: 0 }\n@media print { p { color: black } }",
            "text/css",
        );
        match metadata.details {
            Some(MetadataDetails::Css(css)) => {
                assert_eq!(css.rules_count, 3);
                assert_eq!(css.selectors, vec!["body"]);
                assert_eq!(css.imports, vec!["a.css"]);
                assert_eq!(css.media_queries, vec!["print"]);
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_js_metadata() {
        let source = r#"
            import { h } from "./h.js";
            export function render() {}
            export const VERSION = "1";
            export default class App {}
            class Helper {}
        "#;
        let metadata = js_metadata(source).unwrap();
        assert_eq!(metadata.functions, vec!["render"]);
        assert_eq!(metadata.classes, vec!["App", "Helper"]);
        assert_eq!(metadata.imports, vec!["./h.js"]);
        // Default exports are not named exports
        assert_eq!(metadata.exports, vec!["render", "VERSION"]);
    }

    #[test]
    fn test_js_parse_failure_has_no_details() {
        let metadata = extract_metadata(b"function broken( {", "application/javascript");
        assert!(metadata.details.is_none());
        assert_eq!(metadata.size, 18);
    }

    #[test]
    fn test_serialized_shape_is_flat() {
        let metadata = extract_metadata(b"function f() {}", "application/javascript");
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["functions"][0], "f");
        assert_eq!(value["content_type"], "application/javascript");
    }
}
