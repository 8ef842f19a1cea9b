//! Resource discovery in fetched pages

use crate::url::resolve_link;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Work lists extracted from one page
///
/// Every URL appears at most once across all four lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTasks {
    pub images: Vec<Url>,
    pub videos: Vec<Url>,
    pub stylesheets: Vec<Url>,
    pub scripts: Vec<Url>,
    pub inline_styles: Vec<String>,
    pub inline_scripts: Vec<String>,
}

impl ResourceTasks {
    /// Number of fetches the binary resource lists require
    pub fn media_count(&self) -> usize {
        self.images.len() + self.videos.len()
    }
}

/// Extracts resource references from pages, remembering what it has seen
///
/// The seen set lives as long as the traverser, so a URL referenced by two
/// pages of the same run is only scheduled once.
#[derive(Debug, Default)]
pub struct WebTraverser {
    seen: HashSet<String>,
}

struct Selectors {
    base: Selector,
    image: Selector,
    media: Selector,
    stylesheet: Selector,
    script_src: Selector,
    style: Selector,
    script_inline: Selector,
}

impl Selectors {
    fn new() -> Option<Self> {
        Some(Self {
            base: Selector::parse("base[href]").ok()?,
            image: Selector::parse("img[src]").ok()?,
            media: Selector::parse("video[src], source[src]").ok()?,
            stylesheet: Selector::parse("link[rel~=stylesheet][href]").ok()?,
            script_src: Selector::parse("script[src]").ok()?,
            style: Selector::parse("style").ok()?,
            script_inline: Selector::parse("script:not([src])").ok()?,
        })
    }
}

impl WebTraverser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every URL scheduled so far
    pub fn clear_cache(&mut self) {
        self.seen.clear();
    }

    /// Extracts resource tasks from `html`, fetched from `page_url`
    ///
    /// References resolve against `<base href>` when the page has one.
    pub fn extract(&mut self, html: &str, page_url: &Url) -> ResourceTasks {
        let mut tasks = ResourceTasks::default();
        let Some(selectors) = Selectors::new() else {
            return tasks;
        };
        let document = Html::parse_document(html);

        let base = document
            .select(&selectors.base)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok())
            .unwrap_or_else(|| page_url.clone());

        for (selector, attr, list) in [
            (&selectors.image, "src", &mut tasks.images),
            (&selectors.media, "src", &mut tasks.videos),
            (&selectors.stylesheet, "href", &mut tasks.stylesheets),
            (&selectors.script_src, "src", &mut tasks.scripts),
        ] {
            for element in document.select(selector) {
                let Some(url) = element
                    .value()
                    .attr(attr)
                    .and_then(|href| resolve_link(href, &base))
                else {
                    continue;
                };
                if self.seen.insert(url.to_string()) {
                    list.push(url);
                } else {
                    tracing::debug!("Skipping duplicate resource {}", url);
                }
            }
        }

        tasks.inline_styles = inline_bodies(&document, &selectors.style);
        tasks.inline_scripts = inline_bodies(&document, &selectors.script_inline);

        tasks
    }
}

fn inline_bodies(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>())
        .filter(|body| !body.trim().is_empty())
        .collect()
}
