//! Removal of active content from HTML and CSS

use super::css::Stylesheet;
use lol_html::{element, rewrite_str, RewriteStrSettings};

/// Drops `<script>` elements and every `on*` event-handler attribute
pub fn sanitize_html(html: &str) -> Result<String, lol_html::errors::RewritingError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let handlers: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for name in handlers {
                        el.remove_attribute(&name);
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
}

/// Drops declarations whose value contains `expression` and re-serializes
pub fn sanitize_css(css: &str) -> Result<String, super::css::CssError> {
    let mut sheet = Stylesheet::parse(css)?;
    sheet.remove_expressions();
    Ok(sheet.to_css_string())
}
