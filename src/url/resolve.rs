use url::Url;

/// Resolves a reference found in a page to an absolute http(s) URL
///
/// Returns None if the reference should be ignored:
/// - empty or fragment-only references
/// - javascript:, mailto:, tel: and data: URIs
/// - references that fail to resolve, or resolve to a non-HTTP(S) scheme
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then_some(absolute)
}

/// Last path segment of a URL, if it names something
pub fn file_name_from_url(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
}

/// Guesses a file extension (with leading dot) for a downloaded resource
///
/// The URL path wins; otherwise the content type is mapped through the MIME
/// table, and `.bin` is the last resort.
pub fn guess_extension(url: &Url, content_type: Option<&str>) -> String {
    if let Some(name) = file_name_from_url(url) {
        if let Some((stem, ext)) = name.rsplit_once('.') {
            if !stem.is_empty() && !ext.is_empty() {
                return format!(".{}", ext.to_ascii_lowercase());
            }
        }
    }

    if let Some(content_type) = content_type {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        if let Some(ext) = mime_guess::get_mime_extensions_str(essence)
            .and_then(|exts| exts.first())
        {
            return format!(".{}", ext);
        }
    }

    ".bin".to_string()
}
