use crate::{UrlError, UrlResult};
use url::Url;

/// A URL that passed the protocol allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    pub url: Url,

    /// The URL uses plain http and a warning should be logged
    pub insecure: bool,
}

/// Validates a URL against the protocol allow-list
///
/// Plain http is accepted when listed, but flagged `insecure` when
/// `warn_on_http` is set so callers can log a warning instead of rejecting.
///
/// # Returns
///
/// * `Ok(ValidatedUrl)` - The URL is acceptable
/// * `Err(UrlError::InvalidScheme)` - The scheme is not in the allow-list
/// * `Err(UrlError::Parse | UrlError::MissingHost)` - The URL is malformed
///
/// # Examples
///
/// ```
/// use snapshot_archiver::url::validate_url;
///
/// let protocols = vec!["https".to_string(), "http".to_string()];
/// let checked = validate_url("http://example.com/", &protocols, true).unwrap();
/// assert!(checked.insecure);
/// assert!(validate_url("ftp://example.com/", &protocols, true).is_err());
/// ```
pub fn validate_url(
    raw: &str,
    allowed_protocols: &[String],
    warn_on_http: bool,
) -> UrlResult<ValidatedUrl> {
    let raw = raw.trim();

    // Scheme first, so "ftp://..." reports a protocol problem rather than a parse one
    let scheme = raw
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| UrlError::Parse(format!("missing scheme in '{}'", raw)))?;

    if !allowed_protocols.iter().any(|p| p.eq_ignore_ascii_case(&scheme)) {
        return Err(UrlError::InvalidScheme(scheme));
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(ValidatedUrl {
        insecure: url.scheme() == "http" && warn_on_http,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocols() -> Vec<String> {
        vec!["https".to_string(), "http".to_string()]
    }

    #[test]
    fn test_https_accepted() {
        let checked = validate_url("https://example.com/page", &protocols(), true).unwrap();
        assert_eq!(checked.url.as_str(), "https://example.com/page");
        assert!(!checked.insecure);
    }

    #[test]
    fn test_http_warns_but_passes() {
        let checked = validate_url("http://example.com/", &protocols(), true).unwrap();
        assert!(checked.insecure);

        let quiet = validate_url("http://example.com/", &protocols(), false).unwrap();
        assert!(!quiet.insecure);
    }

    #[test]
    fn test_uppercase_scheme() {
        assert!(validate_url("HTTPS://example.com/", &protocols(), true).is_ok());
    }

    #[test]
    fn test_disallowed_scheme() {
        let err = validate_url("ftp://example.com/file", &protocols(), true).unwrap_err();
        assert!(matches!(err, UrlError::InvalidScheme(s) if s == "ftp"));

        let err = validate_url("javascript:alert(1)", &protocols(), true).unwrap_err();
        assert!(matches!(err, UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_http_not_listed() {
        let https_only = vec!["https".to_string()];
        assert!(matches!(
            validate_url("http://example.com/", &https_only, true),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_missing_scheme() {
        assert!(matches!(
            validate_url("example.com/page", &protocols(), true),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_host() {
        assert!(validate_url("https://", &protocols(), true).is_err());
    }
}
