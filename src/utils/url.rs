//! Joining configured base URLs with endpoint paths.

/// Strip trailing slashes from a base URL.
///
/// ```
/// use nestchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434/api/"), "http://localhost:11434/api");
/// assert_eq!(normalize_base_url("http://localhost:11434/api///"), "http://localhost:11434/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Append `endpoint` to `base_url` with exactly one slash between them.
///
/// ```
/// use nestchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/api/", "/generate"),
///     "http://localhost:11434/api/generate"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// True when the value looks like an absolute http(s) URL.
pub fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    ["http://", "https://"].iter().any(|scheme| {
        value
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
            && value.len() > scheme.len()
    })
}
