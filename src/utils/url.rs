//! URL utilities for consistent endpoint construction
//!
//! This module provides utilities for normalizing base URLs to prevent
//! issues with trailing slashes when constructing the model endpoint.

/// Normalize a base URL by removing trailing slashes
///
/// This ensures consistent URL construction when appending the model path,
/// preventing double slashes in the final URL.
///
/// # Examples
///
/// ```
/// use bavard::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://example.com/v1beta"), "https://example.com/v1beta");
/// assert_eq!(normalize_base_url("https://example.com/v1beta/"), "https://example.com/v1beta");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct the `generateContent` URL for a model from a base URL
///
/// The credential is deliberately not part of the returned URL; it is
/// attached as a query parameter at request time so the URL can be logged.
///
/// # Examples
///
/// ```
/// use bavard::utils::url::construct_generate_url;
///
/// assert_eq!(
///     construct_generate_url("https://example.com/v1beta", "gemini-1.5-flash"),
///     "https://example.com/v1beta/models/gemini-1.5-flash:generateContent"
/// );
/// assert_eq!(
///     construct_generate_url("https://example.com/v1beta/", "gemini-1.5-flash"),
///     "https://example.com/v1beta/models/gemini-1.5-flash:generateContent"
/// );
/// ```
pub fn construct_generate_url(base_url: &str, model: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    format!("{}/models/{}:generateContent", normalized_base, model)
}
