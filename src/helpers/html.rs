//! HTML helper functions

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Return `url` if it is safe to place in an `href`/`src` attribute.
///
/// Only `http`, `https` and `mailto` schemes, root-relative paths and
/// fragments are accepted. Anything else (`javascript:`, `data:`, ...) is
/// rejected.
pub fn safe_url(url: &str) -> Option<&str> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('#') || (trimmed.starts_with('/') && !trimmed.starts_with("//")) {
        return Some(trimmed);
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("mailto:")
    {
        Some(trimmed)
    } else {
        None
    }
}

/// Generate an image tag, or nothing when the source is not a safe URL
pub fn image_tag(src: &str, alt: Option<&str>) -> String {
    match safe_url(src) {
        Some(src) => format!(
            r#"<img src="{}" alt="{}">"#,
            html_escape(src),
            html_escape(alt.unwrap_or(""))
        ),
        None => String::new(),
    }
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}
