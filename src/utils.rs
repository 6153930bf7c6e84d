use unicode_width::UnicodeWidthChar;

use url::{Position, Url};

const MAX_FILENAME_CHARS: usize = 150;

/// Safely truncate a string for terminal display
///
/// The result never splits a multi-byte character, ends with an ellipsis when
/// shortened, and its display width does not exceed `max_width`.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthStr;

    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(1);

        if current_width + char_width + 3 > max_width {
            break;
        }

        result.push(c);
        current_width += char_width;
    }

    result.push_str("...");
    result
}

/// First `max_chars` code points of `s`, without an ellipsis.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Screenshot file stem for a URL: host, port and path with `/` turned into `_`.
pub fn sanitize_filename(url: &str) -> String {
    let location = match Url::parse(url) {
        Ok(parsed) => parsed[Position::BeforeUsername..Position::AfterPath].to_string(),
        Err(_) => url.to_string(),
    };

    let stem = location.replace('/', "_");
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "page".to_string()
    } else {
        truncate_chars(stem, MAX_FILENAME_CHARS)
    }
}
