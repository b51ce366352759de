//! Escaping tables for the built-in markup formats.

/// Escape with a per-char replacement table, copying untouched runs in bulk.
fn escape_with(text: &str, replace: impl Fn(char) -> Option<&'static str>) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut last = 0;
    for (i, c) in text.char_indices() {
        if let Some(rep) = replace(c) {
            out.push_str(&text[last..i]);
            out.push_str(rep);
            last = i + c.len_utf8();
        }
    }
    out.push_str(&text[last..]);
    out
}

pub fn escape_html(text: &str) -> String {
    escape_with(text, |c| match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    })
}

pub fn escape_xhtml(text: &str) -> String {
    escape_html(text)
}

pub fn escape_xml(text: &str) -> String {
    escape_with(text, |c| match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&apos;"),
        _ => None,
    })
}

pub fn escape_rtf(text: &str) -> String {
    escape_with(text, |c| match c {
        '\\' => Some("\\\\"),
        '{' => Some("\\{"),
        '}' => Some("\\}"),
        _ => None,
    })
}
