use std::sync::LazyLock;

use regex::Regex;

static RE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>|<[^>]*>").unwrap());

/// Whitespace-separated tokens.
pub(crate) fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Characters excluding whitespace, which is how translation volume is billed.
pub(crate) fn count_chars(text: &str) -> u64 {
    text.chars().filter(|c| !c.is_whitespace()).count() as u64
}

/// Strips markup, keeping text nodes separated by whitespace.
pub(crate) fn strip_html(html: &str) -> String {
    let stripped = RE_MARKUP.replace_all(html, " ");
    stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Counts `<img>` elements in an HTML document.
pub(crate) fn count_html_images(html: &str) -> u64 {
    html.to_lowercase().matches("<img").count() as u64
}
