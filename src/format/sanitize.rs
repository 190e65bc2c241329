//! Reduce feed HTML to the subset Telegram accepts.

use std::sync::OnceLock;

use regex::{Captures, Regex};

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static HREF_RE: OnceLock<Regex> = OnceLock::new();
static NEWLINES_RE: OnceLock<Regex> = OnceLock::new();
static ENTITY_RE: OnceLock<Regex> = OnceLock::new();
static IMG_SRC_RE: OnceLock<Regex> = OnceLock::new();
static IMAGE_URL_RE: OnceLock<Regex> = OnceLock::new();
static TELEGRAM_CDN_RE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

fn tag_re() -> &'static Regex {
    regex(
        &TAG_RE,
        r#"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    )
}

fn entity_re() -> &'static Regex {
    regex(&ENTITY_RE, r"^&(?:#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);")
}

const INLINE_TAGS: &[&str] = &["b", "i", "u", "s", "code", "pre"];

/// Keep `b i u s code pre` and `a href`, turn `<br>` into newlines and drop
/// every other tag. The result is balanced: closers without an opener are
/// dropped, a closer for an outer tag also closes the tags opened inside it,
/// and anything left open is closed at the end. Text is escaped, except for
/// entities that are already well formed.
pub fn sanitize(html: &str) -> String {
    let href_re = regex(
        &HREF_RE,
        r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
    );

    let mut out = String::with_capacity(html.len());
    let mut open: Vec<&'static str> = Vec::new();
    let mut last = 0;

    for caps in tag_re().captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_text(&html[last..whole.start()]));
        last = whole.end();

        let Some(name) = caps.get(2) else {
            // comment
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = name.as_str().to_ascii_lowercase();

        if name == "br" {
            out.push('\n');
            continue;
        }
        let Some(tag) = allowed_tag(&name) else { continue };

        if closing {
            if let Some(pos) = open.iter().rposition(|t| *t == tag) {
                for inner in open.drain(pos..).rev() {
                    push_closer(&mut out, inner);
                }
            }
        } else if tag == "a" {
            if open.contains(&"a") {
                continue;
            }
            let attrs = caps.get(3).map_or("", |m| m.as_str());
            let href = href_re.captures(attrs).and_then(|c| {
                c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)).map(|m| m.as_str())
            });
            if let Some(href) = href.filter(|h| !h.trim().is_empty()) {
                open.push("a");
                out.push_str(&format!("<a href=\"{}\">", escape_attribute(href.trim())));
            }
        } else {
            open.push(tag);
            out.push('<');
            out.push_str(tag);
            out.push('>');
        }
    }
    out.push_str(&escape_text(&html[last..]));

    for tag in open.into_iter().rev() {
        push_closer(&mut out, tag);
    }

    collapse_newlines(&out)
}

fn allowed_tag(name: &str) -> Option<&'static str> {
    if name == "a" {
        return Some("a");
    }
    INLINE_TAGS.iter().copied().find(|t| *t == name)
}

fn push_closer(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Remove every tag. The remaining text is escaped for HTML messages.
pub fn to_plain_text(html: &str) -> String {
    strip_tags(html, escape_text)
}

fn strip_tags(html: &str, text: fn(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in tag_re().captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text(&html[last..whole.start()]));
        last = whole.end();
        if caps
            .get(2)
            .is_some_and(|name| name.as_str().eq_ignore_ascii_case("br"))
        {
            out.push('\n');
        }
    }
    out.push_str(&text(&html[last..]));
    collapse_newlines(out.trim())
}

/// Plain-text rendering used as AI input; entities are decoded.
pub fn render_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 10_000) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::debug!("html2text failed, stripping tags instead: {}", e);
            strip_tags(html, str::to_string)
        }
    }
}

fn collapse_newlines(s: &str) -> String {
    regex(&NEWLINES_RE, r"\n{3,}").replace_all(s, "\n\n").into_owned()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape `& < >` but leave existing entities intact.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        match c {
            '&' if entity_re().is_match(&s[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// First image in a description: an `<img src>`, a bare image URL, or a
/// Telegram CDN link.
pub fn extract_image_url(html: &str) -> Option<String> {
    let img = regex(&IMG_SRC_RE, r#"(?i)<img[^>]+src=["']([^"']+)["']"#);
    if let Some(src) = img.captures(html).and_then(|c| c.get(1)) {
        return Some(src.as_str().to_string());
    }

    let bare = regex(
        &IMAGE_URL_RE,
        r#"(?i)https?://[^\s"'<>]+\.(?:jpg|jpeg|png|gif|webp)"#,
    );
    if let Some(m) = bare.find(html) {
        return Some(m.as_str().to_string());
    }

    let cdn = regex(
        &TELEGRAM_CDN_RE,
        r#"https?://cdn[0-9]*\.cdn-telegram\.org/[^\s"'<>]+"#,
    );
    cdn.find(html).map(|m| m.as_str().to_string())
}

/// Cut `s` to at most `max` characters (an entity counts as one) and append
/// `...` when anything was removed. Entities are never split.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut count = 0;
    let mut end = s.len();
    let mut i = 0;
    while i < s.len() {
        if count == max {
            end = i;
            break;
        }
        let rest = &s[i..];
        let step = match entity_re().find(rest) {
            Some(m) if rest.starts_with('&') => m.end(),
            _ => rest.chars().next().map_or(1, char::len_utf8),
        };
        i += step;
        count += 1;
    }

    if end < s.len() {
        format!("{}...", &s[..end])
    } else {
        s.to_string()
    }
}
