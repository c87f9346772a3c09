use regex::{Captures, Regex};
use std::sync::OnceLock;

// Leading whitespace is `[^\S\n]` rather than `\s` so a match can never reach
// back across a blank line and swallow a paragraph break.
fn bullet_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mR)^[^\S\r\n]*[•*‣-][^\S\r\n]+(.*)$").expect("bullet item pattern")
    })
}

fn numbered_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mR)^[^\S\r\n]*[0-9]+\.[^\S\r\n]+(.*)$").expect("numbered item pattern")
    })
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<li>.*?</li>").expect("item pattern"))
}

// Items may be separated by whitespace holding at most one newline; a blank
// line ends the run so the paragraph split never cuts through a `<ul>`.
fn item_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<li>.*?</li>(?:[^\S\n]*\n?[^\S\n]*<li>.*?</li>)*").expect("item run pattern")
    })
}

fn blank_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("blank line pattern"))
}

pub(super) fn list_items(input: &str) -> String {
    let bulleted = bullet_item_re().replace_all(input, "<li>${1}</li>");
    numbered_item_re()
        .replace_all(&bulleted, "<li>${1}</li>")
        .into_owned()
}

/// Ordered and unordered items share one `<ul>`; ordinals are already gone.
pub(super) fn wrap_lists(input: &str) -> String {
    item_run_re()
        .replace_all(input, |caps: &Captures<'_>| {
            let mut list = String::from("<ul>");
            for item in item_re().find_iter(&caps[0]) {
                list.push_str(item.as_str());
            }
            list.push_str("</ul>");
            list
        })
        .into_owned()
}

pub(super) fn paragraphs(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);

    for chunk in blank_line_re().split(input) {
        let chunk = chunk.trim_matches(|c| c == '\n' || c == '\r');
        if chunk.trim().is_empty() {
            continue;
        }

        let body = chunk.replace("\r\n", "<br>").replace('\n', "<br>");
        if body.contains("<ul>") {
            out.push_str(&body);
        } else {
            out.push_str("<p>");
            out.push_str(&body);
            out.push_str("</p>");
        }
    }

    out
}
