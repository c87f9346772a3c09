use regex::{Captures, Regex};
use std::sync::OnceLock;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"https?://(?:www\.)?[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+(?::[0-9]+)?(?:[/?#][A-Za-z0-9_\-.~:/?#@!$&'()*+,;=%]*)?",
        )
        .expect("url pattern")
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._-]+@[A-Za-z0-9._-]+\.[A-Za-z0-9_-]+").expect("email pattern")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\+?(?:[0-9]{1,3}[-. ]?)?(?:\([0-9]{1,4}\)[-. ]?)?[0-9]{2,5}(?:[-. ]?[0-9]{2,8}){1,3}",
        )
            .expect("phone pattern")
    })
}

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

pub(super) fn urls(input: &str) -> String {
    map_plain_text(input, |text| {
        url_re()
            .replace_all(text, |caps: &Captures<'_>| {
                let (url, rest) = split_url_tail(&caps[0]);
                let mut out = format!(
                    r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#
                );
                out.push_str(rest);
                out
            })
            .into_owned()
    })
}

pub(super) fn emails(input: &str) -> String {
    map_plain_text(input, |text| {
        email_re()
            .replace_all(text, r#"<a href="mailto:${0}">${0}</a>"#)
            .into_owned()
    })
}

pub(super) fn phones(input: &str) -> String {
    map_plain_text(input, link_phones_in)
}

/// Rewrite only text that sits outside tags and outside existing anchors.
///
/// Every `<` that reaches this point was produced by an earlier stage, so a
/// plain `<...>` scan splits markup from text exactly.
fn map_plain_text(input: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_anchor = false;
    let mut last = 0;

    for tag in tag_re().find_iter(input) {
        let text = &input[last..tag.start()];
        if in_anchor {
            out.push_str(text);
        } else {
            out.push_str(&rewrite(text));
        }

        let tag_text = tag.as_str();
        if tag_text.starts_with("<a ") || tag_text == "<a>" {
            in_anchor = true;
        } else if tag_text == "</a>" {
            in_anchor = false;
        }
        out.push_str(tag_text);
        last = tag.end();
    }

    let tail = &input[last..];
    if in_anchor {
        out.push_str(tail);
    } else {
        out.push_str(&rewrite(tail));
    }
    out
}

/// Split a URL candidate into the link itself and trailing text that should
/// stay outside the anchor: escaped angle brackets and sentence punctuation.
///
/// Paren counts are taken once and adjusted as characters are trimmed, so the
/// split stays linear in the candidate length.
fn split_url_tail(candidate: &str) -> (&str, &str) {
    let mut end = ["&lt;", "&gt;"]
        .iter()
        .filter_map(|entity| candidate.find(entity))
        .min()
        .unwrap_or(candidate.len());

    let url = &candidate[..end];
    let opens = url.bytes().filter(|&b| b == b'(').count();
    let mut closes = url.bytes().filter(|&b| b == b')').count();

    loop {
        let url = &candidate[..end];
        let Some(last) = url.chars().last() else {
            break;
        };
        let trailing_punct = matches!(last, '.' | ',' | '!' | '?' | ':' | '\'')
            || (last == ')' && opens < closes)
            || (last == ';' && !ends_with_entity(url));
        if !trailing_punct {
            break;
        }
        if last == ')' {
            closes -= 1;
        }
        end -= last.len_utf8();
    }

    candidate.split_at(end)
}

fn ends_with_entity(text: &str) -> bool {
    ["&amp;", "&lt;", "&gt;"].iter().any(|e| text.ends_with(e))
}

fn link_phones_in(text: &str) -> String {
    let re = phone_re();
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut pos = 0;

    while let Some(found) = re.find_at(text, pos) {
        let (start, end) = (found.start(), found.end());
        let candidate = found.as_str();

        let glued_before = start > 0 && is_word_byte(bytes[start - 1]);
        let glued_after = bytes.get(end).is_some_and(|b| is_word_byte(*b));
        if glued_before || glued_after || !looks_like_phone(candidate) {
            // Candidates start with '+', '(' or a digit, all single byte.
            pos = start + 1;
            continue;
        }

        out.push_str(&text[last..start]);
        out.push_str(&format!(
            r#"<a href="tel:{}">{candidate}</a>"#,
            dial_string(candidate)
        ));
        last = end;
        pos = end;
    }

    out.push_str(&text[last..]);
    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn looks_like_phone(candidate: &str) -> bool {
    let digits = candidate.bytes().filter(u8::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

fn dial_string(candidate: &str) -> String {
    let mut dial = String::with_capacity(candidate.len());
    if candidate.starts_with('+') {
        dial.push('+');
    }
    dial.extend(candidate.chars().filter(char::is_ascii_digit));
    dial
}
