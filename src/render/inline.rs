use regex::Regex;
use std::sync::OnceLock;

// Spans stop at a newline so a generated tag never straddles a `<br>` or a
// paragraph boundary inserted later.
fn strong_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("strong pattern"))
}

// Content may not start with whitespace, so `* item *x*` keeps its bullet.
fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*\s][^*\n]*?)\*").expect("emphasis pattern"))
}

pub(super) fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(super) fn strong(input: &str) -> String {
    strong_re()
        .replace_all(input, "<strong>${1}</strong>")
        .into_owned()
}

/// `regex` has no look-around, so the "not next to another asterisk" guard is
/// checked by hand and a rejected candidate resumes one byte later.
pub(super) fn emphasis(input: &str) -> String {
    let re = emphasis_re();
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let mut pos = 0;

    while let Some(caps) = re.captures_at(input, pos) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let (start, end) = (whole.start(), whole.end());

        let touches_before = start > 0 && bytes[start - 1] == b'*';
        let touches_after = bytes.get(end) == Some(&b'*');
        if touches_before || touches_after {
            // The match starts on an ASCII '*', so start + 1 is a char boundary.
            pos = start + 1;
            continue;
        }

        out.push_str(&input[last..start]);
        out.push_str("<em>");
        out.push_str(body.as_str());
        out.push_str("</em>");
        last = end;
        pos = end;
    }

    out.push_str(&input[last..]);
    out
}
