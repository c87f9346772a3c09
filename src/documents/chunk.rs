use regex::Regex;
use std::sync::OnceLock;

/// Pages shorter than this produce no chunks.
pub const MIN_CHUNK_CHARS: usize = 60;
/// Sentence packing stops before a chunk grows past this.
pub const MAX_CHUNK_CHARS: usize = 1200;
/// Pieces this short are noise (page numbers, stray headings).
const MIN_PIECE_CHARS: usize = 30;

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("paragraph break pattern"))
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[•*\-)0-9.]+\s+").expect("bullet pattern"))
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence end pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split one page of text into retrieval chunks with collapsed whitespace.
///
/// Bulleted text keeps each run of bullets together; otherwise blank-line
/// paragraphs are used, and a single block falls back to packing sentences up
/// to [`MAX_CHUNK_CHARS`].
pub fn chunk_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if char_len(text) < MIN_CHUNK_CHARS {
        return Vec::new();
    }

    let pieces = if text.lines().any(|line| bullet_re().is_match(line)) {
        split_bulleted(text)
    } else {
        let paragraphs = split_paragraphs(text);
        if paragraphs.len() > 1 {
            paragraphs
                .into_iter()
                .flat_map(|p| {
                    if char_len(&p) > MAX_CHUNK_CHARS {
                        pack_sentences(&p)
                    } else {
                        vec![p]
                    }
                })
                .collect()
        } else {
            pack_sentences(text)
        }
    };

    pieces.iter().map(|p| normalize_whitespace(p)).collect()
}

fn normalize_whitespace(text: &str) -> String {
    whitespace_re().replace_all(text, " ").trim().to_string()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    paragraph_break_re()
        .split(text)
        .map(str::trim)
        .filter(|p| char_len(p) > MIN_PIECE_CHARS)
        .map(String::from)
        .collect()
}

fn split_bulleted(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut run: Vec<String> = Vec::new();

    for line in text.lines() {
        if bullet_re().is_match(line) {
            run.push(bullet_re().replace(line, "").trim().to_string());
            continue;
        }
        if !run.is_empty() {
            out.push(run.join(" "));
            run.clear();
        }
        out.push(line.to_string());
    }
    if !run.is_empty() {
        out.push(run.join(" "));
    }

    out.into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| char_len(p) > MIN_PIECE_CHARS)
        .collect()
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut last = 0;
    for end in sentence_end_re().find_iter(text) {
        // Keep the terminator, drop the whitespace after it.
        out.push(&text[last..end.start() + 1]);
        last = end.end();
    }
    out.push(&text[last..]);
    out.into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn pack_sentences(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        if char_len(&current) + char_len(sentence) + 1 <= MAX_CHUNK_CHARS {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        } else {
            if char_len(&current) >= MIN_CHUNK_CHARS {
                chunks.push(std::mem::take(&mut current));
            }
            current = sentence.to_string();
        }
    }
    if char_len(&current) >= MIN_CHUNK_CHARS {
        chunks.push(current);
    }

    if chunks.is_empty() {
        let head: String = text.trim().chars().take(MAX_CHUNK_CHARS).collect();
        chunks.push(head);
    }
    chunks
}
