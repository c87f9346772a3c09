pub mod chunk;

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::locations::query_terms;

/// File extensions the knowledge base reads.
pub const DOCUMENT_EXTENSIONS: [&str; 3] = ["csv", "md", "txt"];

/// Score multiplier for chunks carrying an email or phone number when the
/// question asks for contact details.
const CONTACT_BOOST: f32 = 1.3;
const CONTACT_WORDS: [&str; 8] = [
    "email", "contact", "phone", "mobile", "number", "call", "reach", "ph",
];

fn contact_email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
    })
}

fn contact_phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+?[0-9]{1,3}[-.\s]?)?(?:\([0-9]{2,4}\)|[0-9]{2,4})[-.\s]?[0-9]{5,12}")
            .expect("phone pattern")
    })
}

/// One retrievable passage of a knowledge-base document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source: String,
    pub page: usize,
    pub text: String,
    pub has_contact: bool,
}

impl Chunk {
    pub fn new(source: impl Into<String>, page: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let has_contact = contact_email_re().is_match(&text) || contact_phone_re().is_match(&text);
        Self {
            source: source.into(),
            page,
            text,
            has_contact,
        }
    }
}

/// Knowledge-base passages loaded from a directory of text documents.
///
/// Plain text and markdown files are one page each; every CSV row is its own
/// page rendered as `column: value | column: value`. Pages are split with
/// [`chunk::chunk_text`].
pub struct DocumentStore {
    dir: PathBuf,
    chunks: Vec<Chunk>,
    files: usize,
    loaded_at: Option<DateTime<Utc>>,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            chunks: Vec::new(),
            files: 0,
            loaded_at: None,
        }
    }

    pub fn load_dir(dir: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(dir);
        store.reload();
        store
    }

    /// Re-read every document. Returns the number of chunks built.
    pub fn reload(&mut self) -> usize {
        self.chunks.clear();
        self.files = 0;
        self.loaded_at = Some(Utc::now());

        if !self.dir.exists() {
            warn!(dir = %self.dir.display(), "documents directory does not exist");
            return 0;
        }

        let files = match document_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.dir.display(), "failed to list documents: {e}");
                return 0;
            }
        };

        for path in files {
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let before = self.chunks.len();
            for (page, text) in extract_pages(&path) {
                if text.trim().chars().count() < 30 {
                    continue;
                }
                for piece in chunk::chunk_text(&text) {
                    self.chunks.push(Chunk::new(source.clone(), page, piece));
                }
            }
            self.files += 1;
            debug!(file = %source, chunks = self.chunks.len() - before, "indexed document");
        }

        info!(
            dir = %self.dir.display(),
            files = self.files,
            chunks = self.chunks.len(),
            "loaded documents from disk"
        );
        self.chunks.len()
    }

    /// Drop every chunk and delete all files in the directory. Returns how
    /// many files were removed.
    pub fn reset(&mut self) -> anyhow::Result<usize> {
        self.chunks.clear();
        self.files = 0;
        self.loaded_at = Some(Utc::now());

        if !self.dir.exists() {
            return Ok(0);
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", self.dir.display()))?;
        let mut removed = 0;
        for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
            if !path.is_file() {
                continue;
            }
            std::fs::remove_file(&path)
                .map_err(|e| anyhow::anyhow!("failed to remove {}: {e}", path.display()))?;
            removed += 1;
        }
        info!(dir = %self.dir.display(), removed, "documents reset");
        Ok(removed)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of documents read by the last reload.
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Chunks ranked by matching query terms, with contact-bearing chunks
    /// boosted for contact questions. Chunks matching no term are left out;
    /// ties keep load order.
    pub fn relevant(&self, query: &str, top_k: usize) -> Vec<&Chunk> {
        let terms = query_terms(query);
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let lowered = query.to_lowercase();
        let contact_query = CONTACT_WORDS
            .iter()
            .any(|word| lowered.split(|c: char| !c.is_alphanumeric()).any(|w| w == *word));

        let mut scored: Vec<(f32, &Chunk)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let haystack = chunk.text.to_lowercase();
                let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if hits == 0 {
                    return None;
                }
                let mut score = hits as f32;
                if contact_query && chunk.has_contact {
                    score *= CONTACT_BOOST;
                }
                Some((score, chunk))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(top_k).map(|(_, c)| c).collect()
    }
}

/// Whether a file name has one of the [`DOCUMENT_EXTENSIONS`].
pub fn is_document_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|wanted| ext.eq_ignore_ascii_case(wanted))
        })
}

fn document_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", dir.display()))?;

    let mut files = Vec::new();
    for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
        if !path.is_file() {
            continue;
        }
        if is_document_file(&path) {
            files.push(path);
        } else {
            warn!(path = %path.display(), "unsupported document type");
        }
    }
    files.sort();
    Ok(files)
}

/// `(page, text)` pairs for one document. Unreadable files yield nothing.
fn extract_pages(path: &Path) -> Vec<(usize, String)> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        return csv_pages(path);
    }

    match std::fs::read(path) {
        Ok(bytes) => vec![(1, String::from_utf8_lossy(&bytes).into_owned())],
        Err(e) => {
            warn!(path = %path.display(), "failed to read document: {e}");
            Vec::new()
        }
    }
}

fn csv_pages(path: &Path) -> Vec<(usize, String)> {
    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(r) => r,
        Err(e) => {
            warn!(path = %path.display(), "failed to read document: {e}");
            return Vec::new();
        }
    };
    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            warn!(path = %path.display(), "failed to read CSV header: {e}");
            return Vec::new();
        }
    };

    let mut pages = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), index, "skipping unreadable CSV row: {e}");
                continue;
            }
        };
        let text = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(column, value)| format!("{column}: {}", value.trim()))
            .collect::<Vec<_>>()
            .join(" | ");
        if !text.is_empty() {
            pages.push((index + 1, text));
        }
    }
    pages
}
