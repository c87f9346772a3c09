use std::path::{Path, PathBuf};
use wayfinder::documents::chunk::{MAX_CHUNK_CHARS, chunk_text};
use wayfinder::documents::{Chunk, DocumentStore, is_document_file};

fn tmp_dir(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("wayfinder-documents-{label}-{nanos}"));
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

#[test]
fn short_text_yields_no_chunks() {
    assert!(chunk_text("Page 3").is_empty());
    assert!(chunk_text("   ").is_empty());
}

#[test]
fn paragraphs_become_chunks() {
    let text = "The library opens at nine in the morning on weekdays.\n\n\
                The canteen serves lunch from noon until three every day.\n\n\
                p. 4";
    assert_eq!(
        chunk_text(text),
        vec![
            "The library opens at nine in the morning on weekdays.",
            "The canteen serves lunch from noon until three every day.",
        ]
    );
}

#[test]
fn bullet_runs_stay_together() {
    let text = "Facilities available to students:\n\
                - Reading rooms on the first floor\n\
                - Computer lab with sixty seats\n\
                Contact the office for access cards and timings.";
    let chunks = chunk_text(text);
    assert_eq!(
        chunks,
        vec![
            "Facilities available to students:",
            "Reading rooms on the first floor Computer lab with sixty seats",
            "Contact the office for access cards and timings.",
        ]
    );
}

#[test]
fn long_blocks_are_packed_by_sentence() {
    let sentence = "The exam hall is next to the administration block and seats two hundred. ";
    let text = sentence.repeat(40);
    let chunks = chunk_text(&text);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
        assert!(chunk.ends_with('.'));
    }
}

#[test]
fn whitespace_is_collapsed() {
    let chunks = chunk_text("The   sports\tcomplex has a   swimming pool and\ttwo indoor courts.");
    assert_eq!(
        chunks,
        vec!["The sports complex has a swimming pool and two indoor courts."]
    );
}

#[test]
fn chunks_detect_contact_details() {
    assert!(Chunk::new("a.txt", 1, "Write to admissions@campus.edu for forms").has_contact);
    assert!(Chunk::new("a.txt", 1, "Front desk: +91 194 2451234").has_contact);
    assert!(!Chunk::new("a.txt", 1, "Open from 9 to 5 on weekdays").has_contact);
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[test]
fn missing_directory_loads_empty() {
    let store = DocumentStore::load_dir("/nonexistent/wayfinder/docs");
    assert!(store.is_empty());
    assert_eq!(store.file_count(), 0);
    assert!(store.loaded_at().is_some());
}

#[test]
fn loads_text_markdown_and_csv() {
    let dir = tmp_dir("load");
    std::fs::write(
        dir.join("hours.txt"),
        "The main library is open from nine until eight on weekdays and Saturdays.",
    )
    .unwrap();
    std::fs::write(
        dir.join("guide.md"),
        "# Guide\n\nThe hostel office handles room allotment for new students.",
    )
    .unwrap();
    std::fs::write(
        dir.join("staff.csv"),
        "name,role,email\n\
         Asha Mir,Librarian in charge of the reading rooms,asha@campus.edu\n\
         ,,\n",
    )
    .unwrap();
    std::fs::write(dir.join("scan.pdf"), "binary").unwrap();

    let store = DocumentStore::load_dir(&dir);
    assert_eq!(store.file_count(), 3);

    let staff: Vec<&Chunk> = store.chunks().iter().filter(|c| c.source == "staff.csv").collect();
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0].page, 1);
    assert_eq!(
        staff[0].text,
        "name: Asha Mir | role: Librarian in charge of the reading rooms | email: asha@campus.edu"
    );
    assert!(staff[0].has_contact);
    assert!(store.chunks().iter().all(|c| c.source != "scan.pdf"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn relevant_boosts_contact_chunks_for_contact_questions() {
    let dir = tmp_dir("relevant");
    std::fs::write(
        dir.join("a.txt"),
        "The library front desk handles library cards and library fines for students.",
    )
    .unwrap();
    std::fs::write(
        dir.join("b.txt"),
        "For the library office, email library@campus.edu during working hours.",
    )
    .unwrap();

    let store = DocumentStore::load_dir(&dir);
    assert_eq!(store.len(), 2);

    let plain = store.relevant("library cards", 5);
    assert_eq!(plain[0].source, "a.txt");

    let contact = store.relevant("library email", 5);
    assert_eq!(contact[0].source, "b.txt");

    assert_eq!(store.relevant("library", 1).len(), 1);
    assert!(store.relevant("gymnasium", 5).is_empty());
    assert!(store.relevant("of", 5).is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reset_removes_every_file() {
    let dir = tmp_dir("reset");
    std::fs::write(
        dir.join("a.txt"),
        "The exam schedule is posted on the notice board outside the hall.",
    )
    .unwrap();
    std::fs::write(dir.join("b.pdf"), "unsupported").unwrap();

    let mut store = DocumentStore::load_dir(&dir);
    assert_eq!(store.len(), 1);
    assert_eq!(store.reset().expect("reset"), 2);
    assert!(store.is_empty());
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    assert_eq!(store.reload(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn document_files_are_text_markdown_or_csv() {
    assert!(is_document_file(Path::new("a.txt")));
    assert!(is_document_file(Path::new("README.MD")));
    assert!(is_document_file(Path::new("staff.csv")));
    assert!(!is_document_file(Path::new("scan.pdf")));
    assert!(!is_document_file(Path::new("txt")));
}
