use serde_json::json;
use std::path::PathBuf;
use std::path::Path;
use wayfinder::locations::{LocationError, LocationStore, is_catalogue_file, parse_record};
use wayfinder::types::Location;

fn tmp_dir(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("wayfinder-locations-{label}-{nanos}"));
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}

fn location(name: &str, details: &str) -> Location {
    Location {
        name: name.into(),
        details: details.into(),
        lat: 34.07,
        lon: 74.81,
    }
}

// ---------------------------------------------------------------------------
// Record parsing
// ---------------------------------------------------------------------------

#[test]
fn parses_numeric_and_string_coordinates() {
    let loc = parse_record(&json!({
        "name": "  Main Library ",
        "details": " Open 9-5 ",
        "lat": "34.0718",
        "lon": 74.8096
    }))
    .expect("valid record");
    assert_eq!(loc.name, "Main Library");
    assert_eq!(loc.details, "Open 9-5");
    assert!((loc.lat - 34.0718).abs() < 1e-9);
    assert!((loc.lon - 74.8096).abs() < 1e-9);
}

#[test]
fn details_default_to_empty() {
    let loc = parse_record(&json!({"name": "Gate", "lat": 1.0, "lon": 2.0})).unwrap();
    assert_eq!(loc.details, "");
}

#[test]
fn rejects_invalid_records() {
    assert_eq!(parse_record(&json!([1, 2])), Err(LocationError::NotAnObject));
    assert_eq!(
        parse_record(&json!({"lat": 1.0, "lon": 2.0})),
        Err(LocationError::MissingField("name"))
    );
    assert_eq!(
        parse_record(&json!({"name": "   ", "lat": 1.0, "lon": 2.0})),
        Err(LocationError::EmptyName)
    );
    assert_eq!(
        parse_record(&json!({"name": "x", "lon": 2.0})),
        Err(LocationError::MissingField("lat"))
    );
    assert!(matches!(
        parse_record(&json!({"name": "x", "lat": "north", "lon": 2.0})),
        Err(LocationError::InvalidCoordinate { field: "lat", .. })
    ));
    assert!(matches!(
        parse_record(&json!({"name": "x", "lat": 1.0, "lon": true})),
        Err(LocationError::InvalidCoordinate { field: "lon", .. })
    ));
}

#[test]
fn error_messages_name_the_field() {
    let err = parse_record(&json!({"name": "x", "lat": "nope", "lon": 1})).unwrap_err();
    assert!(err.to_string().contains("'lat'"));
}

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

#[test]
fn missing_directory_loads_empty() {
    let dir = std::env::temp_dir().join("wayfinder-locations-does-not-exist");
    let store = LocationStore::load_dir(&dir);
    assert!(store.is_empty());
    assert!(store.loaded_at().is_some());
}

#[test]
fn loads_files_in_name_order_and_dedupes_case_insensitively() {
    let dir = tmp_dir("dedupe");
    std::fs::write(
        dir.join("b.json"),
        r#"[{"name": "LIBRARY", "details": "second", "lat": 1, "lon": 1},
            {"name": "Canteen", "lat": 3, "lon": 3}]"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("a.json"),
        r#"[{"name": "Library", "details": "first", "lat": 2, "lon": 2}]"#,
    )
    .unwrap();

    let store = LocationStore::load_dir(&dir);
    let names: Vec<&str> = store.all().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Library", "Canteen"]);
    assert_eq!(store.all()[0].details, "first");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn skips_bad_files_and_bad_records() {
    let dir = tmp_dir("skips");
    std::fs::write(dir.join("broken.json"), "not json {").unwrap();
    std::fs::write(dir.join("object.json"), r#"{"name": "x"}"#).unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
    std::fs::write(
        dir.join("good.json"),
        r#"[{"name": "Gate", "lat": 1, "lon": 2},
            {"name": "No coords"},
            {"name": "Hall", "lat": "3.5", "lon": "4.5"}]"#,
    )
    .unwrap();

    let store = LocationStore::load_dir(&dir);
    assert_eq!(store.len(), 2);
    assert_eq!(store.all()[1].name, "Hall");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reload_picks_up_new_files() {
    let dir = tmp_dir("reload");
    let mut store = LocationStore::load_dir(&dir);
    assert!(store.is_empty());

    std::fs::write(dir.join("new.json"), r#"[{"name": "Gym", "lat": 1, "lon": 1}]"#).unwrap();
    assert_eq!(store.reload(), 1);
    assert_eq!(store.all()[0].name, "Gym");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reset_clears_store_and_removes_json_files() {
    let dir = tmp_dir("reset");
    std::fs::write(dir.join("a.json"), r#"[{"name": "A", "lat": 1, "lon": 1}]"#).unwrap();
    std::fs::write(dir.join("keep.txt"), "not a catalogue").unwrap();

    let mut store = LocationStore::load_dir(&dir);
    assert_eq!(store.len(), 1);

    let removed = store.reset().expect("reset");
    assert_eq!(removed, 1);
    assert!(store.is_empty());
    assert!(!dir.join("a.json").exists());
    assert!(dir.join("keep.txt").exists());
    assert_eq!(store.reload(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn loads_csv_catalogues_and_skips_invalid_rows() {
    let dir = tmp_dir("csv");
    std::fs::write(
        dir.join("campus.csv"),
        "name, details, lat, lon\n\
         Main Gate,Entrance on the east side,34.07,74.81\n\
         ,No name,1,1\n\
         Hostel,Missing longitude,34.05,\n\
         \"Hall, North\",Exam hall,34.08,74.82\n",
    )
    .unwrap();

    let store = LocationStore::load_dir(&dir);
    let names: Vec<&str> = store.all().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Main Gate", "Hall, North"]);
    assert_eq!(store.all()[0].details, "Entrance on the east side");
    assert_eq!(store.all()[1].lat, 34.08);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn csv_and_json_share_one_name_index() {
    let dir = tmp_dir("csv-json");
    std::fs::write(
        dir.join("a.csv"),
        "name,details,lat,lon\nLibrary,from csv,1,1\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("b.json"),
        r#"[{"name": "library", "details": "from json", "lat": 2, "lon": 2},
            {"name": "Canteen", "lat": 3, "lon": 3}]"#,
    )
    .unwrap();

    let store = LocationStore::load_dir(&dir);
    assert_eq!(store.len(), 2);
    assert_eq!(store.all()[0].details, "from csv");
    assert_eq!(store.all()[1].name, "Canteen");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reset_removes_csv_catalogues_too() {
    let dir = tmp_dir("reset-csv");
    std::fs::write(dir.join("a.csv"), "name,lat,lon\nA,1,1\n").unwrap();
    std::fs::write(dir.join("b.json"), r#"[{"name": "B", "lat": 1, "lon": 1}]"#).unwrap();

    let mut store = LocationStore::load_dir(&dir);
    assert_eq!(store.len(), 2);
    assert_eq!(store.reset().expect("reset"), 2);
    assert!(!dir.join("a.csv").exists());
    assert!(!dir.join("b.json").exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn catalogue_files_are_json_or_csv() {
    assert!(is_catalogue_file(Path::new("campus.json")));
    assert!(is_catalogue_file(Path::new("CAMPUS.CSV")));
    assert!(!is_catalogue_file(Path::new("notes.txt")));
    assert!(!is_catalogue_file(Path::new("json")));
}

// ---------------------------------------------------------------------------
// Insertion and relevance
// ---------------------------------------------------------------------------

#[test]
fn insert_rejects_duplicate_names() {
    let mut store = LocationStore::new("unused");
    assert!(store.insert(location("Library", "")));
    assert!(!store.insert(location("library", "other")));
    assert_eq!(store.len(), 1);
}

#[test]
fn relevant_ranks_by_matching_terms() {
    let mut store = LocationStore::new("unused");
    store.insert(location("Main Library", "Books and reading rooms"));
    store.insert(location("Physics Lab", "Optics and reading of instruments"));
    store.insert(location("Canteen", "Food and tea"));

    let hits = store.relevant("Where is the library reading room?", 5);
    let names: Vec<&str> = hits.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Main Library", "Physics Lab"]);
}

#[test]
fn relevant_ignores_short_terms_and_respects_top_k() {
    let mut store = LocationStore::new("unused");
    store.insert(location("Block A", "Lecture halls"));
    store.insert(location("Block B", "Lecture halls"));

    assert!(store.relevant("is a", 5).is_empty());
    assert_eq!(store.relevant("lecture", 1).len(), 1);
    assert_eq!(store.relevant("lecture", 1)[0].name, "Block A");
    assert!(store.relevant("lecture", 0).is_empty());
}
