use binderkit::bus::Observer;
use binderkit::engine::codes;
use binderkit::{BinderkitConfig, Document, DocumentEngine, MemEngine, Positioned};
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

fn setup() -> (TempDir, Document) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("minutes.txt"), "agreed").unwrap();
    fs::write(dir.path().join("budget.csv"), "a,b\n1,2\n").unwrap();

    let mem = Rc::new(MemEngine::new());
    mem.add_document("memo.xdw", 1);
    let engine: Rc<dyn DocumentEngine> = mem;
    let doc = Document::open(engine, "memo.xdw", &BinderkitConfig::default()).unwrap();
    (dir, doc)
}

#[test]
fn test_attachment_round_trip() {
    let (dir, doc) = setup();
    let attachments = doc.attachments();
    assert!(attachments.is_empty());

    let minutes = attachments.append(dir.path().join("minutes.txt")).unwrap();
    assert_eq!(minutes.name(), "minutes.txt");
    assert_eq!(minutes.size(), 6);
    assert_eq!(minutes.text_type(), "UNICODE");
    assert_eq!(
        minutes.timestamp().unwrap().offset().local_minus_utc(),
        9 * 3600
    );

    let out = dir.path().join("out.txt");
    minutes.save(&out).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), "agreed");

    let err = minutes.save(&out).unwrap_err();
    assert_eq!(err.engine_code(), Some(codes::FILE_EXISTS));
}

#[test]
fn test_attachments_renumber_like_pages() {
    let (dir, doc) = setup();
    let attachments = doc.attachments();
    let minutes = attachments.append(dir.path().join("minutes.txt")).unwrap();
    let budget = attachments.insert(0, dir.path().join("budget.csv")).unwrap();

    assert_eq!(attachments.len(), 2);
    assert_eq!(budget.position(), 0);
    assert_eq!(minutes.position(), 1);

    attachments.delete(0).unwrap();
    assert!(!budget.is_live());
    assert_eq!(minutes.position(), 0);
    assert!(budget.save(dir.path().join("gone.csv")).is_err());
    assert_eq!(attachments.get(-1).unwrap().name(), "minutes.txt");
}

#[test]
fn test_missing_source_file_leaves_list_unchanged() {
    let (dir, doc) = setup();
    let attachments = doc.attachments();
    assert!(attachments.append(dir.path().join("nope.bin")).is_err());
    assert!(attachments.is_empty());
}
