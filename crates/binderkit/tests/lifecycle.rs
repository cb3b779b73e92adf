use binderkit::registry;
use binderkit::{
    open, BinderError, BinderkitConfig, Document, DocumentEngine, MemEngine, Opened,
};
use std::rc::Rc;

fn engine() -> (Rc<MemEngine>, Rc<dyn DocumentEngine>) {
    let mem = Rc::new(MemEngine::new());
    mem.add_document("letter.xdw", 2);
    mem.add_binder("archive.xbd", &[("a", 1), ("b", 1)]);
    let engine: Rc<dyn DocumentEngine> = mem.clone();
    (mem, engine)
}

#[test]
fn test_open_dispatches_on_extension() {
    let (_mem, engine) = engine();
    let config = BinderkitConfig::default();

    let opened = open(engine.clone(), "letter.xdw", &config).unwrap();
    assert!(matches!(opened, Opened::Document(_)));
    assert_eq!(opened.name(), "letter");

    // Upper-case extensions still select the binder; the engine has no such path.
    let err = open(engine.clone(), "archive.XBD", &config).err().unwrap();
    assert_eq!(
        err.engine_code(),
        Some(binderkit::engine::codes::FILE_NOT_FOUND)
    );

    let opened = open(engine.clone(), "archive.xbd", &config).unwrap();
    match &opened {
        Opened::Binder(binder) => assert_eq!(binder.document_count(), 2),
        Opened::Document(_) => panic!("expected a binder"),
    }

    assert!(matches!(
        open(engine, "notes.pdf", &config),
        Err(BinderError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_close_is_idempotent_and_stales_proxies() {
    let (mem, engine) = engine();
    let doc = Document::open(engine, "letter.xdw", &BinderkitConfig::default()).unwrap();
    let page = doc.page(0).unwrap();
    assert_eq!(mem.open_handle_count(), 1);
    assert_eq!(registry::open_handle_count(), 1);

    doc.close().unwrap();
    doc.close().unwrap();
    assert!(!doc.is_open());
    assert_eq!(mem.open_handle_count(), 0);
    assert_eq!(registry::open_handle_count(), 0);
    assert!(matches!(
        page.content_text(),
        Err(BinderError::StaleReference(_))
    ));

    drop(doc);
    assert_eq!(mem.open_handle_count(), 0);
}

#[test]
fn test_dropping_the_container_closes_the_handle() {
    let (mem, engine) = engine();
    let doc = Document::open(engine, "letter.xdw", &BinderkitConfig::default()).unwrap();
    let page = doc.page(1).unwrap();
    drop(doc);

    assert_eq!(mem.open_handle_count(), 0);
    assert!(matches!(
        page.content_text(),
        Err(BinderError::StaleReference(_))
    ));
}

#[test]
fn test_exit_sweep_closes_what_callers_left_open() {
    let (mem, engine) = engine();
    let config = BinderkitConfig::default();
    let doc = Document::open(engine.clone(), "letter.xdw", &config).unwrap();
    let binder = open(engine, "archive.xbd", &config).unwrap();
    assert_eq!(mem.open_handle_count(), 2);

    assert_eq!(registry::close_all(), 2);
    assert_eq!(mem.open_handle_count(), 0);

    // The sweep already closed both; closing again must not reach the engine.
    doc.close().unwrap();
    binder.close().unwrap();
}

#[test]
fn test_missing_file_fails_to_open() {
    let (_mem, engine) = engine();
    let err = Document::open(engine, "missing.xdw", &BinderkitConfig::default())
        .err()
        .unwrap();
    assert_eq!(
        err.engine_code(),
        Some(binderkit::engine::codes::FILE_NOT_FOUND)
    );
    assert_eq!(registry::open_handle_count(), 0);
}

#[test]
fn test_read_only_containers_reject_edits() {
    let (mem, engine) = engine();
    let config = BinderkitConfig {
        read_only: true,
        ..Default::default()
    };
    let doc = Document::open(engine, "letter.xdw", &config).unwrap();
    let err = doc.delete(0).unwrap_err();
    assert_eq!(
        err.engine_code(),
        Some(binderkit::engine::codes::ACCESSDENIED)
    );
    assert_eq!(doc.page_count(), 2);
    assert_eq!(mem.page_count("letter.xdw"), Some(2));
}
