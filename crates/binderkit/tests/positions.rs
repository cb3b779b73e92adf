use binderkit::bus::Observer;
use binderkit::engine::codes;
use binderkit::{
    BinderError, BinderkitConfig, Document, DocumentEngine, MemEngine, PageSource, Positioned,
    Slice,
};
use std::rc::Rc;

fn setup(pages: usize) -> (Rc<MemEngine>, Document) {
    let mem = Rc::new(MemEngine::new());
    mem.add_document("doc.xdw", pages);
    mem.add_document("one.xdw", 1);
    mem.add_document("two.xdw", 2);
    let engine: Rc<dyn DocumentEngine> = mem.clone();
    let doc = Document::open(engine, "doc.xdw", &BinderkitConfig::default()).unwrap();
    (mem, doc)
}

fn texts(doc: &Document) -> Vec<String> {
    doc.pages()
        .iter()
        .map(|page| page.unwrap().content_text().unwrap().unwrap_or_default())
        .collect()
}

#[test]
fn test_same_position_yields_same_proxy() {
    let (_mem, doc) = setup(3);
    let a = doc.page(1).unwrap();
    let b = doc.page(1).unwrap();
    let c = doc.page(-2).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert!(Rc::ptr_eq(&a, &c));
}

#[test]
fn test_insert_and_delete_renumber_held_pages() {
    let (mem, doc) = setup(3);
    let first = doc.page(0).unwrap();
    let second = doc.page(1).unwrap();
    let third = doc.page(2).unwrap();

    let inserted = doc.insert_document(1, "one.xdw").unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].position(), 1);
    assert_eq!(doc.page_count(), 4);
    assert_eq!(first.position(), 0);
    assert_eq!(second.position(), 2);
    assert_eq!(third.position(), 3);
    assert_eq!(mem.page_count("doc.xdw"), Some(4));

    let removed = doc.delete(0).unwrap();
    assert!(Rc::ptr_eq(&removed, &first));
    assert!(!first.is_live());
    assert_eq!(doc.page_count(), 3);
    assert_eq!(second.position(), 1);
    assert_eq!(third.position(), 2);
    assert_eq!(third.content_text().unwrap().as_deref(), Some("page 3"));
}

#[test]
fn test_held_page_follows_deletions_before_it_only() {
    let (_mem, doc) = setup(10);
    let sixth = doc.page(5).unwrap();

    doc.delete(2).unwrap();
    assert_eq!(sixth.position(), 4);

    doc.delete(7).unwrap();
    assert_eq!(sixth.position(), 4);
    assert_eq!(sixth.absolute_page().unwrap(), 4);
    assert_eq!(sixth.content_text().unwrap().as_deref(), Some("page 6"));
    assert_eq!(doc.page_count(), 8);
}

#[test]
fn test_negative_index_on_empty_document_is_out_of_range() {
    let (_mem, doc) = setup(0);
    match doc.page(-1) {
        Err(BinderError::OutOfRange {
            what,
            low,
            high,
            given,
        }) => {
            assert_eq!(what, "Page");
            assert_eq!((low, high, given), (0, 0, -1));
        }
        other => panic!("expected OutOfRange, got {:?}", other.map(|p| p.to_string())),
    }
    assert!(doc.delete(0).is_err());
}

#[test]
fn test_insert_into_empty_document() {
    let (_mem, doc) = setup(0);
    let pages = doc.insert_document(0, "two.xdw").unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(doc.page_count(), 2);
    assert!(Rc::ptr_eq(&pages[1], &doc.page(-1).unwrap()));
}

#[test]
fn test_insert_at_negative_position_goes_before_that_page() {
    let (_mem, doc) = setup(3);
    let last = doc.page(-1).unwrap();
    doc.insert_document(-1, "one.xdw").unwrap();
    assert_eq!(last.position(), 3);
    assert_eq!(texts(&doc), vec!["page 1", "page 2", "page 1", "page 3"]);
}

#[test]
fn test_deleted_page_is_stale() {
    let (_mem, doc) = setup(3);
    let doomed = doc.page(1).unwrap();
    doc.delete(1).unwrap();

    assert!(matches!(
        doomed.content_text(),
        Err(BinderError::StaleReference(_))
    ));
    assert!(matches!(
        doomed.absolute_page(),
        Err(BinderError::StaleReference(_))
    ));
    assert!(matches!(
        doomed.get_attribute("memo"),
        Err(BinderError::StaleReference(_))
    ));
}

#[test]
fn test_slices_resolve_like_ranges() {
    let (_mem, doc) = setup(6);
    let middle = doc.pages().slice(Slice::from(1..4)).unwrap();
    let positions: Vec<usize> = middle.iter().map(|p| p.position()).collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let backwards = doc.pages().slice(Slice::full().step_by(-2)).unwrap();
    let positions: Vec<usize> = backwards.iter().map(|p| p.position()).collect();
    assert_eq!(positions, vec![5, 3, 1]);

    let clamped = doc.pages().slice(Slice::from(4..100)).unwrap();
    assert_eq!(clamped.len(), 2);

    assert!(matches!(
        doc.pages().slice(Slice::new(Some(1), None, Some(0))),
        Err(BinderError::InvalidStep)
    ));
    assert!(doc
        .pages()
        .slice(Slice::new(Some(2), Some(2), Some(0)))
        .unwrap()
        .is_empty());
}

#[test]
fn test_delete_slice_removes_every_selected_page() {
    let (_mem, doc) = setup(6);
    let keep = doc.page(3).unwrap();
    let removed = doc
        .pages()
        .delete_slice(Slice::from(0..6).step_by(2))
        .unwrap();
    assert_eq!(removed.len(), 3);
    assert!(removed.iter().all(|p| !p.is_live()));
    assert_eq!(keep.position(), 1);
    assert_eq!(texts(&doc), vec!["page 2", "page 4", "page 6"]);
}

#[test]
fn test_failed_delete_changes_nothing() {
    let (mem, doc) = setup(3);
    let first = doc.page(0).unwrap();
    let last = doc.page(2).unwrap();
    mem.fail_on("delete_page", codes::ACCESSDENIED);

    let err = doc.delete(0).unwrap_err();
    assert_eq!(err.engine_code(), Some(codes::ACCESSDENIED));
    assert_eq!(doc.page_count(), 3);
    assert!(first.is_live());
    assert_eq!(last.position(), 2);

    mem.clear_failures();
    doc.delete(0).unwrap();
    assert_eq!(last.position(), 1);
}

#[test]
fn test_partial_insert_commits_what_the_engine_did() {
    let (mem, doc) = setup(3);
    let tail = doc.page(2).unwrap();
    mem.fail_partway_insert(1);

    let err = doc.insert_document(1, "two.xdw").unwrap_err();
    assert_eq!(err.engine_code(), Some(codes::WRITE_FAULT));
    assert_eq!(doc.page_count(), 4);
    assert_eq!(mem.page_count("doc.xdw"), Some(4));
    assert_eq!(tail.position(), 3);
    assert_eq!(tail.content_text().unwrap().as_deref(), Some("page 3"));
}

#[test]
fn test_image_pages_take_requested_size() {
    let (_mem, doc) = setup(1);
    let options = binderkit::ImageOptions::default()
        .with_size(binderkit::Size::new(100.0, 150.0))
        .with_compress("LOSSLESS");
    let page = doc.insert_image(0, "scan.png", options).unwrap();
    assert_eq!(page.size(), binderkit::Size::new(100.0, 150.0));
    assert_eq!(page.type_name(), "IMAGE");
    assert_eq!(page.color_scheme(), "COLOR");
    assert_eq!(doc.page(1).unwrap().content_text().unwrap().as_deref(), Some("page 1"));
}

#[test]
fn test_iteration_sees_current_pages() {
    let (_mem, doc) = setup(2);
    assert_eq!(doc.pages().iter().count(), 2);
    doc.append(PageSource::File("two.xdw".into())).unwrap();
    assert_eq!(doc.pages().iter().count(), 4);
}
