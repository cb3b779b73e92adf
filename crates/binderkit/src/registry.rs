//! Open-handle registry for exit-time cleanup.
//!
//! Every handle opened through this crate is recorded here until it is closed.
//! The registry starts empty; [`close_all`] drains it and closes whatever is
//! still open, logging and skipping individual failures. Explicit closes
//! remove their entry first, so a handle is never closed twice.
//!
//! Engines are not `Send`, so the registry is per thread; in practice that is
//! the one thread driving the engine.

use log::{info, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::engine::{DocumentEngine, EngineHandle};

struct OpenHandle {
    engine: Weak<dyn DocumentEngine>,
    handle: EngineHandle,
}

impl OpenHandle {
    fn is(&self, engine: &Rc<dyn DocumentEngine>, handle: EngineHandle) -> bool {
        self.handle == handle && std::ptr::addr_eq(self.engine.as_ptr(), Rc::as_ptr(engine))
    }
}

thread_local! {
    static OPEN_HANDLES: RefCell<Vec<OpenHandle>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn register(engine: &Rc<dyn DocumentEngine>, handle: EngineHandle) {
    OPEN_HANDLES.with(|handles| {
        handles.borrow_mut().push(OpenHandle {
            engine: Rc::downgrade(engine),
            handle,
        })
    });
}

/// Removes a handle, returning whether it was still registered.
pub(crate) fn release(engine: &Rc<dyn DocumentEngine>, handle: EngineHandle) -> bool {
    OPEN_HANDLES.with(|handles| {
        let mut handles = handles.borrow_mut();
        match handles.iter().position(|open| open.is(engine, handle)) {
            Some(index) => {
                handles.remove(index);
                true
            }
            None => false,
        }
    })
}

/// Number of handles opened on this thread and not yet closed.
pub fn open_handle_count() -> usize {
    OPEN_HANDLES.with(|handles| handles.borrow().len())
}

/// Closes every handle still open on this thread. Returns how many closed
/// cleanly; failures are logged and skipped.
pub fn close_all() -> usize {
    let drained: Vec<OpenHandle> =
        OPEN_HANDLES.with(|handles| handles.borrow_mut().drain(..).collect());
    let total = drained.len();
    let mut closed = 0;
    for open in drained {
        let Some(engine) = open.engine.upgrade() else {
            continue;
        };
        match engine.close(open.handle) {
            Ok(()) => closed += 1,
            Err(err) => warn!(
                "event=close_all module=registry status=error handle={} error={}",
                open.handle.0, err
            ),
        }
    }
    info!(
        "event=close_all module=registry status=ok closed={} total={}",
        closed, total
    );
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemEngine, OpenMode};
    use std::path::Path;

    #[test]
    fn close_all_drains_and_closes() {
        let mem = Rc::new(MemEngine::new());
        mem.add_document("a.xdw", 1);
        mem.add_document("b.xdw", 1);
        let engine: Rc<dyn DocumentEngine> = mem.clone();

        let before = open_handle_count();
        let a = engine.open(Path::new("a.xdw"), OpenMode::default()).unwrap();
        let b = engine.open(Path::new("b.xdw"), OpenMode::default()).unwrap();
        register(&engine, a);
        register(&engine, b);
        assert_eq!(open_handle_count(), before + 2);

        assert!(close_all() >= 2);
        assert_eq!(open_handle_count(), 0);
        assert_eq!(mem.open_handle_count(), 0);
    }

    #[test]
    fn release_is_one_shot() {
        let mem = Rc::new(MemEngine::new());
        mem.add_document("c.xdw", 1);
        let engine: Rc<dyn DocumentEngine> = mem;
        let handle = engine.open(Path::new("c.xdw"), OpenMode::default()).unwrap();
        register(&engine, handle);
        assert!(release(&engine, handle));
        assert!(!release(&engine, handle));
        engine.close(handle).unwrap();
    }

    #[test]
    fn close_all_skips_failures() {
        let mem = Rc::new(MemEngine::new());
        let engine: Rc<dyn DocumentEngine> = mem;
        // Never opened, so the engine rejects the close.
        register(&engine, EngineHandle(9999));
        close_all();
        assert_eq!(open_handle_count(), 0);
    }
}
