//! # Positioned Collections
//!
//! Pages, annotations, attachments and binder sub-documents share one
//! contract: a live `len()`, Python-style indices (`-1` is the last element),
//! slices with a step, and insert/delete sequenced as
//!
//! 1. engine call,
//! 2. count update and one `Inserted`/`Removed` event per position,
//! 3. proxy construction (insert) or retirement (delete).
//!
//! A failed engine call leaves the count and every cached position as they
//! were, unless re-reading the count shows the engine changed the container
//! anyway; then the observed part of the change is committed before the
//! error is returned.

use log::warn;
use std::cell::Cell;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::rc::Rc;

use crate::bus::{Channel, Event, NotificationBus, Observer};
use crate::cache::ProxyCache;
use crate::error::{BinderError, Result};

/// Resolves `pos` against `count`.
///
/// The valid window is `[-count, count)`, or `[-count, count]` when
/// `allow_append` admits the one-past-the-end insertion point.
pub fn normalize(
    what: &'static str,
    pos: isize,
    count: usize,
    allow_append: bool,
) -> Result<usize> {
    let count = count as i64;
    let given = pos as i64;
    let high = count + i64::from(allow_append);
    if given < -count || given >= high {
        return Err(BinderError::OutOfRange {
            what,
            low: -count,
            high,
            given,
        });
    }
    Ok(if given < 0 { given + count } else { given } as usize)
}

/// Unresolved slice bounds, as a caller writes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl Slice {
    pub const fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        Self { start, stop, step }
    }

    pub const fn full() -> Self {
        Self::new(None, None, None)
    }

    pub const fn step_by(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::full()
    }
}

impl From<Range<isize>> for Slice {
    fn from(r: Range<isize>) -> Self {
        Slice::new(Some(r.start), Some(r.end), None)
    }
}

impl From<RangeFrom<isize>> for Slice {
    fn from(r: RangeFrom<isize>) -> Self {
        Slice::new(Some(r.start), None, None)
    }
}

impl From<RangeTo<isize>> for Slice {
    fn from(r: RangeTo<isize>) -> Self {
        Slice::new(None, Some(r.end), None)
    }
}

/// Resolved slice: `start` is a valid position, `stop` is exclusive and may
/// be `-1` for a descending walk down to position 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub start: usize,
    pub stop: isize,
    pub step: isize,
}

impl SliceRange {
    pub fn positions(&self) -> impl Iterator<Item = usize> {
        let (stop, step) = (self.stop, self.step);
        let mut current = self.start as isize;
        std::iter::from_fn(move || {
            let more = if step > 0 { current < stop } else { current > stop };
            if !more {
                return None;
            }
            let position = current as usize;
            current += step;
            Some(position)
        })
    }

    pub fn len(&self) -> usize {
        self.positions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves a slice against `count`.
///
/// A zero step is only accepted when the resolved bounds coincide, giving an
/// empty slice. With a positive step `start` defaults to 0 and `stop` to
/// `count`; with a negative one they default to the last position and to
/// just before position 0.
pub fn normalize_slice(what: &'static str, slice: Slice, count: usize) -> Result<SliceRange> {
    let zero_step = slice.step == Some(0);
    let step = match slice.step {
        None | Some(0) => 1,
        Some(step) => step,
    };
    let n = count as isize;
    if step < 0 && count == 0 {
        return Ok(SliceRange {
            start: 0,
            stop: 0,
            step,
        });
    }
    let default_start = if step > 0 { 0 } else { -1 };
    let start = normalize(what, slice.start.unwrap_or(default_start), count, step > 0)?;
    let stop = match slice.stop {
        None if step > 0 => n,
        None => -1,
        Some(stop) if stop < 0 => (stop + n).max(if step > 0 { 0 } else { -1 }),
        Some(stop) => stop.min(if step > 0 { n } else { n - 1 }),
    };
    if zero_step && start as isize != stop {
        return Err(BinderError::InvalidStep);
    }
    Ok(SliceRange { start, stop, step })
}

/// Uniform positional access over a container's children.
///
/// Implementors supply `what`, `len`, and the already-normalized `item` and
/// `remove`; indexing, slicing and iteration come for free.
pub trait Positioned {
    type Item;

    /// Element name used in range errors ("Page", "Annotation").
    fn what(&self) -> &'static str;

    fn len(&self) -> usize;

    fn item(&self, position: usize) -> Result<Rc<Self::Item>>;

    fn remove(&self, position: usize) -> Result<Rc<Self::Item>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn normalize(&self, pos: isize, allow_append: bool) -> Result<usize> {
        normalize(self.what(), pos, self.len(), allow_append)
    }

    fn normalize_slice(&self, slice: Slice) -> Result<SliceRange> {
        normalize_slice(self.what(), slice, self.len())
    }

    fn get(&self, pos: isize) -> Result<Rc<Self::Item>> {
        let position = self.normalize(pos, false)?;
        self.item(position)
    }

    fn delete(&self, pos: isize) -> Result<Rc<Self::Item>> {
        let position = self.normalize(pos, false)?;
        self.remove(position)
    }

    fn slice(&self, slice: Slice) -> Result<Vec<Rc<Self::Item>>> {
        let range = self.normalize_slice(slice)?;
        range.positions().map(|p| self.item(p)).collect()
    }

    /// Deletes every position of the slice, highest first, so each target is
    /// still at its original position when its turn comes.
    fn delete_slice(&self, slice: Slice) -> Result<Vec<Rc<Self::Item>>> {
        let range = self.normalize_slice(slice)?;
        let mut positions: Vec<usize> = range.positions().collect();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        positions.into_iter().map(|p| self.remove(p)).collect()
    }

    fn iter(&self) -> Iter<'_, Self>
    where
        Self: Sized,
    {
        Iter {
            owner: self,
            next: 0,
        }
    }
}

/// Lazy iterator over a [`Positioned`] container. Each step re-reads
/// `len()`, so a fresh iterator always reflects the current contents.
pub struct Iter<'a, C> {
    owner: &'a C,
    next: usize,
}

impl<C: Positioned> Iterator for Iter<'_, C> {
    type Item = Result<Rc<C::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.owner.len() {
            return None;
        }
        let item = self.owner.item(self.next);
        self.next += 1;
        Some(item)
    }
}

/// Count, proxy cache and bus of one container, with the insert/delete
/// sequencing shared by every collection.
pub(crate) struct Children<P> {
    what: &'static str,
    count: Cell<usize>,
    cache: ProxyCache<P>,
    bus: NotificationBus,
}

impl<P: Observer + 'static> Children<P> {
    pub(crate) fn new(what: &'static str, channel: Channel, count: usize) -> Self {
        Self {
            what,
            count: Cell::new(count),
            cache: ProxyCache::new(),
            bus: NotificationBus::new(channel),
        }
    }

    pub(crate) fn what(&self) -> &'static str {
        self.what
    }

    pub(crate) fn len(&self) -> usize {
        self.count.get()
    }

    pub(crate) fn normalize(&self, pos: isize, allow_append: bool) -> Result<usize> {
        normalize(self.what, pos, self.len(), allow_append)
    }

    pub(crate) fn cached(&self) -> Vec<Rc<P>> {
        self.cache.values()
    }

    /// Cached proxy at `position`, built by `load` and attached on a miss.
    pub(crate) fn fetch(
        &self,
        position: usize,
        load: impl FnOnce() -> Result<Rc<P>>,
    ) -> Result<Rc<P>> {
        self.cache.get_or_try_insert_with(position, || {
            let proxy = load()?;
            let observer: Rc<dyn Observer> = proxy.clone();
            self.bus.attach(&observer);
            Ok(proxy)
        })
    }

    /// Runs an engine insert at `position` that reports how many elements it
    /// added, then announces and loads them.
    pub(crate) fn insert_with(
        &self,
        position: usize,
        engine_call: impl FnOnce() -> Result<usize>,
        recount: impl FnOnce() -> Result<usize>,
        load: impl Fn(usize) -> Result<Rc<P>>,
    ) -> Result<Vec<Rc<P>>> {
        let before = self.len();
        let added = match engine_call() {
            Ok(added) => added,
            Err(err) => {
                if let Some(actual) = self.recount(before, recount) {
                    let outcome = if actual > before {
                        self.commit_inserted(position, actual - before)
                    } else {
                        self.count.set(actual);
                        Ok(())
                    };
                    self.log_resync_failure(outcome);
                }
                return Err(err);
            }
        };
        self.commit_inserted(position, added)?;
        (position..position + added)
            .map(|p| self.fetch(p, || load(p)))
            .collect()
    }

    /// Runs an engine delete of `proxy`, which sits at `position`.
    pub(crate) fn remove_with(
        &self,
        position: usize,
        proxy: Rc<P>,
        engine_call: impl FnOnce() -> Result<()>,
        recount: impl FnOnce() -> Result<usize>,
    ) -> Result<Rc<P>> {
        let before = self.len();
        if let Err(err) = engine_call() {
            if let Some(actual) = self.recount(before, recount) {
                let outcome = if actual + 1 == before {
                    self.commit_removed(position, &proxy)
                } else {
                    self.count.set(actual);
                    Ok(())
                };
                self.log_resync_failure(outcome);
            }
            return Err(err);
        }
        self.commit_removed(position, &proxy)?;
        Ok(proxy)
    }

    /// Announces `added` new elements starting at `position`.
    pub(crate) fn commit_inserted(&self, position: usize, added: usize) -> Result<()> {
        for p in position..position + added {
            self.count.set(self.count.get() + 1);
            let event = Event::inserted(self.bus.channel(), p);
            self.cache.apply(&event);
            self.bus.notify(&event)?;
        }
        Ok(())
    }

    pub(crate) fn commit_removed(&self, position: usize, proxy: &Rc<P>) -> Result<()> {
        self.cache.remove(position);
        let observer: Rc<dyn Observer> = proxy.clone();
        self.bus.detach(&observer);
        proxy.slot().retire();
        self.count.set(self.count.get().saturating_sub(1));
        let event = Event::removed(self.bus.channel(), position);
        self.cache.apply(&event);
        self.bus.notify(&event)
    }

    /// Re-reads the count after a failed engine call. Returns the engine's
    /// count only when it differs from `before`.
    fn recount(&self, before: usize, recount: impl FnOnce() -> Result<usize>) -> Option<usize> {
        match recount() {
            Ok(actual) if actual == before => None,
            Ok(actual) => {
                warn!(
                    "event=resync module=collection status=partial what={} before={} after={}",
                    self.what, before, actual
                );
                Some(actual)
            }
            Err(err) => {
                warn!(
                    "event=resync module=collection status=error what={} error={}",
                    self.what, err
                );
                None
            }
        }
    }

    fn log_resync_failure(&self, outcome: Result<()>) {
        if let Err(err) = outcome {
            warn!(
                "event=resync module=collection status=error what={} error={}",
                self.what, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Slot;
    use std::cell::RefCell;

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(normalize("Page", -1, 5, false).unwrap(), 4);
        assert_eq!(normalize("Page", -5, 5, false).unwrap(), 0);
        assert_eq!(normalize("Page", 4, 5, false).unwrap(), 4);
    }

    #[test]
    fn out_of_window_positions_fail() {
        assert!(matches!(
            normalize("Page", 5, 5, false),
            Err(BinderError::OutOfRange { given: 5, .. })
        ));
        assert!(normalize("Page", -6, 5, false).is_err());
        assert!(matches!(
            normalize("Page", -1, 0, false),
            Err(BinderError::OutOfRange {
                low: 0,
                high: 0,
                given: -1,
                ..
            })
        ));
    }

    #[test]
    fn append_admits_one_past_the_end() {
        assert_eq!(normalize("Page", 5, 5, true).unwrap(), 5);
        assert_eq!(normalize("Page", 0, 0, true).unwrap(), 0);
        assert!(normalize("Page", 6, 5, true).is_err());
    }

    #[test]
    fn full_slice_resolves_to_whole_range() {
        let range = normalize_slice("Page", Slice::full(), 5).unwrap();
        assert_eq!(
            range,
            SliceRange {
                start: 0,
                stop: 5,
                step: 1
            }
        );
        assert_eq!(range.positions().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        let empty = normalize_slice("Page", Slice::full(), 0).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn zero_step_is_rejected_for_non_empty_slices() {
        let err = normalize_slice("Page", Slice::new(Some(1), None, Some(0)), 5).unwrap_err();
        assert!(matches!(err, BinderError::InvalidStep));
        let ok = normalize_slice("Page", Slice::new(Some(2), Some(2), Some(0)), 5).unwrap();
        assert!(ok.is_empty());
        assert!(matches!(
            normalize_slice("Page", Slice::new(None, None, Some(0)), 5),
            Err(BinderError::InvalidStep)
        ));
        assert!(matches!(
            normalize_slice("Page", Slice::new(Some(-3), Some(2), Some(0)), 5),
            Ok(range) if range.is_empty()
        ));
        assert!(normalize_slice("Page", Slice::new(None, None, Some(0)), 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn descending_slices_walk_down() {
        let range = normalize_slice("Page", Slice::new(Some(3), None, Some(-1)), 5).unwrap();
        assert_eq!(range.positions().collect::<Vec<_>>(), vec![3, 2, 1, 0]);
        let range = normalize_slice("Page", Slice::full().step_by(-2), 6).unwrap();
        assert_eq!(range.positions().collect::<Vec<_>>(), vec![5, 3, 1]);
        assert!(normalize_slice("Page", Slice::full().step_by(-1), 0)
            .unwrap()
            .is_empty());
        let range = normalize_slice("Page", Slice::new(Some(-1), Some(-6), Some(-2)), 5).unwrap();
        assert_eq!(range.positions().collect::<Vec<_>>(), vec![4, 2, 0]);
    }

    #[test]
    fn stops_are_clamped() {
        let range = normalize_slice("Page", Slice::from(1..100), 5).unwrap();
        assert_eq!(range.positions().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let range = normalize_slice("Page", Slice::from(..-2), 5).unwrap();
        assert_eq!(range.positions().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[derive(Debug)]
    struct Item {
        slot: Slot,
    }

    impl Observer for Item {
        fn slot(&self) -> &Slot {
            &self.slot
        }
    }

    /// Container over a plain vector standing in for the engine.
    struct Numbers {
        engine: RefCell<Vec<u32>>,
        children: Children<Item>,
    }

    impl Numbers {
        fn new(values: &[u32]) -> Self {
            Self {
                engine: RefCell::new(values.to_vec()),
                children: Children::new("Number", Channel::Page, values.len()),
            }
        }

        fn load(&self, position: usize) -> Result<Rc<Item>> {
            Ok(Rc::new(Item {
                slot: Slot::new(Channel::Page, position),
            }))
        }

        fn insert(&self, pos: isize, value: u32) -> Result<Rc<Item>> {
            let position = self.children.normalize(pos, true)?;
            let mut fresh = self.children.insert_with(
                position,
                || {
                    self.engine.borrow_mut().insert(position, value);
                    Ok(1)
                },
                || Ok(self.engine.borrow().len()),
                |p| self.load(p),
            )?;
            Ok(fresh.remove(0))
        }
    }

    impl Positioned for Numbers {
        type Item = Item;

        fn what(&self) -> &'static str {
            self.children.what()
        }

        fn len(&self) -> usize {
            self.children.len()
        }

        fn item(&self, position: usize) -> Result<Rc<Item>> {
            self.children.fetch(position, || self.load(position))
        }

        fn remove(&self, position: usize) -> Result<Rc<Item>> {
            let proxy = self.item(position)?;
            self.children.remove_with(
                position,
                proxy,
                || {
                    self.engine.borrow_mut().remove(position);
                    Ok(())
                },
                || Ok(self.engine.borrow().len()),
            )
        }
    }

    #[test]
    fn insert_then_delete_restores_count_and_positions() {
        let numbers = Numbers::new(&[10, 20, 30]);
        let first = numbers.get(0).unwrap();
        let last = numbers.get(2).unwrap();

        numbers.insert(1, 15).unwrap();
        assert_eq!(numbers.len(), 4);
        assert_eq!(first.position(), 0);
        assert_eq!(last.position(), 3);

        numbers.delete(1).unwrap();
        assert_eq!(numbers.len(), 3);
        assert_eq!(first.position(), 0);
        assert_eq!(last.position(), 2);
        assert!(Rc::ptr_eq(&last, &numbers.get(-1).unwrap()));
    }

    #[test]
    fn deleted_proxies_are_retired() {
        let numbers = Numbers::new(&[1, 2]);
        let doomed = numbers.get(0).unwrap();
        let returned = numbers.delete(0).unwrap();
        assert!(Rc::ptr_eq(&doomed, &returned));
        assert!(doomed.slot().ensure_live().is_err());
        assert!(numbers.get(0).unwrap().slot().is_live());
    }

    #[test]
    fn delete_slice_removes_highest_first() {
        let numbers = Numbers::new(&[0, 1, 2, 3, 4, 5]);
        let keep = numbers.get(1).unwrap();
        let removed = numbers.delete_slice(Slice::from(0..6).step_by(2)).unwrap();
        let positions: Vec<usize> = removed.iter().map(|r| r.position()).collect();
        assert_eq!(positions, vec![4, 2, 0]);
        assert_eq!(numbers.len(), 3);
        assert_eq!(*numbers.engine.borrow(), vec![1, 3, 5]);
        assert_eq!(keep.position(), 0);
    }

    #[test]
    fn zero_step_delete_slice_removes_nothing() {
        let numbers = Numbers::new(&[0, 1, 2, 3, 4]);
        assert!(matches!(
            numbers.delete_slice(Slice::new(None, None, Some(0))),
            Err(BinderError::InvalidStep)
        ));
        assert!(matches!(
            numbers.slice(Slice::new(None, None, Some(0))),
            Err(BinderError::InvalidStep)
        ));
        assert_eq!(numbers.len(), 5);
        assert_eq!(*numbers.engine.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn iteration_reflects_current_length() {
        let numbers = Numbers::new(&[7, 8, 9]);
        assert_eq!(numbers.iter().count(), 3);
        numbers.insert(-1, 1).unwrap();
        let positions: Vec<usize> = numbers
            .iter()
            .map(|item| item.unwrap().position())
            .collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn failed_engine_call_leaves_state_untouched() {
        let numbers = Numbers::new(&[1, 2, 3]);
        let tail = numbers.get(2).unwrap();
        let err = numbers
            .children
            .insert_with(
                0,
                || Err(BinderError::InvalidValue("boom".into())),
                || Ok(3),
                |p| numbers.load(p),
            )
            .unwrap_err();
        assert!(matches!(err, BinderError::InvalidValue(_)));
        assert_eq!(numbers.len(), 3);
        assert_eq!(tail.position(), 2);
    }

    #[test]
    fn partial_engine_success_is_committed() {
        let numbers = Numbers::new(&[1, 2, 3]);
        let tail = numbers.get(2).unwrap();
        let result = numbers.children.insert_with(
            1,
            || {
                numbers.engine.borrow_mut().insert(1, 9);
                Err(BinderError::InvalidValue("second page failed".into()))
            },
            || Ok(numbers.engine.borrow().len()),
            |p| numbers.load(p),
        );
        assert!(result.is_err());
        assert_eq!(numbers.len(), 4);
        assert_eq!(tail.position(), 3);
    }
}
