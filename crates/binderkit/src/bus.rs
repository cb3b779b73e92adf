//! # Notification Bus
//!
//! Containers broadcast structural changes to the proxies they handed out so
//! each proxy can keep its stored position correct without asking the engine.
//!
//! ## Renumbering Rule
//!
//! One rule, applied by every observer through [`Slot::apply`]:
//!
//! | Event | Observer at `pos` |
//! |-------|-------------------|
//! | `Removed(p)`, `p < pos` | `pos - 1` |
//! | `Inserted(p)`, `p <= pos` | `pos + 1` |
//! | anything else | unchanged |
//!
//! An insert at `p` pushes the element that was at `p` to `p + 1`, so the
//! observer sitting exactly at `p` moves too. The observer at a removed
//! position is detached and retired before the event goes out.
//!
//! ## Delivery
//!
//! Delivery is synchronous and in registration order. Observers are held
//! weakly; dropped proxies are pruned on the next notification. An event from
//! a different channel is a protocol error and is always surfaced.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{BinderError, Result};

/// Which kind of child a container is announcing changes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Page,
    Annotation,
    Attachment,
    /// Sub-documents of a binder.
    Document,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Page => "page",
            Channel::Annotation => "annotation",
            Channel::Attachment => "attachment",
            Channel::Document => "document",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Inserted,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub channel: Channel,
    pub kind: EventKind,
    pub position: usize,
}

impl Event {
    pub fn inserted(channel: Channel, position: usize) -> Self {
        Self {
            channel,
            kind: EventKind::Inserted,
            position,
        }
    }

    pub fn removed(channel: Channel, position: usize) -> Self {
        Self {
            channel,
            kind: EventKind::Removed,
            position,
        }
    }
}

/// Where an observer at `position` ends up after `event`.
pub fn shifted(position: usize, event: &Event) -> usize {
    match event.kind {
        EventKind::Removed if event.position < position => position - 1,
        EventKind::Inserted if event.position <= position => position + 1,
        _ => position,
    }
}

/// The mutable position an observer carries, plus whether it is still live.
#[derive(Debug)]
pub struct Slot {
    channel: Channel,
    position: Cell<usize>,
    live: Cell<bool>,
}

impl Slot {
    pub fn new(channel: Channel, position: usize) -> Self {
        Self {
            channel,
            position: Cell::new(position),
            live: Cell::new(true),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn position(&self) -> usize {
        self.position.get()
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// Marks the slot dead; its position is frozen from here on.
    pub(crate) fn retire(&self) {
        self.live.set(false);
    }

    /// Applies the renumbering rule. Returns whether the position changed.
    pub fn apply(&self, event: &Event) -> Result<bool> {
        if event.channel != self.channel {
            return Err(BinderError::Protocol(format!(
                "{} event delivered to {} observer",
                event.channel, self.channel
            )));
        }
        if !self.is_live() {
            return Ok(false);
        }
        let old = self.position.get();
        let new = shifted(old, event);
        self.position.set(new);
        Ok(new != old)
    }

    /// Fails with `StaleReference` once the slot's element was deleted.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(BinderError::StaleReference(format!(
                "{} at position {} was deleted",
                self.channel,
                self.position()
            )))
        }
    }
}

pub trait Observer {
    fn slot(&self) -> &Slot;

    fn position(&self) -> usize {
        self.slot().position()
    }

    fn on_event(&self, event: &Event) -> Result<()> {
        self.slot().apply(event).map(|_| ())
    }
}

pub struct NotificationBus {
    channel: Channel,
    observers: RefCell<Vec<Weak<dyn Observer>>>,
}

impl NotificationBus {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn attach(&self, observer: &Rc<dyn Observer>) {
        let mut observers = self.observers.borrow_mut();
        if !observers.iter().any(|o| same(o, observer)) {
            observers.push(Rc::downgrade(observer));
        }
    }

    pub fn detach(&self, observer: &Rc<dyn Observer>) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|o| !same(o, observer));
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().iter().filter(|o| o.strong_count() > 0).count()
    }

    pub fn notify(&self, event: &Event) -> Result<()> {
        if event.channel != self.channel {
            return Err(BinderError::Protocol(format!(
                "{} event emitted on {} bus",
                event.channel, self.channel
            )));
        }
        let live: Vec<Rc<dyn Observer>> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.on_event(event)?;
        }
        Ok(())
    }
}

fn same(weak: &Weak<dyn Observer>, observer: &Rc<dyn Observer>) -> bool {
    std::ptr::addr_eq(weak.as_ptr(), Rc::as_ptr(observer))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        slot: Slot,
        seen: Rc<RefCell<Vec<(&'static str, usize)>>>,
        label: &'static str,
    }

    impl Observer for Recorder {
        fn slot(&self) -> &Slot {
            &self.slot
        }

        fn on_event(&self, event: &Event) -> Result<()> {
            self.seen.borrow_mut().push((self.label, event.position));
            self.slot.apply(event).map(|_| ())
        }
    }

    fn recorder(
        label: &'static str,
        position: usize,
        seen: &Rc<RefCell<Vec<(&'static str, usize)>>>,
    ) -> Rc<dyn Observer> {
        Rc::new(Recorder {
            slot: Slot::new(Channel::Page, position),
            seen: seen.clone(),
            label,
        })
    }

    #[test]
    fn removal_before_shifts_down() {
        let slot = Slot::new(Channel::Page, 5);
        assert!(slot.apply(&Event::removed(Channel::Page, 2)).unwrap());
        assert_eq!(slot.position(), 4);
        assert!(!slot.apply(&Event::removed(Channel::Page, 7)).unwrap());
        assert_eq!(slot.position(), 4);
    }

    #[test]
    fn insertion_at_or_before_shifts_up() {
        let slot = Slot::new(Channel::Page, 1);
        slot.apply(&Event::inserted(Channel::Page, 1)).unwrap();
        assert_eq!(slot.position(), 2);
        slot.apply(&Event::inserted(Channel::Page, 0)).unwrap();
        assert_eq!(slot.position(), 3);
        slot.apply(&Event::inserted(Channel::Page, 4)).unwrap();
        assert_eq!(slot.position(), 3);
    }

    #[test]
    fn retired_slots_stop_moving() {
        let slot = Slot::new(Channel::Annotation, 3);
        slot.retire();
        slot.apply(&Event::removed(Channel::Annotation, 0)).unwrap();
        assert_eq!(slot.position(), 3);
        assert!(matches!(slot.ensure_live(), Err(BinderError::StaleReference(_))));
    }

    #[test]
    fn foreign_channel_is_a_protocol_error() {
        let slot = Slot::new(Channel::Page, 0);
        let err = slot.apply(&Event::removed(Channel::Attachment, 0)).unwrap_err();
        assert!(matches!(err, BinderError::Protocol(_)));

        let bus = NotificationBus::new(Channel::Page);
        let err = bus.notify(&Event::inserted(Channel::Document, 0)).unwrap_err();
        assert!(matches!(err, BinderError::Protocol(_)));
    }

    #[test]
    fn notify_runs_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bus = NotificationBus::new(Channel::Page);
        let c = recorder("c", 9, &seen);
        let a = recorder("a", 1, &seen);
        let b = recorder("b", 4, &seen);
        bus.attach(&c);
        bus.attach(&a);
        bus.attach(&b);

        bus.notify(&Event::removed(Channel::Page, 0)).unwrap();
        let labels: Vec<_> = seen.borrow().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
        assert_eq!(c.position(), 8);
        assert_eq!(a.position(), 0);
        assert_eq!(b.position(), 3);
    }

    #[test]
    fn detached_and_dropped_observers_are_skipped() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bus = NotificationBus::new(Channel::Page);
        let kept = recorder("kept", 2, &seen);
        let gone = recorder("gone", 3, &seen);
        let dropped = recorder("dropped", 4, &seen);
        bus.attach(&kept);
        bus.attach(&gone);
        bus.attach(&dropped);
        bus.attach(&kept);

        assert!(bus.detach(&gone));
        assert!(!bus.detach(&gone));
        drop(dropped);
        assert_eq!(bus.observer_count(), 1);

        bus.notify(&Event::inserted(Channel::Page, 0)).unwrap();
        assert_eq!(seen.borrow().as_slice(), &[("kept", 0)]);
        assert_eq!(kept.position(), 3);
        assert_eq!(gone.position(), 3);
    }
}
