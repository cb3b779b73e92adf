//! # Binderkit Architecture
//!
//! Binderkit is a **positional object model** over an opaque document engine.
//! Callers navigate and mutate documents by position (page 3, annotation 0
//! of page 3, sub-document 1 of a binder) while the engine is mutated
//! underneath them; every proxy handed out keeps addressing the entity it
//! was created for.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Entity Proxies (document, binder, page, annotation, ...)   │
//! │  - Cached descriptive fields, typed attribute access        │
//! │  - Own the positioned collections of their children         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Positioned Collections (collection.rs)                     │
//! │  - Index normalization, slices, insert/delete sequencing    │
//! │  - Proxy cache (cache.rs) + notification bus (bus.rs)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Document Engine (engine/)                                  │
//! │  - Abstract DocumentEngine trait                            │
//! │  - MemEngine (in-memory, for tests and tooling)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Positions
//!
//! A container announces every structural change on its bus before it
//! returns, one event per affected position. Cached proxies renumber
//! themselves from the event; deleted ones are retired and fail with
//! `StaleReference` from then on. Binder sub-documents additionally carry a
//! page offset that follows changes in the sub-documents before them.
//!
//! ## Threading
//!
//! Everything is single-threaded (`Rc`, `RefCell`). One open container is
//! driven by one owner; callers needing concurrency serialize externally.
//!
//! ## Module Overview
//!
//! - [`document`], [`binder`]: top-level containers and their open/close
//! - [`pages`], [`page`], [`annotation`], [`attachment`]: child proxies
//! - [`collection`], [`cache`], [`bus`]: the positional machinery
//! - [`attributes`]: attribute registry, symbolic code tables, value codec
//! - [`engine`]: the engine interface and the in-memory engine
//! - [`registry`]: open-handle tracking for the exit-time sweep
//! - [`config`], [`logging`], [`error`]: ambient concerns

pub mod annotation;
pub mod attachment;
pub mod attributes;
pub mod binder;
pub mod bus;
pub mod cache;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
mod file;
pub mod geometry;
pub mod logging;
mod opener;
pub mod page;
pub mod pages;
pub mod registry;
pub mod text;

pub use annotation::{Annotation, AnnotationQuery, AnnotationSet, Found};
pub use attachment::{Attachment, AttachmentList};
pub use attributes::{AttrValue, OwnerKind};
pub use binder::{Binder, BinderDocuments, DocumentInBinder};
pub use collection::{Positioned, Slice};
pub use config::BinderkitConfig;
pub use document::Document;
pub use engine::{DocumentEngine, ImageOptions, MemEngine, PageSource};
pub use error::{BinderError, Result};
pub use file::{PageForm, Permissions};
pub use geometry::{Point, Rect, Size};
pub use opener::{open, Opened};
pub use page::Page;
pub use pages::PageSet;
pub use text::TextPattern;
