//! # Attribute Codec
//!
//! Documents, binders, pages and annotations all expose named, typed
//! attributes through the same pair of calls:
//!
//! - `get_attribute(name) -> Result<Option<AttrValue>>`
//! - `set_attribute(name, value) -> Result<()>`
//!
//! The codec sits between those calls and the engine:
//!
//! - **Symbol tables** ([`codec`]): symbolic names such as `"RED"` or
//!   `"FITDEF"` resolve to engine codes. Unknown names resolve to the table
//!   default rather than failing.
//! - **Values** ([`AttrValue`] / [`RawAttribute`]): integers, strings,
//!   booleans, zone-aware dates and point lists, encoded for the engine as
//!   integers, strings, booleans, Unix timestamps and flat 1/100 mm buffers.
//! - **Registry** ([`ATTRIBUTES`]): which owner kinds may carry which names.
//!
//! ## Ownership Rules
//!
//! | Name | Owner | Result |
//! |------|-------|--------|
//! | registered for this owner | any | stored by the engine |
//! | registered for another owner | any | `AttributeNotApplicable` |
//! | not registered | any | kept locally on the proxy, never sent to the engine |
//!
//! Page-form attributes, document properties and user attributes bypass the
//! registry and always pass through to the engine.

pub(crate) mod access;
pub mod codec;
mod spec;
mod value;

pub use codec::{Code, CodeTable};
pub use spec::{get_spec, validate, AttributeSpec, Domain, OwnerKind, ATTRIBUTES};
pub use value::{decode, encode, AttrKind, AttrValue, RawAttribute};
