//! Attribute reads and writes against an open container.

use log::debug;
use std::cell::RefCell;
use std::collections::BTreeMap;

use super::spec::{get_spec, validate, AttributeSpec, OwnerKind};
use super::value::{decode, encode, AttrKind, AttrValue, RawAttribute};
use crate::engine::{codes, AttributeTarget, UserAttributeTarget};
use crate::error::{BinderError, Result};
use crate::file::FileCore;

/// Attributes the registry does not know, kept on the proxy itself.
#[derive(Debug, Default)]
pub(crate) struct LocalAttributes {
    values: RefCell<BTreeMap<String, AttrValue>>,
}

impl LocalAttributes {
    pub(crate) fn get(&self, name: &str) -> Option<AttrValue> {
        self.values.borrow().get(name).cloned()
    }

    pub(crate) fn set(&self, name: &str, value: AttrValue) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }
}

/// Treats INFO_NOT_FOUND as an absent value.
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(err) if err.engine_code() == Some(codes::INFO_NOT_FOUND) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Presents symbol-backed integers by name when the code is known.
fn present(spec: &AttributeSpec, owner: OwnerKind, value: AttrValue) -> AttrValue {
    match (spec.symbols_for(owner), &value) {
        (Some(table), AttrValue::Int(code)) => match table.name_of(*code) {
            Some(name) => AttrValue::Str(name.to_string()),
            None => value,
        },
        _ => value,
    }
}

fn coerce(spec: &AttributeSpec, owner: OwnerKind, value: AttrValue) -> Result<RawAttribute> {
    match (spec.kind, value) {
        (AttrKind::Int, AttrValue::Str(name)) => match spec.symbols_for(owner) {
            Some(table) => Ok(RawAttribute::Int(table.normalize(name.as_str()))),
            None => Err(BinderError::InvalidValue(format!(
                "{} expects an integer, got {:?}",
                spec.name, name
            ))),
        },
        (kind, value) if value.kind() == kind => Ok(encode(&value)),
        (kind, value) => Err(BinderError::InvalidValue(format!(
            "{} expects {:?}, got {:?}",
            spec.name,
            kind,
            value.kind()
        ))),
    }
}

/// Reads a registry attribute, or the local fallback for unknown names.
///
/// `target` is `None` for owners the engine keeps no named attributes for.
pub(crate) fn read(
    file: &FileCore,
    owner: OwnerKind,
    target: Option<AttributeTarget>,
    local: &LocalAttributes,
    name: &str,
) -> Result<Option<AttrValue>> {
    let (spec, target) = match (validate(name, owner)?, target) {
        (Some(spec), Some(target)) => (spec, target),
        _ => return Ok(local.get(name)),
    };
    let raw = optional(file.call("get_attribute", None, |engine, handle| {
        engine.get_attribute(handle, target, spec.tag)
    }))?;
    match raw {
        Some(raw) => Ok(Some(present(spec, owner, decode(raw, file.zone())?))),
        None => Ok(None),
    }
}

pub(crate) fn write(
    file: &FileCore,
    owner: OwnerKind,
    target: Option<AttributeTarget>,
    local: &LocalAttributes,
    name: &str,
    value: AttrValue,
) -> Result<()> {
    let (spec, target) = match (validate(name, owner)?, target) {
        (Some(spec), Some(target)) => (spec, target),
        _ => {
            debug!(
                "event=attribute_local module=attributes status=ok owner={} name={}",
                owner, name
            );
            local.set(name, value);
            return Ok(());
        }
    };
    let raw = coerce(spec, owner, value)?;
    file.call("set_attribute", None, |engine, handle| {
        engine.set_attribute(handle, target, spec.tag, &raw)
    })
}

/// Engine tag for a pass-through name: registry tag if known, else as given.
fn tag_of(name: &str) -> &str {
    get_spec(name).map(|spec| spec.tag).unwrap_or(name)
}

/// Page-form and property reads skip the ownership table.
pub(crate) fn read_unchecked(
    file: &FileCore,
    target: AttributeTarget,
    name: &str,
) -> Result<Option<AttrValue>> {
    let tag = tag_of(name);
    let raw = optional(file.call("get_attribute", None, |engine, handle| {
        engine.get_attribute(handle, target, tag)
    }))?;
    raw.map(|raw| decode(raw, file.zone())).transpose()
}

pub(crate) fn write_unchecked(
    file: &FileCore,
    target: AttributeTarget,
    name: &str,
    value: &AttrValue,
) -> Result<()> {
    let tag = tag_of(name);
    let raw = encode(value);
    file.call("set_attribute", None, |engine, handle| {
        engine.set_attribute(handle, target, tag, &raw)
    })
}

pub(crate) fn read_user(
    file: &FileCore,
    target: UserAttributeTarget,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    optional(file.call("get_user_attribute", None, |engine, handle| {
        engine.get_user_attribute(handle, target, name)
    }))
}

pub(crate) fn write_user(
    file: &FileCore,
    target: UserAttributeTarget,
    name: &str,
    value: &[u8],
) -> Result<()> {
    file.call("set_user_attribute", None, |engine, handle| {
        engine.set_user_attribute(handle, target, name, value)
    })
}
