// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Named configuration knobs.
//!
//! Each knob is a registry entry holding a getter, a setter, a constraint
//! and the last value seen. Handlers are plain function pointers taking the
//! owning device and a per-entry argument (typically the axis), so one
//! handler serves both axes of a paired device.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::choice::Choice;
use crate::error::{ConfigError, DeviceResult, ProtocolError};
use crate::refresh::{RefreshMode, RefreshPolicy};

/// Value type of a knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Float,
    Integer,
    Text,
}

/// Current value of a knob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    pub fn text(s: impl Into<String>) -> Self {
        PropertyValue::Text(s.into())
    }

    pub fn choice<C: Choice>(c: C) -> Self {
        PropertyValue::Text(c.label().to_string())
    }

    /// Parse host input according to `kind`.
    pub fn parse(kind: PropertyKind, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match kind {
            PropertyKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(PropertyValue::Float),
            PropertyKind::Integer => raw.parse::<i64>().ok().map(PropertyValue::Integer),
            PropertyKind::Text => Some(PropertyValue::Text(raw.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Integer(v) => Some(*v as f64),
            PropertyValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            PropertyValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret a text value as a member of `C`.
    pub fn as_choice<C: Choice>(&self) -> Option<C> {
        self.as_str().and_then(C::from_label)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

/// Allowed values of a knob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Unbounded,
    Range { min: f64, max: f64 },
    OneOf(Vec<String>),
}

impl Constraint {
    pub fn range(min: f64, max: f64) -> Self {
        Constraint::Range { min, max }
    }

    pub fn choices<C: Choice>() -> Self {
        Constraint::OneOf(C::labels())
    }

    pub fn check(&self, name: &str, value: &PropertyValue) -> Result<(), ConfigError> {
        match self {
            Constraint::Unbounded => Ok(()),
            Constraint::Range { min, max } => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| ConfigError::invalid(name, value, "expected a number"))?;
                if v < *min || v > *max {
                    return Err(ConfigError::invalid(
                        name,
                        value,
                        format!("must be within {}..={}", min, max),
                    ));
                }
                Ok(())
            }
            Constraint::OneOf(allowed) => {
                let s = value.as_str().unwrap_or_default();
                if allowed.iter().any(|a| a == s) {
                    Ok(())
                } else {
                    Err(ConfigError::invalid(
                        name,
                        value,
                        format!("must be one of: {}", allowed.join(", ")),
                    ))
                }
            }
        }
    }
}

pub type Getter<D, A> = fn(&mut D, A) -> DeviceResult<PropertyValue>;
pub type Setter<D, A> = fn(&mut D, A, PropertyValue) -> DeviceResult<PropertyValue>;

/// Description of one knob, built at registration time.
pub struct PropertySpec<D, A> {
    pub name: String,
    pub kind: PropertyKind,
    pub constraint: Constraint,
    pub arg: A,
    pub getter: Option<Getter<D, A>>,
    pub setter: Option<Setter<D, A>>,
    /// Ignore the refresh policy and always call the getter.
    pub always_refresh: bool,
    /// Value reported before the first read.
    pub initial: Option<PropertyValue>,
}

impl<D, A: Copy> PropertySpec<D, A> {
    pub fn new(name: impl Into<String>, kind: PropertyKind, arg: A) -> Self {
        Self {
            name: name.into(),
            kind,
            constraint: Constraint::Unbounded,
            arg,
            getter: None,
            setter: None,
            always_refresh: false,
            initial: None,
        }
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn getter(mut self, getter: Getter<D, A>) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn setter(mut self, setter: Setter<D, A>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn always_refresh(mut self) -> Self {
        self.always_refresh = true;
        self
    }

    pub fn initial(mut self, value: PropertyValue) -> Self {
        self.initial = Some(value);
        self
    }
}

struct Entry<D, A> {
    spec: PropertySpec<D, A>,
    cached: Option<PropertyValue>,
}

/// Lookup-ready snapshot of an entry, detached from the registry borrow.
pub struct Handler<D, A> {
    pub arg: A,
    pub getter: Option<Getter<D, A>>,
    pub setter: Option<Setter<D, A>>,
    pub always_refresh: bool,
}

/// Summary of a knob for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyKind,
    pub constraint: Constraint,
    pub read_only: bool,
    pub cached: Option<PropertyValue>,
}

/// Registry of knobs for a device of type `D`.
pub struct PropertyRegistry<D, A> {
    entries: HashMap<String, Entry<D, A>>,
    order: Vec<String>,
    policy: RefreshPolicy,
}

impl<D, A: Copy> PropertyRegistry<D, A> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            policy: RefreshPolicy::default(),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: RefreshPolicy) {
        self.policy = policy;
    }

    /// Register a knob; re-registering a name replaces the old entry.
    pub fn register(&mut self, spec: PropertySpec<D, A>) {
        let key = normalize_name(&spec.name);
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        let cached = spec.initial.clone();
        self.entries.insert(key, Entry { spec, cached });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Canonical names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k))
            .map(|e| e.spec.name.clone())
            .collect()
    }

    pub fn info(&self, name: &str) -> Result<PropertyInfo, ConfigError> {
        let entry = self.entry(name)?;
        Ok(PropertyInfo {
            name: entry.spec.name.clone(),
            kind: entry.spec.kind,
            constraint: entry.spec.constraint.clone(),
            read_only: entry.spec.setter.is_none(),
            cached: entry.cached.clone(),
        })
    }

    pub fn kind(&self, name: &str) -> Result<PropertyKind, ConfigError> {
        Ok(self.entry(name)?.spec.kind)
    }

    pub fn cached(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .get(&normalize_name(name))
            .and_then(|e| e.cached.as_ref())
    }

    /// Overwrite the cached value without touching hardware.
    pub fn store(&mut self, name: &str, value: PropertyValue) {
        if let Some(entry) = self.entries.get_mut(&normalize_name(name)) {
            entry.cached = Some(value);
        }
    }

    pub fn handler(&self, name: &str) -> Result<Handler<D, A>, ConfigError> {
        let spec = &self.entry(name)?.spec;
        Ok(Handler {
            arg: spec.arg,
            getter: spec.getter,
            setter: spec.setter,
            always_refresh: spec.always_refresh,
        })
    }

    /// Whether a get must call the getter.
    pub fn needs_query(&self, name: &str, mode: RefreshMode) -> Result<bool, ConfigError> {
        let entry = self.entry(name)?;
        if entry.spec.getter.is_none() {
            return Ok(false);
        }
        Ok(entry.spec.always_refresh
            || self.policy.needs_query(mode, entry.cached.is_some()))
    }

    /// Check `value` against the knob's kind and constraint.
    pub fn validate(&self, name: &str, value: &PropertyValue) -> Result<(), ConfigError> {
        let entry = self.entry(name)?;
        if entry.spec.setter.is_none() {
            return Err(ConfigError::ReadOnly(entry.spec.name.clone()));
        }
        let kind_ok = match (entry.spec.kind, value) {
            (PropertyKind::Text, PropertyValue::Text(_)) => true,
            (PropertyKind::Float, PropertyValue::Float(_) | PropertyValue::Integer(_)) => true,
            (PropertyKind::Integer, v) => v.as_i64().is_some(),
            _ => false,
        };
        if !kind_ok {
            return Err(ConfigError::invalid(
                &entry.spec.name,
                value,
                format!("expected {:?} value", entry.spec.kind),
            ));
        }
        entry.spec.constraint.check(&entry.spec.name, value)
    }

    fn entry(&self, name: &str) -> Result<&Entry<D, A>, ConfigError> {
        self.entries
            .get(&normalize_name(name))
            .ok_or_else(|| ConfigError::UnknownProperty(name.to_string()))
    }
}

impl<D, A: Copy> Default for PropertyRegistry<D, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Get a knob through the registry held by `device`.
///
/// `registry` projects the device onto its registry; the handler is copied
/// out before it runs so it can borrow the device mutably.
pub fn get_property<D, A: Copy>(
    device: &mut D,
    registry: fn(&mut D) -> &mut PropertyRegistry<D, A>,
    name: &str,
    mode: RefreshMode,
) -> DeviceResult<PropertyValue> {
    let reg = registry(device);
    let handler = reg.handler(name)?;
    if !reg.needs_query(name, mode)? {
        return reg.cached(name).cloned().ok_or_else(|| {
            ProtocolError::MalformedAnswer {
                answer: String::new(),
                reason: format!("{} has no value yet", name),
            }
            .into()
        });
    }
    let Some(getter) = handler.getter else {
        return Err(ConfigError::UnknownProperty(name.to_string()).into());
    };
    let value = getter(device, handler.arg)?;
    registry(device).store(name, value.clone());
    Ok(value)
}

/// Validate, then set a knob through the registry held by `device`.
///
/// The cache is only updated when the setter succeeds.
pub fn set_property<D, A: Copy>(
    device: &mut D,
    registry: fn(&mut D) -> &mut PropertyRegistry<D, A>,
    name: &str,
    value: PropertyValue,
) -> DeviceResult<PropertyValue> {
    let reg = registry(device);
    reg.validate(name, &value)?;
    let handler = reg.handler(name)?;
    let Some(setter) = handler.setter else {
        return Err(ConfigError::ReadOnly(name.to_string()).into());
    };
    let effective = setter(device, handler.arg, value)?;
    registry(device).store(name, effective.clone());
    Ok(effective)
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::YesNo;
    use crate::error::{DeviceError, TransportError};

    #[derive(Default)]
    struct Knobs {
        registry: PropertyRegistry<Knobs, usize>,
        hardware: [f64; 2],
        reads: usize,
        fail: bool,
    }

    fn registry(k: &mut Knobs) -> &mut PropertyRegistry<Knobs, usize> {
        &mut k.registry
    }

    fn get_level(k: &mut Knobs, slot: usize) -> DeviceResult<PropertyValue> {
        k.reads += 1;
        Ok(PropertyValue::Float(k.hardware[slot]))
    }

    fn set_level(k: &mut Knobs, slot: usize, v: PropertyValue) -> DeviceResult<PropertyValue> {
        if k.fail {
            return Err(TransportError::Closed.into());
        }
        k.hardware[slot] = v.as_f64().unwrap_or_default();
        Ok(v)
    }

    fn knobs() -> Knobs {
        let mut k = Knobs::default();
        for (name, slot) in [("Level-A", 0), ("LevelB", 1)] {
            k.registry.register(
                PropertySpec::new(name, PropertyKind::Float, slot)
                    .constraint(Constraint::range(0.0, 1.0))
                    .getter(get_level)
                    .setter(set_level),
            );
        }
        k.registry.register(
            PropertySpec::new("Flag", PropertyKind::Text, 0)
                .constraint(Constraint::choices::<YesNo>())
                .initial(PropertyValue::choice(YesNo::No)),
        );
        k
    }

    #[test]
    fn test_cached_after_first_read() {
        let mut k = knobs();
        k.hardware[0] = 0.5;
        let v = get_property(&mut k, registry, "level-a", RefreshMode::Cached).unwrap();
        assert_eq!(v, PropertyValue::Float(0.5));
        k.hardware[0] = 0.7;
        let v = get_property(&mut k, registry, "LevelA", RefreshMode::Cached).unwrap();
        assert_eq!(v, PropertyValue::Float(0.5));
        assert_eq!(k.reads, 1);

        let v = get_property(&mut k, registry, "LevelA", RefreshMode::ForceImmediate).unwrap();
        assert_eq!(v, PropertyValue::Float(0.7));
        assert_eq!(k.reads, 2);
    }

    #[test]
    fn test_always_policy_rereads() {
        let mut k = knobs();
        k.registry.set_policy(RefreshPolicy::Always);
        get_property(&mut k, registry, "LevelB", RefreshMode::Cached).unwrap();
        get_property(&mut k, registry, "LevelB", RefreshMode::Cached).unwrap();
        assert_eq!(k.reads, 2);
    }

    #[test]
    fn test_validation_happens_before_setter() {
        let mut k = knobs();
        let err = set_property(&mut k, registry, "LevelA", PropertyValue::Float(2.0)).unwrap_err();
        assert!(matches!(err, DeviceError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(k.hardware[0], 0.0);

        let err = set_property(&mut k, registry, "Nope", PropertyValue::Float(0.1)).unwrap_err();
        assert!(matches!(err, DeviceError::Config(ConfigError::UnknownProperty(_))));

        let err = set_property(&mut k, registry, "Flag", PropertyValue::text("Yes")).unwrap_err();
        assert!(matches!(err, DeviceError::Config(ConfigError::ReadOnly(_))));
    }

    #[test]
    fn test_failed_set_keeps_cache() {
        let mut k = knobs();
        set_property(&mut k, registry, "LevelA", PropertyValue::Float(0.25)).unwrap();
        k.fail = true;
        assert!(set_property(&mut k, registry, "LevelA", PropertyValue::Float(0.75)).is_err());
        assert_eq!(k.registry.cached("LevelA"), Some(&PropertyValue::Float(0.25)));
    }

    #[test]
    fn test_getterless_knob_serves_initial_value() {
        let mut k = knobs();
        let v = get_property(&mut k, registry, "Flag", RefreshMode::ForceImmediate).unwrap();
        assert_eq!(v.as_choice::<YesNo>(), Some(YesNo::No));
        assert_eq!(k.registry.names(), vec!["Level-A", "LevelB", "Flag"]);
    }

    #[test]
    fn test_parse_by_kind() {
        assert_eq!(
            PropertyValue::parse(PropertyKind::Integer, " 12 "),
            Some(PropertyValue::Integer(12))
        );
        assert_eq!(PropertyValue::parse(PropertyKind::Float, "nan"), None);
        assert!(Constraint::range(0.1, 650.0)
            .check("FilterFreqX", &PropertyValue::Integer(650))
            .is_ok());
    }
}
