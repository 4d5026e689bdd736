// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parameter kinds: the validation contract concrete parameter types plug into.
//!
//! A kind declares which slots its descriptors carry, an inheritable table of
//! defaults for those slots, and a validation hook that runs before every
//! store. The core never looks at value semantics beyond these hooks.

use std::fmt;

use crate::descriptor::Parameter;
use crate::error::{ParamError, Result};
use crate::value::Value;

/// Slot names understood by the core and the bundled kinds.
pub mod slot {
    /// Default value.
    pub const DEFAULT: &str = "default";
    /// Whether `None` is accepted.
    pub const ALLOW_NONE: &str = "allow_None";
    /// Settable only until initialization completes.
    pub const CONSTANT: &str = "constant";
    /// Never settable.
    pub const READONLY: &str = "readonly";
    /// Copy the default into each instance.
    pub const INSTANTIATE: &str = "instantiate";
    /// Give each instance its own descriptor copy.
    pub const PER_INSTANCE: &str = "per_instance";
    /// Display ordering hint.
    pub const PRECEDENCE: &str = "precedence";
    /// Documentation string.
    pub const DOC: &str = "doc";
    /// Display label.
    pub const LABEL: &str = "label";
    /// Hard `[lower, upper]` bounds.
    pub const BOUNDS: &str = "bounds";
    /// Suggested `[lower, upper]` bounds.
    pub const SOFTBOUNDS: &str = "softbounds";
    /// Whether each bound is inclusive.
    pub const INCLUSIVE_BOUNDS: &str = "inclusive_bounds";
    /// Suggested increment.
    pub const STEP: &str = "step";
    /// Allowed values of a selector.
    pub const OBJECTS: &str = "objects";
    /// Whether a selector rejects values outside its objects.
    pub const CHECK_ON_SET: &str = "check_on_set";
    /// Required class of an instance parameter.
    pub const CLASS: &str = "class_";
    /// Whether an instance parameter holds instances (or classes).
    pub const IS_INSTANCE: &str = "is_instance";

    /// Slots every kind carries.
    pub const BASE: &[&str] = &[
        DEFAULT,
        ALLOW_NONE,
        CONSTANT,
        READONLY,
        INSTANTIATE,
        PER_INSTANCE,
        PRECEDENCE,
        DOC,
        LABEL,
    ];

    /// Slots whose override never triggers re-validation of an inherited default.
    pub const NON_VALIDATED: &[&str] = &[LABEL, DOC, PRECEDENCE, CONSTANT];

    pub(crate) const NUMBER: &[&str] = &[
        DEFAULT,
        ALLOW_NONE,
        CONSTANT,
        READONLY,
        INSTANTIATE,
        PER_INSTANCE,
        PRECEDENCE,
        DOC,
        LABEL,
        BOUNDS,
        SOFTBOUNDS,
        INCLUSIVE_BOUNDS,
        STEP,
    ];

    pub(crate) const SELECTOR: &[&str] = &[
        DEFAULT,
        ALLOW_NONE,
        CONSTANT,
        READONLY,
        INSTANTIATE,
        PER_INSTANCE,
        PRECEDENCE,
        DOC,
        LABEL,
        OBJECTS,
        CHECK_ON_SET,
    ];

    pub(crate) const LIST: &[&str] = &[
        DEFAULT,
        ALLOW_NONE,
        CONSTANT,
        READONLY,
        INSTANTIATE,
        PER_INSTANCE,
        PRECEDENCE,
        DOC,
        LABEL,
        BOUNDS,
    ];

    pub(crate) const INSTANCE: &[&str] = &[
        DEFAULT,
        ALLOW_NONE,
        CONSTANT,
        READONLY,
        INSTANTIATE,
        PER_INSTANCE,
        PRECEDENCE,
        DOC,
        LABEL,
        CLASS,
        IS_INSTANCE,
    ];
}

/// Default for an undeclared slot.
#[derive(Clone)]
pub enum SlotDefault {
    /// A fixed value.
    Value(Value),
    /// Computed per descriptor, for mutable defaults such as empty lists.
    Computed(fn() -> Value),
}

impl SlotDefault {
    pub(crate) fn resolve(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for SlotDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// Inheritable table of slot defaults.
///
/// Kinds extend the table of the kind they refine:
///
/// ```rust
/// use reparam::{SlotDefaults, Value, slot};
///
/// let defaults = SlotDefaults::base().with(slot::DEFAULT, 0.0);
/// assert_eq!(defaults.value(slot::DEFAULT), Some(Value::Float(0.0)));
/// assert_eq!(defaults.value(slot::CONSTANT), Some(Value::Bool(false)));
/// ```
#[derive(Clone, Debug, Default)]
pub struct SlotDefaults {
    entries: Vec<(&'static str, SlotDefault)>,
}

impl SlotDefaults {
    /// Defaults for the slots every kind carries.
    #[must_use]
    pub fn base() -> Self {
        Self::default()
            .with(slot::DEFAULT, Value::None)
            .with(slot::ALLOW_NONE, false)
            .with(slot::CONSTANT, false)
            .with(slot::READONLY, false)
            .with(slot::INSTANTIATE, false)
            .with(slot::PER_INSTANCE, true)
            .with(slot::PRECEDENCE, Value::None)
            .with(slot::DOC, Value::None)
            .with(slot::LABEL, Value::None)
    }

    /// Sets or replaces the default of `slot`.
    #[must_use]
    pub fn with(self, slot: &'static str, value: impl Into<Value>) -> Self {
        self.set(slot, SlotDefault::Value(value.into()))
    }

    /// Sets or replaces the default of `slot` with a computed one.
    #[must_use]
    pub fn computed(self, slot: &'static str, f: fn() -> Value) -> Self {
        self.set(slot, SlotDefault::Computed(f))
    }

    /// Removes the default of `slot`.
    #[must_use]
    pub fn without(mut self, slot: &str) -> Self {
        self.entries.retain(|(name, _)| *name != slot);
        self
    }

    fn set(mut self, slot: &'static str, default: SlotDefault) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == slot) {
            entry.1 = default;
        } else {
            self.entries.push((slot, default));
        }
        self
    }

    /// The default entry for `slot`.
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&SlotDefault> {
        self.entries
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, d)| d)
    }

    /// The resolved default value for `slot`.
    #[must_use]
    pub fn value(&self, slot: &str) -> Option<Value> {
        self.get(slot).map(SlotDefault::resolve)
    }
}

/// A concrete parameter type.
///
/// Implementors supply the slot names they carry, defaults for those slots
/// and a validation hook. `lineage` lists the kind's own name followed by the
/// names of the kinds it refines; it drives the subtype check used when a
/// subclass redeclares a parameter with a different kind.
pub trait ParamKind: fmt::Debug + 'static {
    /// Name used in messages, e.g. `Number`.
    fn type_name(&self) -> &'static str;

    /// This kind's name followed by its ancestors, ending with `Parameter`.
    fn lineage(&self) -> &'static [&'static str];

    /// Slots carried by descriptors of this kind.
    fn slots(&self) -> &'static [&'static str] {
        slot::BASE
    }

    /// Defaults for undeclared slots.
    fn slot_defaults(&self) -> SlotDefaults {
        SlotDefaults::base()
    }

    /// Checks `value` against the constraints carried by `param`.
    ///
    /// `None` has already been accepted when the descriptor allows it.
    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        let _ = (value, param);
        Ok(())
    }

    /// Whether a [`Generator`](crate::Generator) value is evaluated on read.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Legal values, for kinds that enumerate them.
    fn range(&self, param: &Parameter) -> Option<Vec<Value>> {
        let _ = param;
        None
    }
}

/// Whether `kind` is `of` or refines it.
pub(crate) fn is_subtype(kind: &dyn ParamKind, of: &dyn ParamKind) -> bool {
    kind.lineage().contains(&of.type_name())
}

fn invalid(kind: &dyn ParamKind, param: &Parameter, message: String) -> ParamError {
    ParamError::InvalidValue {
        kind: kind.type_name(),
        param: param.qualified_name(),
        message,
    }
}

/// Untyped parameter accepting any value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Any;

impl ParamKind for Any {
    fn type_name(&self) -> &'static str {
        "Parameter"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["Parameter"]
    }
}

/// Boolean parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Boolean;

impl ParamKind for Boolean {
    fn type_name(&self) -> &'static str {
        "Boolean"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["Boolean", "Parameter"]
    }

    fn slot_defaults(&self) -> SlotDefaults {
        SlotDefaults::base().with(slot::DEFAULT, false)
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        match value {
            Value::Bool(_) => Ok(()),
            other => Err(invalid(
                self,
                param,
                format!("must be True or False, not {other}."),
            )),
        }
    }
}

/// String parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Str;

impl ParamKind for Str {
    fn type_name(&self) -> &'static str {
        "String"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["String", "Parameter"]
    }

    fn slot_defaults(&self) -> SlotDefaults {
        SlotDefaults::base().with(slot::DEFAULT, "")
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        match value {
            Value::Str(_) => Ok(()),
            other => Err(invalid(
                self,
                param,
                format!("only takes a string value, not value of {}.", other.type_name()),
            )),
        }
    }
}

fn bound_pair(value: Option<Value>) -> (Option<f64>, Option<f64>) {
    match value.as_ref().and_then(Value::as_list) {
        Some([lower, upper]) => (lower.as_float(), upper.as_float()),
        _ => (None, None),
    }
}

fn inclusive_pair(value: Option<Value>) -> (bool, bool) {
    match value.as_ref().and_then(Value::as_list) {
        Some([lower, upper]) => (
            lower.as_bool().unwrap_or(true),
            upper.as_bool().unwrap_or(true),
        ),
        _ => (true, true),
    }
}

fn check_bounds(
    kind: &dyn ParamKind,
    param: &Parameter,
    value: &Value,
    x: f64,
) -> Result<()> {
    let (lower, upper) = bound_pair(param.slot(slot::BOUNDS));
    let (incl_lower, incl_upper) = inclusive_pair(param.slot(slot::INCLUSIVE_BOUNDS));
    if let Some(lower) = lower {
        if incl_lower && x < lower {
            return Err(invalid(kind, param, format!("must be at least {lower}, not {value}.")));
        }
        if !incl_lower && x <= lower {
            return Err(invalid(kind, param, format!("must be greater than {lower}, not {value}.")));
        }
    }
    if let Some(upper) = upper {
        if incl_upper && x > upper {
            return Err(invalid(kind, param, format!("must be at most {upper}, not {value}.")));
        }
        if !incl_upper && x >= upper {
            return Err(invalid(kind, param, format!("must be less than {upper}, not {value}.")));
        }
    }
    Ok(())
}

fn number_defaults() -> SlotDefaults {
    SlotDefaults::base()
        .with(slot::DEFAULT, 0.0)
        .with(slot::BOUNDS, Value::None)
        .with(slot::SOFTBOUNDS, Value::None)
        .computed(slot::INCLUSIVE_BOUNDS, || Value::list([true, true]))
        .with(slot::STEP, Value::None)
}

/// Real-valued parameter with optional bounds.
///
/// A [`Generator`](crate::Generator) default makes the value dynamic.
#[derive(Clone, Copy, Debug, Default)]
pub struct Number;

impl ParamKind for Number {
    fn type_name(&self) -> &'static str {
        "Number"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["Number", "Dynamic", "Parameter"]
    }

    fn slots(&self) -> &'static [&'static str] {
        slot::NUMBER
    }

    fn slot_defaults(&self) -> SlotDefaults {
        number_defaults()
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        match value {
            Value::Int(_) | Value::Float(_) => {
                let x = value.as_float().unwrap_or_default();
                check_bounds(self, param, value, x)
            }
            other => Err(invalid(
                self,
                param,
                format!("only takes numeric values, not {}.", other.type_name()),
            )),
        }
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

/// Integer-valued parameter with optional bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct Integer;

impl ParamKind for Integer {
    fn type_name(&self) -> &'static str {
        "Integer"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["Integer", "Number", "Dynamic", "Parameter"]
    }

    fn slots(&self) -> &'static [&'static str] {
        slot::NUMBER
    }

    fn slot_defaults(&self) -> SlotDefaults {
        number_defaults().with(slot::DEFAULT, 0)
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        match value {
            Value::Int(_) => {
                let x = value.as_float().unwrap_or_default();
                check_bounds(self, param, value, x)
            }
            other => Err(invalid(
                self,
                param,
                format!("must be an integer, not {}.", other.type_name()),
            )),
        }
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

/// Parameter restricted to a list of allowed objects.
///
/// Without an explicit `check_on_set`, values are checked only when the
/// object list is non-empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct Selector;

impl ParamKind for Selector {
    fn type_name(&self) -> &'static str {
        "Selector"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["Selector", "SelectorBase", "Parameter"]
    }

    fn slots(&self) -> &'static [&'static str] {
        slot::SELECTOR
    }

    fn slot_defaults(&self) -> SlotDefaults {
        SlotDefaults::base()
            .computed(slot::OBJECTS, || Value::List(Vec::new()))
            .with(slot::CHECK_ON_SET, Value::None)
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        let objects = param.slot(slot::OBJECTS).unwrap_or_default();
        let objects = objects.as_list().unwrap_or_default();
        let check = param
            .slot(slot::CHECK_ON_SET)
            .and_then(|v| v.as_bool())
            .unwrap_or(!objects.is_empty());
        if !check || objects.iter().any(|o| o.is_equal(value)) {
            return Ok(());
        }
        let allowed = Value::List(objects.to_vec());
        Err(invalid(
            self,
            param,
            format!("does not accept {value}; valid options include: {allowed}"),
        ))
    }

    fn range(&self, param: &Parameter) -> Option<Vec<Value>> {
        param
            .slot(slot::OBJECTS)
            .and_then(|v| v.as_list().map(<[Value]>::to_vec))
    }
}

/// List parameter with optional length bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct List;

impl ParamKind for List {
    fn type_name(&self) -> &'static str {
        "List"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["List", "Parameter"]
    }

    fn slots(&self) -> &'static [&'static str] {
        slot::LIST
    }

    fn slot_defaults(&self) -> SlotDefaults {
        SlotDefaults::base()
            .computed(slot::DEFAULT, || Value::List(Vec::new()))
            .with(slot::INSTANTIATE, true)
            .with(slot::BOUNDS, Value::list([Value::Int(0), Value::None]))
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        let Some(items) = value.as_list() else {
            return Err(invalid(
                self,
                param,
                format!("must be a list, not {}.", value.type_name()),
            ));
        };
        let (min, max) = bound_pair(param.slot(slot::BOUNDS));
        let len = items.len() as f64;
        if min.is_some_and(|min| len < min) || max.is_some_and(|max| len > max) {
            let bounds = param.slot(slot::BOUNDS).unwrap_or_default();
            return Err(invalid(
                self,
                param,
                format!("length must be within {bounds}, not {}.", items.len()),
            ));
        }
        Ok(())
    }
}

/// Parameter holding an instance (or, with `is_instance = false`, a subclass)
/// of a given host class.
#[derive(Clone, Copy, Debug, Default)]
pub struct Instance;

impl ParamKind for Instance {
    fn type_name(&self) -> &'static str {
        "ClassSelector"
    }

    fn lineage(&self) -> &'static [&'static str] {
        &["ClassSelector", "SelectorBase", "Parameter"]
    }

    fn slots(&self) -> &'static [&'static str] {
        slot::INSTANCE
    }

    fn slot_defaults(&self) -> SlotDefaults {
        SlotDefaults::base()
            .with(slot::INSTANTIATE, true)
            .with(slot::CLASS, Value::None)
            .with(slot::IS_INSTANCE, true)
    }

    fn validate(&self, value: &Value, param: &Parameter) -> Result<()> {
        let Some(Value::Class(required)) = param.slot(slot::CLASS) else {
            return Ok(());
        };
        let is_instance = param
            .slot(slot::IS_INSTANCE)
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let ok = match (value, is_instance) {
            (Value::Object(obj), true) => obj.class().is_subclass_of(&required),
            (Value::Class(cls), false) => cls.is_subclass_of(&required),
            _ => false,
        };
        if ok {
            return Ok(());
        }
        let expected = if is_instance { "an instance" } else { "a subclass" };
        Err(invalid(
            self,
            param,
            format!("value must be {expected} of {}, not {value}.", required.name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lineage_drives_subtyping() {
        assert!(is_subtype(&Integer, &Number));
        assert!(is_subtype(&Number, &Any));
        assert!(!is_subtype(&Number, &Integer));
        assert!(!is_subtype(&Str, &Number));
    }

    #[test]
    fn defaults_extend_base() {
        let integer = Integer.slot_defaults();
        assert_eq!(integer.value(slot::DEFAULT), Some(Value::Int(0)));
        assert_eq!(integer.value(slot::PER_INSTANCE), Some(Value::Bool(true)));
        assert_eq!(
            integer.value(slot::INCLUSIVE_BOUNDS),
            Some(Value::list([true, true]))
        );
        assert!(SlotDefaults::base().without(slot::DOC).get(slot::DOC).is_none());
    }

    #[test]
    fn computed_defaults_are_fresh() {
        let defaults = List.slot_defaults();
        assert_eq!(defaults.value(slot::DEFAULT), Some(Value::List(Vec::new())));
        assert_eq!(defaults.value(slot::INSTANTIATE), Some(Value::Bool(true)));
    }
}
