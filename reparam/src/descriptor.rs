// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parameter declarations and resolved descriptors.
//!
//! A [`ParamDecl`] is what a class body writes: a kind plus the slots it
//! explicitly sets. When the class is built the declaration is resolved
//! against the ancestors that declare the same name, producing a
//! [`Parameter`] descriptor with every slot filled in.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::class::ParamClass;
use crate::dispatch;
use crate::error::{ParamError, Result};
use crate::event::Event;
use crate::kind::{self, ParamKind, slot};
use crate::owner::{Owner, WeakOwner};
use crate::store::ValueStore;
use crate::value::Value;
use crate::watcher::Watcher;

bitflags! {
    /// Boolean slots of a descriptor, cached for the set path.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u8 {
        /// Settable only until the owning instance is initialized.
        const CONSTANT = 1 << 0;
        /// Never settable.
        const READONLY = 1 << 1;
        /// Default is copied into each instance.
        const INSTANTIATE = 1 << 2;
        /// Instances get their own descriptor copy.
        const PER_INSTANCE = 1 << 3;
        /// `None` passes validation.
        const ALLOW_NONE = 1 << 4;
    }
}

const FLAG_SLOTS: [(&str, ParamFlags); 5] = [
    (slot::CONSTANT, ParamFlags::CONSTANT),
    (slot::READONLY, ParamFlags::READONLY),
    (slot::INSTANTIATE, ParamFlags::INSTANTIATE),
    (slot::PER_INSTANCE, ParamFlags::PER_INSTANCE),
    (slot::ALLOW_NONE, ParamFlags::ALLOW_NONE),
];

/// Declaration of a parameter in a class body.
///
/// # Example
///
/// ```rust
/// use reparam::{ParamDecl, slot};
///
/// let decl = ParamDecl::number()
///     .default(5.0)
///     .bounds(0.0, 10.0)
///     .doc("Gain applied to the input");
/// assert_eq!(decl.kind().type_name(), "Number");
/// assert!(decl.declares(slot::BOUNDS));
/// assert!(!decl.declares(slot::CONSTANT));
/// ```
#[derive(Clone)]
pub struct ParamDecl {
    kind: Rc<dyn ParamKind>,
    declared: ValueStore,
}

impl ParamDecl {
    /// A declaration of the given kind with no slots set.
    pub fn new(kind: impl ParamKind) -> Self {
        Self {
            kind: Rc::new(kind),
            declared: ValueStore::new(),
        }
    }

    /// Untyped parameter.
    #[must_use]
    pub fn any() -> Self {
        Self::new(kind::Any)
    }

    /// Boolean parameter.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(kind::Boolean)
    }

    /// Real-valued parameter.
    #[must_use]
    pub fn number() -> Self {
        Self::new(kind::Number)
    }

    /// Integer parameter.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(kind::Integer)
    }

    /// String parameter.
    #[must_use]
    pub fn string() -> Self {
        Self::new(kind::Str)
    }

    /// List parameter.
    #[must_use]
    pub fn list() -> Self {
        Self::new(kind::List)
    }

    /// Selector over `objects`.
    pub fn selector<I>(objects: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::new(kind::Selector).slot(slot::OBJECTS, Value::list(objects))
    }

    /// Parameter holding instances of `class` or its subclasses.
    #[must_use]
    pub fn instance_of(class: &ParamClass) -> Self {
        Self::new(kind::Instance).slot(slot::CLASS, class.clone())
    }

    /// Sets an arbitrary slot.
    #[must_use]
    pub fn slot(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.declared.insert(name, value.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(self, value: impl Into<Value>) -> Self {
        self.slot(slot::DEFAULT, value)
    }

    /// Sets the documentation string.
    #[must_use]
    pub fn doc(self, doc: &str) -> Self {
        self.slot(slot::DOC, doc)
    }

    /// Sets the display label.
    #[must_use]
    pub fn label(self, label: &str) -> Self {
        self.slot(slot::LABEL, label)
    }

    /// Sets the display precedence.
    #[must_use]
    pub fn precedence(self, precedence: f64) -> Self {
        self.slot(slot::PRECEDENCE, precedence)
    }

    /// Marks the parameter constant.
    #[must_use]
    pub fn constant(self, constant: bool) -> Self {
        self.slot(slot::CONSTANT, constant)
    }

    /// Marks the parameter read-only.
    #[must_use]
    pub fn readonly(self, readonly: bool) -> Self {
        self.slot(slot::READONLY, readonly)
    }

    /// Copies the default into every instance.
    #[must_use]
    pub fn instantiate(self, instantiate: bool) -> Self {
        self.slot(slot::INSTANTIATE, instantiate)
    }

    /// Controls whether instances get their own descriptor copy.
    #[must_use]
    pub fn per_instance(self, per_instance: bool) -> Self {
        self.slot(slot::PER_INSTANCE, per_instance)
    }

    /// Accepts `None` even with a non-`None` default.
    #[must_use]
    pub fn allow_none(self, allow_none: bool) -> Self {
        self.slot(slot::ALLOW_NONE, allow_none)
    }

    /// Sets hard bounds; `None` leaves a side open.
    #[must_use]
    pub fn bounds(self, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        self.slot(slot::BOUNDS, Value::List(vec![lower.into(), upper.into()]))
    }

    /// Sets soft bounds.
    #[must_use]
    pub fn softbounds(self, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        self.slot(slot::SOFTBOUNDS, Value::List(vec![lower.into(), upper.into()]))
    }

    /// Sets the suggested increment.
    #[must_use]
    pub fn step(self, step: impl Into<Value>) -> Self {
        self.slot(slot::STEP, step)
    }

    /// The parameter kind.
    #[must_use]
    pub fn kind(&self) -> &dyn ParamKind {
        &*self.kind
    }

    /// Whether `slot` was set explicitly.
    #[must_use]
    pub fn declares(&self, slot: &str) -> bool {
        self.declared.contains(slot)
    }

    pub(crate) fn kind_rc(&self) -> Rc<dyn ParamKind> {
        Rc::clone(&self.kind)
    }

    pub(crate) fn declared(&self) -> &ValueStore {
        &self.declared
    }
}

impl fmt::Debug for ParamDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDecl")
            .field("kind", &self.kind.type_name())
            .field("declared", &self.declared)
            .finish()
    }
}

/// A resolved parameter descriptor.
///
/// Descriptors are shared handles: clones refer to the same slots and
/// watcher lists. Class descriptors are created when the class is built;
/// instance copies are created on demand by
/// [`Parameterized::param_object`](crate::Parameterized::param_object) and
/// read their default through to the class descriptor until one is set on
/// the copy itself.
#[derive(Clone)]
pub struct Parameter {
    inner: Rc<ParamInner>,
}

struct ParamInner {
    name: Rc<str>,
    kind: Rc<dyn ParamKind>,
    owner: RefCell<WeakOwner>,
    owner_name: RefCell<String>,
    slots: RefCell<ValueStore>,
    flags: Cell<ParamFlags>,
    origin: Option<Parameter>,
    watchers: RefCell<HashMap<String, Vec<Watcher>>>,
}

fn flags_of(slots: impl Fn(&str) -> Option<Value>) -> ParamFlags {
    let mut flags = ParamFlags::empty();
    for (name, flag) in FLAG_SLOTS {
        if slots(name).and_then(|v| v.as_bool()).unwrap_or(false) {
            flags |= flag;
        }
    }
    flags
}

impl Parameter {
    pub(crate) fn resolved(
        name: &str,
        kind: Rc<dyn ParamKind>,
        slots: ValueStore,
        owner_name: &str,
    ) -> Self {
        let flags = flags_of(|s| slots.get(s).cloned());
        Self {
            inner: Rc::new(ParamInner {
                name: Rc::from(name),
                kind,
                owner: RefCell::default(),
                owner_name: RefCell::new(owner_name.into()),
                slots: RefCell::new(slots),
                flags: Cell::new(flags),
                origin: None,
                watchers: RefCell::default(),
            }),
        }
    }

    fn copy(&self, slots: ValueStore, origin: Option<Self>, owner: WeakOwner) -> Self {
        let watchers = if origin.is_some() {
            HashMap::new()
        } else {
            self.inner.watchers.borrow().clone()
        };
        Self {
            inner: Rc::new(ParamInner {
                name: Rc::clone(&self.inner.name),
                kind: Rc::clone(&self.inner.kind),
                owner: RefCell::new(owner),
                owner_name: RefCell::new(self.inner.owner_name.borrow().clone()),
                slots: RefCell::new(slots),
                flags: Cell::new(self.inner.flags.get()),
                origin,
                watchers: RefCell::new(watchers),
            }),
        }
    }

    /// Copy owned by an instance; the default keeps reading through to `self`.
    ///
    /// Watchers of the class descriptor are not carried over.
    pub(crate) fn instance_copy(&self, owner: WeakOwner) -> Self {
        let mut slots = self.inner.slots.borrow().clone();
        slots.remove(slot::DEFAULT);
        self.copy(slots, Some(self.clone()), owner)
    }

    /// Copy owned by a subclass that sets a value on an inherited descriptor.
    pub(crate) fn class_copy(&self, owner: WeakOwner, owner_name: &str) -> Self {
        let copy = self.copy(self.inner.slots.borrow().clone(), None, owner);
        *copy.inner.owner_name.borrow_mut() = owner_name.into();
        copy
    }

    pub(crate) fn set_owner(&self, owner: WeakOwner) {
        *self.inner.owner.borrow_mut() = owner;
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Parameter kind.
    #[must_use]
    pub fn kind(&self) -> &dyn ParamKind {
        &*self.inner.kind
    }

    /// Class or instance owning this descriptor, while it is alive.
    #[must_use]
    pub fn owner(&self) -> Option<Owner> {
        self.inner.owner.borrow().upgrade()
    }

    /// `Class.name`, as used in messages.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.inner.owner_name.borrow(), self.inner.name)
    }

    /// Current value of `slot`.
    #[must_use]
    pub fn slot(&self, slot: &str) -> Option<Value> {
        self.own_slot(slot)
            .or_else(|| self.inner.origin.as_ref().and_then(|o| o.slot(slot)))
    }

    /// Slot set on this descriptor itself, not read through from its origin.
    pub(crate) fn own_slot(&self, slot: &str) -> Option<Value> {
        self.inner.slots.borrow().get(slot).cloned()
    }

    /// Changes a slot and notifies watchers registered on it.
    ///
    /// Changing `default` never notifies.
    pub fn set_slot(&self, slot: &str, value: impl Into<Value>) -> Result<()> {
        if !self.kind().slots().contains(&slot) {
            return Err(ParamError::UnknownSlot {
                slot: slot.into(),
                param: self.qualified_name(),
                kind: self.kind().type_name(),
            });
        }
        let value = value.into();
        let old = self.slot(slot);
        self.inner.slots.borrow_mut().insert(slot, value.clone());
        if FLAG_SLOTS.iter().any(|(name, _)| *name == slot) {
            self.inner.flags.set(flags_of(|s| self.slot(s)));
        }
        if slot == slot::DEFAULT {
            return Ok(());
        }
        let Some(old) = old else {
            return Ok(());
        };
        let watchers = self.watchers(slot);
        if watchers.is_empty() {
            return Ok(());
        }
        let Some(owner) = self.owner() else {
            return Ok(());
        };
        let event = Event::new(owner.clone(), self.name(), slot, old, value, false);
        dispatch::notify(&owner, watchers, event)
    }

    pub(crate) fn set_default_silent(&self, value: Value) {
        self.inner.slots.borrow_mut().insert(slot::DEFAULT, value);
    }

    pub(crate) fn set_constant_silent(&self, constant: bool) {
        self.inner
            .slots
            .borrow_mut()
            .insert(slot::CONSTANT, Value::Bool(constant));
        let mut flags = self.inner.flags.get();
        flags.set(ParamFlags::CONSTANT, constant);
        self.inner.flags.set(flags);
    }

    /// Default value.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.slot(slot::DEFAULT).unwrap_or_default()
    }

    /// Cached boolean slots.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> ParamFlags {
        self.inner.flags.get()
    }

    /// Whether the parameter is constant (read-only implies constant).
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.flags().contains(ParamFlags::CONSTANT)
    }

    /// Whether the parameter is read-only.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.flags().contains(ParamFlags::READONLY)
    }

    /// Whether the default is copied into each instance.
    #[must_use]
    pub fn instantiate(&self) -> bool {
        self.flags().contains(ParamFlags::INSTANTIATE)
    }

    /// Whether instances get their own descriptor copy.
    #[must_use]
    pub fn per_instance(&self) -> bool {
        self.flags().contains(ParamFlags::PER_INSTANCE)
    }

    /// Whether `None` passes validation.
    #[must_use]
    pub fn allow_none(&self) -> bool {
        self.flags().contains(ParamFlags::ALLOW_NONE)
    }

    /// Display precedence.
    #[must_use]
    pub fn precedence(&self) -> Option<f64> {
        self.slot(slot::PRECEDENCE).and_then(|v| v.as_float())
    }

    /// Documentation string.
    #[must_use]
    pub fn doc(&self) -> Option<String> {
        self.slot(slot::DOC).and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Display label, derived from the name when unset.
    ///
    /// ```rust
    /// use reparam::{ClassBuilder, ParamDecl};
    ///
    /// let cls = ClassBuilder::new("P")
    ///     .param("line_width", ParamDecl::number())
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(cls.param("line_width").unwrap().label(), "Line width");
    /// ```
    #[must_use]
    pub fn label(&self) -> String {
        match self.slot(slot::LABEL) {
            Some(Value::Str(label)) => label,
            _ => default_label(self.name()),
        }
    }

    /// Runs the kind's validation hook, accepting `None` when allowed.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_none() && self.allow_none() {
            return Ok(());
        }
        if matches!(value, Value::Generator(_)) && self.kind().is_dynamic() {
            return Ok(());
        }
        self.kind().validate(value, self)
    }

    /// Legal values, for kinds that enumerate them.
    #[must_use]
    pub fn range(&self) -> Option<Vec<Value>> {
        self.kind().range(self)
    }

    /// Whether both handles refer to the same descriptor.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn add_watcher(&self, what: &str, watcher: Watcher) {
        self.inner
            .watchers
            .borrow_mut()
            .entry(what.into())
            .or_default()
            .push(watcher);
    }

    pub(crate) fn remove_watcher(&self, what: &str, watcher: &Watcher) -> bool {
        let mut watchers = self.inner.watchers.borrow_mut();
        let Some(list) = watchers.get_mut(what) else {
            return false;
        };
        match list.iter().position(|w| w.ptr_eq(watcher)) {
            Some(i) => {
                list.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn watchers(&self, what: &str) -> Vec<Watcher> {
        self.inner
            .watchers
            .borrow()
            .get(what)
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.inner.name)
            .field("kind", &self.kind().type_name())
            .field("owner", &self.inner.owner_name.borrow())
            .field("flags", &self.flags())
            .finish_non_exhaustive()
    }
}

/// Underscores become spaces and the first letter is capitalised.
pub(crate) fn default_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ordered `name → descriptor` map.
///
/// Order is declaration order, root class first.
#[derive(Clone, Default)]
pub struct ParamMap {
    entries: Vec<Parameter>,
    index: HashMap<Rc<str>, usize>,
}

impl ParamMap {
    /// Inserts or replaces by name; a replaced entry keeps its position.
    pub(crate) fn insert(&mut self, param: Parameter) {
        if let Some(&i) = self.index.get(param.name()) {
            self.entries[i] = param;
        } else {
            self.index
                .insert(Rc::clone(&param.inner.name), self.entries.len());
            self.entries.push(param);
        }
    }

    /// Descriptor named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Whether `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors in order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> + '_ {
        self.entries.iter()
    }

    /// Names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(Parameter::name)
    }
}

impl<'a> IntoIterator for &'a ParamMap {
    type Item = &'a Parameter;
    type IntoIter = core::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Debug for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(slots: &[(&str, Value)]) -> Parameter {
        let kind: Rc<dyn ParamKind> = Rc::new(kind::Number);
        let mut resolved = ValueStore::new();
        let defaults = kind.slot_defaults();
        for name in kind.slots() {
            if let Some(value) = defaults.value(name) {
                resolved.insert(name, value);
            }
        }
        for (name, value) in slots {
            resolved.insert(name, value.clone());
        }
        Parameter::resolved("x", kind, resolved, "P")
    }

    #[test]
    fn labels_from_names() {
        assert_eq!(default_label("line_width"), "Line width");
        assert_eq!(default_label("x"), "X");
        assert_eq!(default_label(""), "");
    }

    #[test]
    fn number_bounds_are_checked() {
        let p = number(&[(slot::BOUNDS, Value::list([Value::Int(0), Value::Int(10)]))]);
        assert!(p.validate(&Value::Float(5.0)).is_ok());
        assert!(p.validate(&Value::Int(10)).is_ok());

        let err = p.validate(&Value::Int(15)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Number parameter 'P.x' must be at most 10, not 15."
        );
        assert!(p.validate(&Value::from("x")).is_err());
        assert!(p.validate(&Value::None).is_err());
    }

    #[test]
    fn exclusive_bounds() {
        let p = number(&[
            (slot::BOUNDS, Value::list([Value::Int(0), Value::None])),
            (slot::INCLUSIVE_BOUNDS, Value::list([false, true])),
        ]);
        assert!(p.validate(&Value::Float(0.0)).is_err());
        assert!(p.validate(&Value::Float(0.1)).is_ok());
    }

    #[test]
    fn allow_none_short_circuits() {
        let p = number(&[(slot::ALLOW_NONE, Value::Bool(true))]);
        assert!(p.allow_none());
        assert!(p.validate(&Value::None).is_ok());
    }

    #[test]
    fn set_slot_updates_flags() {
        let p = number(&[]);
        assert!(!p.is_constant());
        p.set_slot(slot::CONSTANT, true).unwrap();
        assert!(p.is_constant());
        p.set_constant_silent(false);
        assert!(!p.is_constant());
        assert!(matches!(
            p.set_slot("nonexistent", 1),
            Err(ParamError::UnknownSlot { .. })
        ));
    }

    #[test]
    fn instance_copy_reads_default_through() {
        let class_param = number(&[(slot::DEFAULT, Value::Float(1.0))]);
        let copy = class_param.instance_copy(WeakOwner::default());
        assert_eq!(copy.default_value(), Value::Float(1.0));

        class_param.set_default_silent(Value::Float(2.0));
        assert_eq!(copy.default_value(), Value::Float(2.0));

        copy.set_slot(slot::BOUNDS, Value::list([Value::Int(0), Value::Int(1)]))
            .unwrap();
        assert!(class_param.slot(slot::BOUNDS).is_some_and(|b| b.is_none()));
    }

    #[test]
    fn param_map_keeps_first_position() {
        let mut map = ParamMap::default();
        let a = number(&[]);
        map.insert(a.clone());
        let b = a.class_copy(WeakOwner::default(), "Q");
        map.insert(b.clone());
        assert_eq!(map.len(), 1);
        assert!(map.get("x").is_some_and(|p| p.ptr_eq(&b)));
        assert_eq!(b.qualified_name(), "Q.x");
    }
}
