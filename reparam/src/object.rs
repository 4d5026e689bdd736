// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host instances and the value set path.
//!
//! A value is looked up in three tiers: the instance's own store, then the
//! default of the instance's descriptor copy, then the class default. Sets
//! validate first, then check the `readonly` and `constant` tiers, store,
//! re-resolve nested dependencies rooted at the parameter and finally notify
//! the value watchers.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::batch;
use crate::class::{NAME, ParamClass};
use crate::depends::{self, DependencyInfo, Intermediate};
use crate::descriptor::{ParamMap, Parameter};
use crate::dispatch::{self, DispatchState, FrameKind};
use crate::error::{ParamError, Result};
use crate::event::Event;
use crate::kind::slot;
use crate::owner::{Owner, WeakOwner};
use crate::rebind::{self, DynamicWatcher};
use crate::store::ValueStore;
use crate::value::Value;
use crate::watcher::{self, VALUE, WatchBuilder, Watcher};

/// Which descriptors [`Parameterized::objects`] returns.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Objects {
    /// Class-level descriptors only.
    Class,
    /// Per-instance descriptors, created where missing.
    #[default]
    Instance,
    /// Class-level descriptors overlaid with the instance copies that
    /// already exist; nothing is created.
    Existing,
}

/// An instance of a [`ParamClass`].
///
/// Handles are reference counted; clones refer to the same instance.
///
/// # Example
///
/// ```rust
/// use reparam::{ClassBuilder, ParamDecl, Value};
///
/// let cls = ClassBuilder::new("Filter")
///     .param("cutoff", ParamDecl::number().default(100.0).bounds(0.0, None::<f64>))
///     .build()
///     .unwrap();
/// let filter = cls.instance().with("cutoff", 250.0).build().unwrap();
///
/// assert_eq!(filter.get("cutoff").unwrap(), Value::Float(250.0));
/// assert!(filter.set("cutoff", -1.0).is_err());
/// assert!(filter.name().starts_with("Filter"));
/// ```
#[derive(Clone)]
pub struct Parameterized {
    inner: Rc<InstanceInner>,
}

struct InstanceInner {
    class: ParamClass,
    state: RefCell<InstanceState>,
    dispatch: RefCell<DispatchState>,
}

#[derive(Default)]
struct InstanceState {
    initialized: bool,
    values: ValueStore,
    params: HashMap<String, Parameter>,
    watchers: HashMap<String, Vec<Watcher>>,
    dynamic: HashMap<String, Vec<DynamicWatcher>>,
}

/// Non-owning handle to an instance.
#[derive(Clone, Debug)]
pub(crate) struct WeakParameterized(Weak<InstanceInner>);

impl WeakParameterized {
    pub(crate) fn upgrade(&self) -> Option<Parameterized> {
        self.0.upgrade().map(|inner| Parameterized { inner })
    }
}

/// Collects constructor values for an instance.
#[must_use = "the instance is only created by `build`"]
#[derive(Debug)]
pub struct InstanceBuilder {
    class: ParamClass,
    values: Vec<(String, Value)>,
}

impl InstanceBuilder {
    pub(crate) fn new(class: &ParamClass) -> Self {
        Self {
            class: class.clone(),
            values: Vec::new(),
        }
    }

    /// Sets `name` during construction.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Creates and initializes the instance.
    pub fn build(self) -> Result<Parameterized> {
        let obj = Parameterized::uninitialized(&self.class);
        obj.initialize(self.values)?;
        Ok(obj)
    }
}

fn generated_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect()
}

impl Parameterized {
    /// An instance whose construction has not finished.
    ///
    /// Values set before [`initialize`](Self::initialize) are buffered
    /// without notifying anyone; watching, triggering and descriptor lookups
    /// fail until then.
    #[must_use]
    pub fn uninitialized(class: &ParamClass) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                class: class.clone(),
                state: RefCell::default(),
                dispatch: RefCell::default(),
            }),
        }
    }

    /// Finishes construction: copies instantiated and constant defaults,
    /// applies `values`, then installs the watchers of dependent methods and
    /// runs those declared `on_init`.
    ///
    /// Unknown names are rejected before any value is applied.
    pub fn initialize<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = batch::pairs(values);
        if self.is_initialized() {
            return Err(ParamError::AlreadyInitialized {
                owner: self.to_string(),
            });
        }
        let class = self.class();
        if let Some((name, _)) = values.iter().find(|(n, _)| class.param(n).is_none()) {
            return Err(ParamError::UnexpectedKeyword {
                class: class.name().into(),
                name: name.clone(),
            });
        }

        for param in class.objects().iter() {
            let name = param.name();
            let skip = name == NAME
                || values.iter().any(|(n, _)| n == name)
                || self.inner.state.borrow().values.contains(name);
            if skip {
                continue;
            }
            let value = if param.instantiate() {
                param.default_value().deep_copy()?
            } else if param.is_constant() {
                param.default_value()
            } else {
                continue;
            };
            self.inner.state.borrow_mut().values.insert(name, value);
        }
        for (name, value) in values {
            self.set(&name, value)?;
        }

        self.inner.state.borrow_mut().initialized = true;
        rebind::update_deps(self, None, true)
    }

    /// The class of this instance.
    #[must_use]
    pub fn class(&self) -> ParamClass {
        self.inner.class.clone()
    }

    /// Identity string; generated as `{Class}{5 characters}` on first use
    /// unless set explicitly or given a class-level default.
    #[must_use]
    pub fn name(&self) -> String {
        if let Some(Value::Str(name)) = self.inner.state.borrow().values.get(NAME) {
            return name.clone();
        }
        if let Some(Value::Str(name)) = self.inner.class.param(NAME).map(|p| p.default_value()) {
            return name;
        }
        let generated = format!("{}{}", self.inner.class.name(), generated_suffix());
        self.inner
            .state
            .borrow_mut()
            .values
            .insert(NAME, Value::Str(generated.clone()));
        generated
    }

    /// Current value of `name`; dynamic values are produced on read.
    pub fn get(&self, name: &str) -> Result<Value> {
        if name == NAME {
            return Ok(Value::Str(self.name()));
        }
        match self.raw_value(name)? {
            Value::Generator(generator) if self.is_dynamic(name) => {
                Ok(generator.produce(self.inner.class.config().current_time(), false))
            }
            other => Ok(other),
        }
    }

    fn is_dynamic(&self, name: &str) -> bool {
        self.effective_param(name)
            .is_some_and(|p| p.kind().is_dynamic())
    }

    /// Stored value, without producing dynamic values.
    pub(crate) fn raw_value(&self, name: &str) -> Result<Value> {
        {
            let state = self.inner.state.borrow();
            if let Some(value) = state.values.get(name) {
                return Ok(value.clone());
            }
            if let Some(value) = state.params.get(name).and_then(|p| p.own_slot(slot::DEFAULT)) {
                return Ok(value);
            }
        }
        match self.inner.class.param(name) {
            Some(param) => Ok(param.default_value()),
            None => Err(self.unknown(name)),
        }
    }

    /// The last value a dynamic parameter produced, without producing a new one.
    pub fn inspect_value(&self, name: &str) -> Result<Value> {
        Ok(match self.raw_value(name)? {
            Value::Generator(generator) => generator
                .last()
                .unwrap_or(Value::Generator(generator)),
            other => other,
        })
    }

    /// Produces a new dynamic value even if the time has not advanced.
    pub fn force_new_dynamic_value(&self, name: &str) -> Result<Value> {
        match self.raw_value(name)? {
            Value::Generator(generator) if self.is_dynamic(name) => {
                Ok(generator.produce(self.inner.class.config().current_time(), true))
            }
            other => Ok(other),
        }
    }

    /// Sets `name` on this instance.
    ///
    /// Fails without storing anything when validation fails, when the
    /// parameter is read-only, or when it is constant and the instance is
    /// initialized (re-setting the identical value is allowed).
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let param = self
            .effective_param(name)
            .ok_or_else(|| self.unknown(name))?;
        param.validate(&value)?;
        if param.is_readonly() {
            return Err(ParamError::ReadOnly { name: name.into() });
        }
        let initialized = self.is_initialized();
        if !initialized {
            self.inner.state.borrow_mut().values.insert(name, value);
            return Ok(());
        }
        let old = self.raw_value(name)?;
        if param.is_constant() && !value.identical(&old) {
            return Err(ParamError::Constant { name: name.into() });
        }
        self.inner
            .state
            .borrow_mut()
            .values
            .insert(name, value.clone());

        // Nested dependencies may fail to resolve against the new value.
        if let Err(err) = rebind::update_deps(self, Some(name), false) {
            self.inner.state.borrow_mut().values.insert(name, old);
            rebind::update_deps(self, Some(name), false)?;
            return Err(err);
        }
        let owner = Owner::Instance(self.clone());
        let event = Event::new(owner.clone(), name, VALUE, old, value, false);
        dispatch::notify(&owner, self.value_watchers(name), event)
    }

    /// Sets several values, notifying each watcher once with all its events.
    ///
    /// Every name is checked (and every value validated) before anything
    /// is stored.
    pub fn update<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        batch::update(&Owner::Instance(self.clone()), batch::pairs(values))
    }

    /// Applies `values`, runs `f`, then restores the previous values.
    ///
    /// The restore happens (as a second batch) even when `f` fails.
    pub fn update_scoped<I, K, V, R>(&self, values: I, f: impl FnOnce(&Self) -> Result<R>) -> Result<R>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        batch::update_scoped(&Owner::Instance(self.clone()), batch::pairs(values), || f(self))
    }

    /// Fires `triggered` events for `names` without changing them.
    pub fn trigger<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        batch::trigger(&Owner::Instance(self.clone()), names)
    }

    /// Starts a watcher registration on `names`.
    pub fn watcher<I, S>(&self, names: I) -> WatchBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WatchBuilder::new(Owner::Instance(self.clone()), names)
    }

    /// Watches value changes of `names` with default options.
    pub fn watch<I, S>(
        &self,
        names: I,
        f: impl Fn(&[Event]) -> Result<()> + 'static,
    ) -> Result<Watcher>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watcher(names).call(f)
    }

    /// Watches value changes of `names`, receiving `(name, new value)` pairs.
    pub fn watch_values<I, S>(
        &self,
        names: I,
        f: impl Fn(&[(String, Value)]) -> Result<()> + 'static,
    ) -> Result<Watcher>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watcher(names).call_values(f)
    }

    /// Removes `watcher`; an unknown watcher only warns unless strict.
    pub fn unwatch(&self, watcher: &Watcher) -> Result<()> {
        watcher::unwatch(&Owner::Instance(self.clone()), watcher)
    }

    /// Descriptor of `name` for this instance.
    ///
    /// Parameters with `per_instance` get a private copy on first lookup;
    /// others return the class descriptor.
    pub fn param_object(&self, name: &str) -> Result<Parameter> {
        if !self.is_initialized() {
            return Err(ParamError::NotInitialized {
                action: "Looking up instance Parameter objects",
                owner: self.to_string(),
            });
        }
        let class_param = self
            .inner
            .class
            .param(name)
            .ok_or_else(|| self.unknown(name))?;
        if !class_param.per_instance() {
            return Ok(class_param);
        }
        if let Some(existing) = self.existing_param(name) {
            return Ok(existing);
        }
        let copy = class_param.instance_copy(WeakOwner::Instance(self.downgrade()));
        self.inner
            .state
            .borrow_mut()
            .params
            .insert(name.into(), copy.clone());
        Ok(copy)
    }

    /// Descriptors of this instance.
    pub fn objects(&self, which: Objects) -> Result<ParamMap> {
        let class_map = self.inner.class.objects();
        let mut map = (*class_map).clone();
        match which {
            Objects::Class => {}
            Objects::Instance => {
                for name in class_map.names() {
                    map.insert(self.param_object(name)?);
                }
            }
            Objects::Existing => {
                let existing: Vec<Parameter> =
                    self.inner.state.borrow().params.values().cloned().collect();
                for param in existing {
                    map.insert(param);
                }
            }
        }
        Ok(map)
    }

    /// Every current value, in declaration order.
    pub fn values(&self) -> Result<Vec<(String, Value)>> {
        let class_map = self.inner.class.objects();
        class_map
            .names()
            .map(|name| Ok((name.to_owned(), self.get(name)?)))
            .collect()
    }

    /// Resolved dependencies of `method`, including those reaching through
    /// sub-objects as they are currently bound.
    pub fn params_depended_on(
        &self,
        method: &str,
        intermediate: Intermediate,
    ) -> Result<Vec<DependencyInfo>> {
        let owner = Owner::Instance(self.clone());
        let (mut deps, pending) = depends::collect(&owner, method, false, intermediate)?;
        for spec in &pending {
            deps.extend(depends::resolve_pending(&owner, spec, intermediate)?);
        }
        Ok(deps)
    }

    /// Calls the method `name` declared on the class.
    pub fn call_method(&self, name: &str) -> Result<()> {
        rebind::invoke(self, name)
    }

    /// Runs `f` with notifications batched until it returns.
    pub fn batch_call_watchers<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        dispatch::scoped(&Owner::Instance(self.clone()), FrameKind::Scope, || f(self))
    }

    /// Runs `f` and drops every notification it would have caused.
    pub fn discard_events<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        dispatch::scoped(&Owner::Instance(self.clone()), FrameKind::Discard, || f(self))
    }

    /// Runs `f` with every constant parameter temporarily settable.
    ///
    /// ```rust
    /// use reparam::{ClassBuilder, ParamDecl, Value};
    ///
    /// let cls = ClassBuilder::new("P")
    ///     .param("c", ParamDecl::integer().constant(true))
    ///     .build()
    ///     .unwrap();
    /// let obj = cls.instance().build().unwrap();
    /// assert!(obj.set("c", 1).is_err());
    /// obj.edit_constant(|obj| obj.set("c", 1)).unwrap();
    /// assert_eq!(obj.get("c").unwrap(), Value::Int(1));
    /// assert!(obj.set("c", 2).is_err());
    /// ```
    pub fn edit_constant<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let constants: Vec<Parameter> = self
            .objects(Objects::Existing)?
            .iter()
            .filter(|p| p.is_constant() && !p.is_readonly())
            .cloned()
            .collect();
        for param in &constants {
            param.set_constant_silent(false);
        }
        let result = f(self);
        for param in &constants {
            param.set_constant_silent(true);
        }
        result
    }

    /// A new, initialized instance of the same class holding copies of this
    /// instance's values. The name is not copied.
    pub fn deep_copy(&self) -> Result<Self> {
        let values: Vec<(String, Value)> = self
            .inner
            .state
            .borrow()
            .values
            .iter()
            .filter(|(name, _)| *name != NAME)
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect();
        let copy = Self::uninitialized(&self.inner.class);
        for (name, value) in values {
            let value = value.deep_copy()?;
            copy.inner.state.borrow_mut().values.insert(&name, value);
        }
        copy.initialize(Vec::<(String, Value)>::new())?;
        Ok(copy)
    }

    /// Instance copy of `name`, if one has been created.
    pub(crate) fn existing_param(&self, name: &str) -> Option<Parameter> {
        self.inner.state.borrow().params.get(name).cloned()
    }

    /// The descriptor governing sets of `name`.
    pub(crate) fn effective_param(&self, name: &str) -> Option<Parameter> {
        self.existing_param(name)
            .or_else(|| self.inner.class.param(name))
    }

    pub(crate) fn value_watchers(&self, name: &str) -> Vec<Watcher> {
        self.inner
            .state
            .borrow()
            .watchers
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn add_value_watcher(&self, name: &str, watcher: Watcher) {
        self.inner
            .state
            .borrow_mut()
            .watchers
            .entry(name.into())
            .or_default()
            .push(watcher);
    }

    pub(crate) fn remove_value_watcher(&self, name: &str, watcher: &Watcher) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let Some(list) = state.watchers.get_mut(name) else {
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

    pub(crate) fn push_dynamic_watcher(&self, method: &str, watcher: DynamicWatcher) {
        self.inner
            .state
            .borrow_mut()
            .dynamic
            .entry(method.into())
            .or_default()
            .push(watcher);
    }

    /// Removes the nested-dependency watchers of `method` hanging off `root`,
    /// or all of them.
    pub(crate) fn take_dynamic_watchers(
        &self,
        method: &str,
        root: Option<&str>,
    ) -> Vec<DynamicWatcher> {
        let mut state = self.inner.state.borrow_mut();
        let Some(list) = state.dynamic.get_mut(method) else {
            return Vec::new();
        };
        let (taken, kept): (Vec<_>, Vec<_>) = core::mem::take(list)
            .into_iter()
            .partition(|w| root.is_none_or(|root| w.root == root));
        *list = kept;
        taken
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.inner.state.borrow().initialized
    }

    pub(crate) fn dispatch_state(&self) -> &RefCell<DispatchState> {
        &self.inner.dispatch
    }

    pub(crate) fn downgrade(&self) -> WeakParameterized {
        WeakParameterized(Rc::downgrade(&self.inner))
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).addr()
    }

    fn unknown(&self, name: &str) -> ParamError {
        ParamError::UnknownParameter {
            name: name.into(),
            owner: self.to_string(),
        }
    }

    /// Whether both handles refer to the same instance.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for Parameterized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(name='{}')", self.inner.class.name(), self.name())
    }
}

impl fmt::Debug for Parameterized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameterized")
            .field("class", &self.inner.class.name())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
