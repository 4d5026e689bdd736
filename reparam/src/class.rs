// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host classes: parameter registries built from declarations.
//!
//! A [`ClassBuilder`] collects parameter declarations, dependent methods and
//! bases, then [`ClassBuilder::build`] linearizes the bases, resolves every
//! declaration against the ancestors declaring the same name, validates the
//! resulting defaults and computes the list of watched methods. The result is
//! a [`ParamClass`] handle, cheap to clone.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::batch;
use crate::config::Config;
use crate::depends::{
    self, DependencyInfo, Depends, Intermediate, Method, MethodBody, WatchMode, WatchedMethod,
};
use crate::descriptor::{ParamDecl, ParamMap, Parameter};
use crate::dispatch::{self, DispatchState};
use crate::error::{ParamError, Result};
use crate::event::Event;
use crate::executor::AsyncTask;
use crate::kind::{self, slot};
use crate::mro;
use crate::object::{InstanceBuilder, Parameterized};
use crate::owner::{Owner, WeakOwner};
use crate::store::ValueStore;
use crate::value::Value;
use crate::watcher::{self, VALUE, WatchBuilder, Watcher};

/// Name of the reserved identity parameter.
pub(crate) const NAME: &str = "name";

thread_local! {
    /// Bumped whenever any class changes its own descriptor list.
    static GENERATION: Cell<u64> = const { Cell::new(0) };
}

fn bump_generation() {
    GENERATION.with(|g| g.set(g.get() + 1));
}

fn current_generation() -> u64 {
    GENERATION.with(Cell::get)
}

/// A host class: named, with bases, parameters and dependent methods.
///
/// # Example
///
/// ```rust
/// use reparam::{ClassBuilder, ParamDecl, Value};
///
/// let base = ClassBuilder::new("Base")
///     .param("gain", ParamDecl::number().default(1.0).bounds(0.0, 10.0))
///     .build()
///     .unwrap();
/// let derived = ClassBuilder::new("Derived")
///     .base(&base)
///     .param("gain", ParamDecl::number().doc("Overridden doc"))
///     .build()
///     .unwrap();
///
/// // Unset slots come from the nearest ancestor declaring the parameter.
/// let gain = derived.param("gain").unwrap();
/// assert_eq!(gain.default_value(), Value::Float(1.0));
/// assert_eq!(gain.doc().as_deref(), Some("Overridden doc"));
/// assert!(derived.is_subclass_of(&base));
/// ```
#[derive(Clone)]
pub struct ParamClass {
    inner: Rc<ClassInner>,
}

struct ClassInner {
    name: String,
    bases: Vec<ParamClass>,
    /// Linearization without the class itself.
    ancestors: Vec<ParamClass>,
    own: RefCell<Vec<Parameter>>,
    methods: Vec<Rc<Method>>,
    watched: OnceCell<Vec<WatchedMethod>>,
    config: Config,
    dispatch: RefCell<DispatchState>,
    cache: RefCell<Option<(u64, Rc<ParamMap>)>>,
}

/// Non-owning handle to a class.
#[derive(Clone, Debug)]
pub(crate) struct WeakParamClass(Weak<ClassInner>);

impl WeakParamClass {
    pub(crate) fn upgrade(&self) -> Option<ParamClass> {
        self.0.upgrade().map(|inner| ParamClass { inner })
    }
}

/// Declares a class.
#[must_use = "the class is only created by `build`"]
pub struct ClassBuilder {
    name: String,
    bases: Vec<ParamClass>,
    params: Vec<(String, ParamDecl)>,
    methods: Vec<(String, Depends, MethodBody)>,
    config: Option<Config>,
}

impl ClassBuilder {
    /// Starts a class named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            params: Vec::new(),
            methods: Vec::new(),
            config: None,
        }
    }

    /// Appends a base class.
    pub fn base(mut self, base: &ParamClass) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Declares a parameter; redeclaring a name replaces the declaration.
    pub fn param(mut self, name: &str, decl: ParamDecl) -> Self {
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = decl,
            None => self.params.push((name.into(), decl)),
        }
        self
    }

    /// Declares a method with its dependencies.
    pub fn method(
        mut self,
        name: &str,
        depends: Depends,
        f: impl Fn(&Parameterized) -> Result<()> + 'static,
    ) -> Self {
        self.push_method(name, depends, MethodBody::Sync(Rc::new(f)));
        self
    }

    /// Declares a method whose body runs on the installed async executor.
    pub fn async_method(
        mut self,
        name: &str,
        depends: Depends,
        f: impl Fn(&Parameterized) -> AsyncTask + 'static,
    ) -> Self {
        self.push_method(name, depends, MethodBody::Async(Rc::new(f)));
        self
    }

    fn push_method(&mut self, name: &str, depends: Depends, body: MethodBody) {
        self.methods.retain(|(n, ..)| n != name);
        self.methods.push((name.into(), depends, body));
    }

    /// Attaches a configuration; otherwise the first configured base's is used.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Resolves the declarations and creates the class.
    pub fn build(self) -> Result<ParamClass> {
        let Self {
            name,
            bases,
            mut params,
            methods,
            config,
        } = self;

        let mut seqs: Vec<Vec<ParamClass>> = bases.iter().map(ParamClass::mro).collect();
        seqs.push(bases.clone());
        let ancestors = mro::c3(seqs, ParamClass::ptr_eq).ok_or_else(|| {
            ParamError::InconsistentHierarchy {
                class: name.clone(),
                bases: join_names(&bases),
            }
        })?;

        if bases.is_empty() && !params.iter().any(|(n, _)| n == NAME) {
            params.insert(
                0,
                (NAME.into(), ParamDecl::string().default(Value::None).constant(true)),
            );
        }

        let methods = methods
            .into_iter()
            .map(|(method, depends, body)| -> Result<Rc<Method>> {
                Ok(Rc::new(Method {
                    specs: depends.parse()?,
                    watch: depends.mode(),
                    on_init: depends.runs_on_init(),
                    name: method,
                    body,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let own = params
            .iter()
            .map(|(param, decl)| resolve_param(&name, &ancestors, param, decl))
            .collect::<Result<Vec<_>>>()?;

        let config = config
            .or_else(|| bases.first().map(|b| b.config().clone()))
            .unwrap_or_default();

        let cls = ParamClass {
            inner: Rc::new(ClassInner {
                name,
                bases,
                ancestors,
                own: RefCell::new(own),
                methods,
                watched: OnceCell::new(),
                config,
                dispatch: RefCell::default(),
                cache: RefCell::default(),
            }),
        };
        for param in cls.inner.own.borrow().iter() {
            param.set_owner(WeakOwner::Class(cls.downgrade()));
        }
        bump_generation();

        let watched = cls.compute_watched()?;
        tracing::debug!(
            class = %cls.name(),
            params = cls.objects().len(),
            watched = watched.len(),
            "class built"
        );
        // Freshly created, so the cell is empty.
        let _ = cls.inner.watched.set(watched);
        Ok(cls)
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("bases", &join_names(&self.bases))
            .field("params", &self.params)
            .field(
                "methods",
                &self.methods.iter().map(|(n, ..)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

fn join_names(classes: &[ParamClass]) -> String {
    classes.iter().map(ParamClass::name).collect::<Vec<_>>().join(", ")
}

/// Resolves `decl` against the ancestors that declare `name`.
///
/// Each slot is taken from the declaration, otherwise from the nearest
/// ancestor declaring the parameter, otherwise from the kind's slot
/// defaults. The default is re-validated when the kind changed or a slot
/// differs from what a farther ancestor had.
fn resolve_param(
    class: &str,
    ancestors: &[ParamClass],
    name: &str,
    decl: &ParamDecl,
) -> Result<Parameter> {
    let kind = decl.kind_rc();
    let declared = decl.declared();
    let qualified = || format!("{class}.{name}");

    if name == NAME && kind.type_name() != "String" {
        return Err(ParamError::InvalidNameOverride {
            class: class.into(),
            kind: kind.type_name(),
        });
    }
    let slots = kind.slots();
    if let Some((unknown, _)) = declared.iter().find(|(s, _)| !slots.contains(s)) {
        return Err(ParamError::UnknownSlot {
            slot: unknown.into(),
            param: qualified(),
            kind: kind.type_name(),
        });
    }

    let supers: Vec<Parameter> = ancestors.iter().filter_map(|c| c.own_param(name)).collect();
    let instantiate_inherited = supers.iter().any(Parameter::instantiate);
    let type_change = supers
        .iter()
        .any(|sup| !kind::is_subtype(sup.kind(), kind.as_ref()));

    let defaults = kind.slot_defaults();
    let mut resolved = ValueStore::new();
    let mut slot_overridden = false;
    for &name_of_slot in slots {
        if name_of_slot == slot::INSTANTIATE {
            continue;
        }
        let candidates = declared
            .get(name_of_slot)
            .cloned()
            .into_iter()
            .chain(supers.iter().filter_map(|sup| sup.own_slot(name_of_slot)));
        let mut chosen: Option<Value> = None;
        for candidate in candidates {
            match &chosen {
                None => {
                    chosen = Some(candidate);
                    if slot_overridden || type_change {
                        break;
                    }
                }
                Some(first) if first.is_equal(&candidate) => {}
                Some(_) => {
                    if !slot::NON_VALIDATED.contains(&name_of_slot) {
                        slot_overridden = true;
                    }
                    break;
                }
            }
        }
        let value = match chosen {
            Some(value) => value,
            None => defaults.value(name_of_slot).ok_or_else(|| {
                ParamError::MissingSlotDefault {
                    slot: name_of_slot.into(),
                    param: qualified(),
                    kind: kind.type_name(),
                }
            })?,
        };
        resolved.insert(name_of_slot, value);
    }

    let flag = |store: &ValueStore, s: &str| store.get(s).and_then(Value::as_bool);
    let default = resolved.get(slot::DEFAULT).cloned().unwrap_or_default();
    let readonly = flag(&resolved, slot::READONLY).unwrap_or(false);
    let mut instantiate = flag(declared, slot::INSTANTIATE)
        .or_else(|| defaults.value(slot::INSTANTIATE).and_then(|v| v.as_bool()))
        .unwrap_or(false)
        || instantiate_inherited;
    if kind.is_dynamic() && matches!(default, Value::Generator(_)) {
        instantiate = true;
    }
    if readonly {
        resolved.insert(slot::CONSTANT, Value::Bool(true));
        instantiate = false;
    }
    let allow_none = default.is_none()
        || flag(declared, slot::ALLOW_NONE)
            .or_else(|| supers.first().map(Parameter::allow_none))
            .or_else(|| defaults.value(slot::ALLOW_NONE).and_then(|v| v.as_bool()))
            .unwrap_or(false);
    resolved.insert(slot::INSTANTIATE, Value::Bool(instantiate));
    resolved.insert(slot::ALLOW_NONE, Value::Bool(allow_none));

    let param = Parameter::resolved(name, kind, resolved, class);

    let declared_default = declared.contains(slot::DEFAULT);
    if type_change || (!default.is_none() && (declared_default || slot_overridden)) {
        param
            .validate(&default)
            .map_err(|source| ParamError::ClassDefinition {
                class: class.into(),
                param: name.into(),
                chain: join_names(ancestors),
                source: Box::new(source),
            })?;
    }
    Ok(param)
}

impl ParamClass {
    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Declared bases, in declaration order.
    #[must_use]
    pub fn bases(&self) -> &[Self] {
        &self.inner.bases
    }

    /// Linearized class hierarchy, starting with this class.
    #[must_use]
    pub fn mro(&self) -> Vec<Self> {
        core::iter::once(self.clone())
            .chain(self.inner.ancestors.iter().cloned())
            .collect()
    }

    fn lineage(&self) -> impl Iterator<Item = &Self> + '_ {
        core::iter::once(self).chain(self.inner.ancestors.iter())
    }

    /// Whether this class is `other` or derives from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Self) -> bool {
        self.lineage().any(|c| c.ptr_eq(other))
    }

    /// Class-level descriptor of `name`, declared here or inherited.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<Parameter> {
        self.objects().get(name).cloned()
    }

    /// Descriptor declared (or copied) on this very class.
    pub(crate) fn own_param(&self, name: &str) -> Option<Parameter> {
        self.inner
            .own
            .borrow()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Every class-level descriptor, root class first.
    ///
    /// The map is cached and rebuilt after any class changes its descriptors.
    #[must_use]
    pub fn objects(&self) -> Rc<ParamMap> {
        let generation = current_generation();
        if let Some((cached, map)) = &*self.inner.cache.borrow()
            && *cached == generation
        {
            return Rc::clone(map);
        }
        let mut map = ParamMap::default();
        for cls in self.inner.ancestors.iter().rev().chain(core::iter::once(self)) {
            for param in cls.inner.own.borrow().iter() {
                map.insert(param.clone());
            }
        }
        let map = Rc::new(map);
        *self.inner.cache.borrow_mut() = Some((generation, Rc::clone(&map)));
        map
    }

    /// Runtime configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn unknown(&self, name: &str) -> ParamError {
        ParamError::UnknownParameter {
            name: name.into(),
            owner: self.name().into(),
        }
    }

    /// Class-level value of `name`: its default.
    ///
    /// An unset `name` reads as the class name; a dynamic default produces
    /// a value.
    pub fn get(&self, name: &str) -> Result<Value> {
        let param = self.param(name).ok_or_else(|| self.unknown(name))?;
        Ok(match param.default_value() {
            Value::None if name == NAME => Value::Str(self.name().into()),
            Value::Generator(generator) if param.kind().is_dynamic() => {
                generator.produce(self.config().current_time(), false)
            }
            other => other,
        })
    }

    /// Sets the class-level default of `name`.
    ///
    /// Setting an inherited parameter gives this class its own copy of the
    /// descriptor, so the ancestor is unaffected.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let inherited = self.param(name).ok_or_else(|| self.unknown(name))?;
        inherited.validate(&value)?;
        if inherited.is_readonly() {
            return Err(ParamError::ReadOnly { name: name.into() });
        }
        let param = match self.own_param(name) {
            Some(own) => own,
            None => {
                let copy = inherited.class_copy(WeakOwner::Class(self.downgrade()), self.name());
                self.inner.own.borrow_mut().push(copy.clone());
                bump_generation();
                copy
            }
        };
        let old = param.default_value();
        param.set_default_silent(value.clone());
        let owner = Owner::Class(self.clone());
        let event = Event::new(owner.clone(), name, VALUE, old, value, false);
        dispatch::notify(&owner, param.watchers(VALUE), event)
    }

    /// Sets several class-level defaults, notifying watchers once per watcher.
    pub fn update<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        batch::update(&Owner::Class(self.clone()), batch::pairs(values))
    }

    /// Fires `triggered` events for `names` without changing them.
    pub fn trigger<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        batch::trigger(&Owner::Class(self.clone()), names)
    }

    /// Starts a watcher registration on class-level changes of `names`.
    pub fn watcher<I, S>(&self, names: I) -> WatchBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WatchBuilder::new(Owner::Class(self.clone()), names)
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
        watcher::unwatch(&Owner::Class(self.clone()), watcher)
    }

    /// Adds a parameter after the class was built.
    ///
    /// The declaration is resolved against the ancestors exactly as at build
    /// time; an existing parameter of the same name on this class is
    /// replaced.
    pub fn add_parameter(&self, name: &str, decl: ParamDecl) -> Result<()> {
        let param = resolve_param(self.name(), &self.inner.ancestors, name, &decl)?;
        param.set_owner(WeakOwner::Class(self.downgrade()));
        {
            let mut own = self.inner.own.borrow_mut();
            match own.iter_mut().find(|p| p.name() == name) {
                Some(slot) => *slot = param,
                None => own.push(param),
            }
        }
        bump_generation();
        Ok(())
    }

    /// Starts building an instance.
    pub fn instance(&self) -> InstanceBuilder {
        InstanceBuilder::new(self)
    }

    /// Method `name`, looked up along the linearization.
    pub(crate) fn method(&self, name: &str) -> Option<Rc<Method>> {
        self.lineage()
            .find_map(|cls| cls.inner.methods.iter().find(|m| m.name == name).cloned())
    }

    /// Class-level dependencies of `method`.
    ///
    /// Dependencies reaching through sub-objects need an instance and are
    /// left out; see [`Parameterized::params_depended_on`].
    pub fn params_depended_on(
        &self,
        method: &str,
        intermediate: Intermediate,
    ) -> Result<Vec<DependencyInfo>> {
        depends::collect(&Owner::Class(self.clone()), method, false, intermediate)
            .map(|(deps, _)| deps)
    }

    /// Watched methods, inherited ones first.
    pub(crate) fn watched_methods(&self) -> &[WatchedMethod] {
        self.inner.watched.get().map_or(&[], Vec::as_slice)
    }

    fn compute_watched(&self) -> Result<Vec<WatchedMethod>> {
        let owner = Owner::Class(self.clone());
        let mut own = Vec::new();
        for method in &self.inner.methods {
            if method.watch == WatchMode::No {
                continue;
            }
            let (deps, dynamic) = depends::collect(&owner, &method.name, false, Intermediate::Yes)?;
            own.push(WatchedMethod {
                name: method.name.clone(),
                queued: method.watch == WatchMode::Queued,
                on_init: method.on_init,
                static_deps: deps.into_iter().map(|d| (d.name, d.what)).collect(),
                dynamic,
            });
        }

        let mut inherited: Vec<WatchedMethod> = Vec::new();
        for ancestor in &self.inner.ancestors {
            for entry in ancestor.watched_methods() {
                let seen = inherited.iter().chain(&own).any(|w| w.name == entry.name);
                let still_watched = self
                    .method(&entry.name)
                    .is_some_and(|m| m.watch != WatchMode::No);
                if !seen && still_watched {
                    inherited.push(entry.clone());
                }
            }
        }
        inherited.extend(own);
        Ok(inherited)
    }

    pub(crate) fn dispatch_state(&self) -> &RefCell<DispatchState> {
        &self.inner.dispatch
    }

    pub(crate) fn downgrade(&self) -> WeakParamClass {
        WeakParamClass(Rc::downgrade(&self.inner))
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).addr()
    }

    /// Whether both handles refer to the same class.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ParamClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamClass")
            .field("name", &self.inner.name)
            .field("bases", &join_names(&self.inner.bases))
            .field("params", &*self.objects())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ParamKind, SlotDefaults};

    #[test]
    fn implicit_name_parameter() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .build()
            .unwrap();
        assert_eq!(cls.objects().names().collect::<Vec<_>>(), ["name", "a"]);
        assert_eq!(cls.get(NAME).unwrap(), Value::from("P"));
        assert!(cls.param(NAME).unwrap().is_constant());
    }

    #[test]
    fn objects_are_root_first() {
        let a = ClassBuilder::new("A")
            .param("x", ParamDecl::integer())
            .build()
            .unwrap();
        let b = ClassBuilder::new("B")
            .base(&a)
            .param("y", ParamDecl::integer())
            .param("x", ParamDecl::integer().default(3))
            .build()
            .unwrap();
        assert_eq!(b.objects().names().collect::<Vec<_>>(), ["name", "x", "y"]);
        assert_eq!(b.get("x").unwrap(), Value::Int(3));
        assert_eq!(a.get("x").unwrap(), Value::Int(0));
    }

    #[test]
    fn class_set_copies_inherited_descriptor() {
        let a = ClassBuilder::new("A")
            .param("x", ParamDecl::integer())
            .build()
            .unwrap();
        let b = ClassBuilder::new("B").base(&a).build().unwrap();
        b.set("x", 7).unwrap();
        assert_eq!(b.get("x").unwrap(), Value::Int(7));
        assert_eq!(a.get("x").unwrap(), Value::Int(0));
        assert_eq!(b.param("x").unwrap().qualified_name(), "B.x");
    }

    #[test]
    fn readonly_forces_constant() {
        let cls = ClassBuilder::new("P")
            .param("r", ParamDecl::integer().readonly(true).instantiate(true))
            .build()
            .unwrap();
        let r = cls.param("r").unwrap();
        assert!(r.is_constant());
        assert!(!r.instantiate());
        assert!(matches!(cls.set("r", 1), Err(ParamError::ReadOnly { .. })));
    }

    #[test]
    fn allow_none_follows_default() {
        let cls = ClassBuilder::new("P")
            .param("n", ParamDecl::number().default(Value::None))
            .param("m", ParamDecl::number())
            .build()
            .unwrap();
        assert!(cls.param("n").unwrap().allow_none());
        assert!(!cls.param("m").unwrap().allow_none());
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let err = ClassBuilder::new("P")
            .param("a", ParamDecl::boolean().slot(slot::BOUNDS, Value::None))
            .build()
            .unwrap_err();
        assert!(matches!(err, ParamError::UnknownSlot { .. }));
    }

    #[test]
    fn missing_slot_default_is_reported() {
        #[derive(Debug)]
        struct Bare;

        impl ParamKind for Bare {
            fn type_name(&self) -> &'static str {
                "Bare"
            }

            fn lineage(&self) -> &'static [&'static str] {
                &["Bare", "Parameter"]
            }

            fn slot_defaults(&self) -> SlotDefaults {
                SlotDefaults::base().without(slot::DOC)
            }
        }

        let err = ClassBuilder::new("P")
            .param("a", ParamDecl::new(Bare))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Slot 'doc' of parameter 'P.a' has no default value defined in the slot defaults of Bare"
        );
    }

    #[test]
    fn add_parameter_invalidates_objects() {
        let a = ClassBuilder::new("A").build().unwrap();
        let b = ClassBuilder::new("B").base(&a).build().unwrap();
        assert!(b.param("late").is_none());
        a.add_parameter("late", ParamDecl::string().default("x")).unwrap();
        assert_eq!(b.get("late").unwrap(), Value::from("x"));
    }

    #[test]
    fn inconsistent_bases_are_rejected() {
        let a = ClassBuilder::new("A").build().unwrap();
        let b = ClassBuilder::new("B").base(&a).build().unwrap();
        let err = ClassBuilder::new("C").base(&a).base(&b).build().unwrap_err();
        assert!(matches!(err, ParamError::InconsistentHierarchy { .. }));
    }
}
