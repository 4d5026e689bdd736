// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Method dependency declarations and their resolution into concrete
//! `(owner, name, what)` triples.
//!
//! A method declares the parameters it reads with [`Depends`]. Flat
//! specifications resolve against the owning class when it is built.
//! Specifications that reach through a sub-object (`sub.gain`) can only be
//! resolved against a live instance, because the sub-object is a parameter
//! value; they stay pending until then and are re-resolved whenever a
//! segment of their path is replaced (see `rebind`).

use std::fmt;
use std::rc::Rc;

use crate::descriptor::Parameter;
use crate::error::{ParamError, Result};
use crate::executor::AsyncTask;
use crate::object::Parameterized;
use crate::owner::Owner;
use crate::spec::DependencySpec;
use crate::value::Value;

/// Whether, and how, a method is invoked when its dependencies change.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum WatchMode {
    /// Dependencies are only declared for introspection.
    #[default]
    No,
    /// The method runs as soon as a dependency changes.
    Immediate,
    /// The method runs as a queued watcher.
    Queued,
}

/// Dependency declaration of a method.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use reparam::{ClassBuilder, Depends, ParamDecl};
///
/// let calls = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&calls);
/// let cls = ClassBuilder::new("P")
///     .param("a", ParamDecl::integer())
///     .method("on_a", Depends::on(["a"]).watch(), move |_| {
///         counter.set(counter.get() + 1);
///         Ok(())
///     })
///     .build()
///     .unwrap();
///
/// let obj = cls.instance().build().unwrap();
/// obj.set("a", 1).unwrap();
/// assert_eq!(calls.get(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Depends {
    specs: Option<Vec<String>>,
    watch: WatchMode,
    on_init: bool,
}

impl Depends {
    /// Depends on the given specifications.
    pub fn on<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            specs: Some(specs.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Depends on every parameter of the class.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Runs the method whenever a dependency changes.
    #[must_use]
    pub fn watch(self) -> Self {
        self.watch_mode(WatchMode::Immediate)
    }

    /// Runs the method as a queued watcher.
    #[must_use]
    pub fn queued(self) -> Self {
        self.watch_mode(WatchMode::Queued)
    }

    /// Sets the watch mode.
    #[must_use]
    pub fn watch_mode(mut self, watch: WatchMode) -> Self {
        self.watch = watch;
        self
    }

    /// Also runs the method once when an instance is initialized.
    #[must_use]
    pub fn on_init(mut self) -> Self {
        self.on_init = true;
        self
    }

    pub(crate) fn mode(&self) -> WatchMode {
        self.watch
    }

    pub(crate) fn runs_on_init(&self) -> bool {
        self.on_init
    }

    pub(crate) fn parse(&self) -> Result<Option<Vec<DependencySpec>>> {
        self.specs
            .as_ref()
            .map(|specs| specs.iter().map(|s| DependencySpec::parse(s)).collect())
            .transpose()
    }
}

/// How much of a nested dependency path to report.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Intermediate {
    /// Only the terminal parameters.
    #[default]
    No,
    /// The parameters holding each sub-object along the path, then the
    /// terminal parameters.
    Yes,
    /// Only the parameters along the path.
    Only,
}

impl Intermediate {
    #[inline]
    fn includes_path(self) -> bool {
        self != Self::No
    }
}

/// One concrete dependency: a watched attribute of a parameter on an owner.
#[derive(Clone, Debug)]
pub struct DependencyInfo {
    /// Class or instance owning the parameter.
    pub owner: Owner,
    /// Parameter name.
    pub name: String,
    /// Watched attribute: `value` or a slot name.
    pub what: String,
}

impl DependencyInfo {
    /// The owning instance, when the dependency is on an instance.
    #[must_use]
    pub fn instance(&self) -> Option<&Parameterized> {
        self.owner.instance()
    }

    /// Descriptor of the parameter as seen from the owner.
    #[must_use]
    pub fn param(&self) -> Option<Parameter> {
        self.owner.effective_param(&self.name)
    }
}

impl PartialEq for DependencyInfo {
    fn eq(&self, other: &Self) -> bool {
        self.owner.ptr_eq(&other.owner) && self.name == other.name && self.what == other.what
    }
}

impl fmt::Display for DependencyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DependencyInfo(owner={}, name='{}', what='{}')",
            self.owner, self.name, self.what
        )
    }
}

pub(crate) type MethodFn = dyn Fn(&Parameterized) -> Result<()>;
pub(crate) type AsyncMethodFn = dyn Fn(&Parameterized) -> AsyncTask;

#[derive(Clone)]
pub(crate) enum MethodBody {
    Sync(Rc<MethodFn>),
    Async(Rc<AsyncMethodFn>),
}

/// A method declared on a class.
pub(crate) struct Method {
    pub(crate) name: String,
    pub(crate) specs: Option<Vec<DependencySpec>>,
    pub(crate) watch: WatchMode,
    pub(crate) on_init: bool,
    pub(crate) body: MethodBody,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("specs", &self.specs)
            .field("watch", &self.watch)
            .field("on_init", &self.on_init)
            .finish_non_exhaustive()
    }
}

/// A watched method with its dependencies split into the flat ones, known
/// when the class is built, and the nested ones resolved per instance.
#[derive(Clone, Debug)]
pub(crate) struct WatchedMethod {
    pub(crate) name: String,
    pub(crate) queued: bool,
    pub(crate) on_init: bool,
    /// `(name, what)` on the instance itself.
    pub(crate) static_deps: Vec<(String, String)>,
    pub(crate) dynamic: Vec<DependencySpec>,
}

/// A resolved specification: a parameter, or a method whose own
/// dependencies still have to be collected.
pub(crate) enum Resolved {
    Param(DependencyInfo),
    Method(Owner, String),
}

type Resolution = (Vec<Resolved>, Vec<DependencySpec>);

/// The object held by parameter `name` of `owner`, if it holds one.
pub(crate) fn sub_owner(owner: &Owner, name: &str) -> Option<Owner> {
    match owner.raw_value(name).ok()? {
        Value::Object(obj) => Some(Owner::Instance(obj)),
        Value::Class(cls) => Some(Owner::Class(cls)),
        _ => None,
    }
}

/// Follows `path` from `owner`; `None` as soon as a segment holds no object.
pub(crate) fn walk<'a>(owner: &Owner, path: impl IntoIterator<Item = &'a str>) -> Option<Owner> {
    let mut current = owner.clone();
    for segment in path {
        current = sub_owner(&current, segment)?;
    }
    Some(current)
}

/// Resolves one specification against `host`.
///
/// With `dynamic` unset, nested specifications are returned unresolved.
/// When a sub-object along the path is missing, the deepest resolvable
/// prefix is reported (so the caller can watch for the missing object to
/// appear) and the specification is returned unresolved.
pub(crate) fn spec_to_obj(
    host: &Owner,
    spec: &DependencySpec,
    dynamic: bool,
    intermediate: Intermediate,
) -> Result<Resolution> {
    let src = if !spec.is_nested() {
        host.clone()
    } else if !dynamic {
        return Ok((Vec::new(), vec![spec.clone()]));
    } else {
        let root = spec.root();
        if host.class().param(root).is_none() {
            return Err(ParamError::UnresolvedDependency {
                spec: spec.object_path().unwrap_or_default(),
                owner: host.to_string(),
                segment: root.into(),
            });
        }
        let path = spec.path();
        match walk(host, path.iter().map(String::as_str)) {
            Some(src) => src,
            None => {
                let mut deps = Vec::new();
                if intermediate.includes_path() {
                    let deepest = (1..path.len())
                        .rev()
                        .find(|&k| walk(host, path[..k].iter().map(String::as_str)).is_some());
                    if let Some(k) = deepest {
                        let partial = DependencySpec::parse(&path[..=k].join("."))?;
                        deps.extend(spec_to_obj(host, &partial, dynamic, intermediate)?.0);
                    }
                }
                let pending = if intermediate == Intermediate::Only {
                    Vec::new()
                } else {
                    vec![spec.clone()]
                };
                return Ok((deps, pending));
            }
        }
    };

    let attribute = spec.attribute();
    let class = src.class();
    if attribute == "param" {
        let mut deps = Vec::new();
        let mut pending = Vec::new();
        if let Some(path) = spec.object_path() {
            let (d, p) = spec_to_obj(host, &DependencySpec::parse(&path)?, dynamic, intermediate)?;
            deps.extend(d);
            pending.extend(p);
        }
        let names: Vec<String> = class.objects().names().map(str::to_owned).collect();
        for name in names {
            let (d, p) = spec_to_obj(&src, &DependencySpec::parse(&name)?, dynamic, intermediate)?;
            deps.extend(d);
            pending.extend(p);
        }
        return Ok((deps, pending));
    }

    let info = if class.param(attribute).is_some() {
        Resolved::Param(DependencyInfo {
            owner: src.clone(),
            name: attribute.into(),
            what: spec.what().into(),
        })
    } else if class.method(attribute).is_some() {
        Resolved::Method(src.clone(), attribute.into())
    } else {
        return Err(ParamError::UnresolvedAttribute {
            attribute: attribute.into(),
            owner: src.to_string(),
        });
    };

    let Some(path) = spec.object_path() else {
        return Ok((vec![info], Vec::new()));
    };
    if intermediate == Intermediate::No {
        return Ok((vec![info], Vec::new()));
    }
    let (mut deps, pending) =
        spec_to_obj(host, &DependencySpec::parse(&path)?, dynamic, intermediate)?;
    if intermediate != Intermediate::Only {
        deps.push(info);
    }
    Ok((deps, pending))
}

/// Collects the dependencies of `method` on `owner`, following
/// dependencies on other methods.
pub(crate) fn collect(
    owner: &Owner,
    method: &str,
    dynamic: bool,
    intermediate: Intermediate,
) -> Result<(Vec<DependencyInfo>, Vec<DependencySpec>)> {
    let mut out = (Vec::new(), Vec::new());
    let mut visited = Vec::new();
    collect_into(owner, method, dynamic, intermediate, &mut visited, &mut out)?;
    Ok(out)
}

fn collect_into(
    owner: &Owner,
    method: &str,
    dynamic: bool,
    intermediate: Intermediate,
    visited: &mut Vec<(usize, String)>,
    out: &mut (Vec<DependencyInfo>, Vec<DependencySpec>),
) -> Result<()> {
    let class = owner.class();
    let Some(m) = class.method(method) else {
        return Err(ParamError::UnknownMethod {
            method: method.into(),
            owner: owner.to_string(),
        });
    };
    let key = (owner.key(), method.to_owned());
    if visited.contains(&key) {
        return Ok(());
    }
    visited.push(key);

    let specs = match &m.specs {
        Some(specs) => specs.clone(),
        None => class
            .objects()
            .names()
            .map(DependencySpec::parse)
            .collect::<Result<_>>()?,
    };
    for spec in &specs {
        let (deps, pending) = spec_to_obj(owner, spec, dynamic, intermediate)?;
        out.1.extend(pending);
        for dep in deps {
            match dep {
                Resolved::Param(info) => out.0.push(info),
                Resolved::Method(sub, name) => {
                    collect_into(&sub, &name, dynamic, intermediate, visited, out)?;
                }
            }
        }
    }
    Ok(())
}

/// Resolves a pending specification against a live host.
pub(crate) fn resolve_pending(
    host: &Owner,
    spec: &DependencySpec,
    intermediate: Intermediate,
) -> Result<Vec<DependencyInfo>> {
    let (deps, _) = spec_to_obj(host, spec, true, intermediate)?;
    let mut out = Vec::new();
    for dep in deps {
        match dep {
            Resolved::Param(info) => out.push(info),
            Resolved::Method(sub, name) => out.extend(collect(&sub, &name, true, intermediate)?.0),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassBuilder, ParamDecl};

    fn noop(_: &Parameterized) -> Result<()> {
        Ok(())
    }

    #[test]
    fn flat_specs_resolve_on_the_class() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .param("b", ParamDecl::integer())
            .method("m", Depends::on(["a", "b:constant"]), noop)
            .build()
            .unwrap();
        let deps = cls.params_depended_on("m", Intermediate::No).unwrap();
        let triples: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.what.as_str())).collect();
        assert_eq!(triples, [("a", "value"), ("b", "constant")]);
        assert!(deps.iter().all(|d| d.instance().is_none()));
    }

    #[test]
    fn method_dependencies_are_followed() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .param("b", ParamDecl::integer())
            .method("inner", Depends::on(["b"]), noop)
            .method("outer", Depends::on(["a", "inner"]), noop)
            .method("cycle", Depends::on(["cycle", "a"]), noop)
            .build()
            .unwrap();
        let names = |m| -> Vec<String> {
            cls.params_depended_on(m, Intermediate::No)
                .unwrap()
                .into_iter()
                .map(|d| d.name)
                .collect()
        };
        assert_eq!(names("outer"), ["a", "b"]);
        assert_eq!(names("cycle"), ["a"]);
    }

    #[test]
    fn undeclared_dependencies_mean_every_parameter() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .method("m", Depends::all(), noop)
            .build()
            .unwrap();
        let names: Vec<_> = cls
            .params_depended_on("m", Intermediate::No)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["name", "a"]);
    }

    #[test]
    fn unknown_method_is_reported() {
        let cls = ClassBuilder::new("P").build().unwrap();
        assert!(matches!(
            cls.params_depended_on("missing", Intermediate::No),
            Err(ParamError::UnknownMethod { .. })
        ));
    }
}
