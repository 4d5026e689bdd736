// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Watchers that keep dependent methods bound to the current sub-objects.
//!
//! Flat dependencies are watched once, when the instance is initialized.
//! Nested ones (`sub.inner.gain`) are resolved against whatever objects the
//! path currently reaches; every time a parameter along the path is
//! reassigned, the watchers hanging off that root are dropped and resolved
//! again. A reassignment that leaves the watched attribute unchanged does
//! not call the method.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::depends::{self, DependencyInfo, Intermediate, MethodBody, WatchedMethod};
use crate::error::{ParamError, Result};
use crate::event::Event;
use crate::executor;
use crate::object::{Parameterized, WeakParameterized};
use crate::owner::{Owner, WeakOwner};
use crate::spec::DependencySpec;
use crate::value::Value;
use crate::watcher::{self, Callback, INTERNAL_PRECEDENCE, VALUE, Watcher};

/// A watcher installed for a nested dependency of one method.
#[derive(Clone, Debug)]
pub(crate) struct DynamicWatcher {
    /// Host parameter the dependency path starts from.
    pub(crate) root: String,
    pub(crate) owner: WeakOwner,
    pub(crate) watcher: Watcher,
}

/// Resolved dependencies sharing a root, an owner and a watched attribute.
struct Group {
    root: String,
    owner: Owner,
    what: String,
    members: Vec<(DependencySpec, DependencyInfo)>,
}

/// Installs or refreshes the dependency watchers of `obj`.
///
/// With `init` set, flat dependencies are watched and the methods declared
/// `on_init` run once everything is in place. Otherwise only nested
/// dependencies rooted at `attribute` (all of them for `None`) are
/// re-resolved.
pub(crate) fn update_deps(obj: &Parameterized, attribute: Option<&str>, init: bool) -> Result<()> {
    let class = obj.class();
    let watched = class.watched_methods();
    if watched.is_empty() {
        return Ok(());
    }
    let host = Owner::Instance(obj.clone());
    let mut on_init = Vec::new();

    for method in watched {
        let dynamic: Vec<&DependencySpec> = method
            .dynamic
            .iter()
            .filter(|spec| attribute.is_none_or(|a| spec.root() == a))
            .collect();
        if init {
            watch_static(obj, &host, method)?;
            if method.on_init {
                on_init.push(method.name.clone());
            }
        } else if dynamic.is_empty() {
            continue;
        } else {
            for stale in obj.take_dynamic_watchers(&method.name, attribute) {
                if let Some(owner) = stale.owner.upgrade() {
                    watcher::unregister(&owner, &stale.watcher);
                }
            }
        }

        let mut groups: Vec<Group> = Vec::new();
        for spec in dynamic {
            for dep in depends::resolve_pending(&host, spec, Intermediate::Yes)? {
                let existing = groups.iter_mut().find(|g| {
                    g.root == spec.root() && g.owner.ptr_eq(&dep.owner) && g.what == dep.what
                });
                match existing {
                    Some(group) => group.members.push((spec.clone(), dep)),
                    None => groups.push(Group {
                        root: spec.root().into(),
                        owner: dep.owner.clone(),
                        what: dep.what.clone(),
                        members: vec![(spec.clone(), dep)],
                    }),
                }
            }
        }
        let count = groups.len();
        for group in groups {
            let installed = watch_group(obj, method, group)?;
            obj.push_dynamic_watcher(&method.name, installed);
        }
        if count > 0 {
            tracing::debug!(
                instance = %obj,
                method = %method.name,
                root = attribute.unwrap_or("*"),
                watchers = count,
                "bound nested dependencies"
            );
        }
    }

    for name in on_init {
        invoke(obj, &name)?;
    }
    Ok(())
}

fn watch_static(obj: &Parameterized, host: &Owner, method: &WatchedMethod) -> Result<()> {
    let mut by_what: Vec<(&str, SmallVec<[String; 2]>)> = Vec::new();
    for (name, what) in &method.static_deps {
        match by_what.iter_mut().find(|(w, _)| *w == what.as_str()) {
            Some((_, names)) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            None => by_what.push((what.as_str(), SmallVec::from_elem(name.clone(), 1))),
        }
    }
    for (what, names) in by_what {
        let caller = Caller {
            obj: obj.downgrade(),
            method: method.name.clone(),
            changed: None,
            rebind: None,
            what: what.into(),
        };
        let watcher = Watcher::new(
            names,
            what,
            true,
            method.queued,
            INTERNAL_PRECEDENCE,
            caller.into_callback(),
        );
        watcher::register(host, &watcher)?;
    }
    Ok(())
}

/// Which attributes to compare before calling, and which root to rebind,
/// for one member of a group.
struct Binding {
    changed: Option<Vec<Vec<String>>>,
    rebind: bool,
}

fn bind_member(obj: &Parameterized, spec: &DependencySpec, dep: &DependencyInfo) -> Binding {
    let host = Owner::Instance(obj.clone());
    // One entry per path segment plus the host; missing objects stay `None`.
    let mut subobjs: Vec<Option<Owner>> = vec![Some(host)];
    for segment in spec.path() {
        let next = subobjs
            .last()
            .and_then(Option::as_ref)
            .and_then(|owner| depends::sub_owner(owner, segment));
        subobjs.push(next);
    }
    let intermediate = &subobjs[..subobjs.len() - 1];
    let depth = intermediate
        .iter()
        .position(|o| o.as_ref().is_some_and(|o| o.ptr_eq(&dep.owner)));
    let Some(depth) = depth else {
        return Binding {
            changed: None,
            rebind: false,
        };
    };

    let rest: Vec<String> = spec.segments().skip(depth + 1).map(str::to_owned).collect();
    let changed = if rest.len() == 1 && rest[0] == "param" {
        subobjs.last().and_then(Option::as_ref).map(|last| {
            last.class()
                .objects()
                .names()
                .map(|name| vec![name.to_owned()])
                .collect()
        })
    } else {
        Some(vec![rest])
    };
    Binding {
        changed,
        rebind: depth > 0,
    }
}

fn watch_group(obj: &Parameterized, method: &WatchedMethod, group: Group) -> Result<DynamicWatcher> {
    let mut names: SmallVec<[String; 2]> = SmallVec::new();
    for (_, dep) in &group.members {
        if !names.contains(&dep.name) {
            names.push(dep.name.clone());
        }
    }

    let mut changed: Option<Vec<Vec<String>>> = Some(Vec::new());
    let mut rebind = false;
    for (spec, dep) in &group.members {
        let binding = bind_member(obj, spec, dep);
        rebind |= binding.rebind;
        changed = match (changed, binding.changed) {
            (Some(mut all), Some(paths)) => {
                for path in paths {
                    if !all.contains(&path) {
                        all.push(path);
                    }
                }
                Some(all)
            }
            _ => None,
        };
    }

    let (first_spec, first_dep) = &group.members[0];
    let what = if first_spec.has_explicit_what() {
        first_spec.what().to_owned()
    } else {
        first_dep.what.clone()
    };
    let caller = Caller {
        obj: obj.downgrade(),
        method: method.name.clone(),
        changed,
        rebind: rebind.then(|| group.root.clone()),
        what,
    };
    let watcher = Watcher::new(
        names,
        &group.what,
        true,
        method.queued,
        INTERNAL_PRECEDENCE,
        caller.into_callback(),
    );
    watcher::register(&group.owner, &watcher)?;
    Ok(DynamicWatcher {
        root: group.root,
        owner: group.owner.downgrade(),
        watcher,
    })
}

/// Calls a dependent method from a watcher.
struct Caller {
    obj: WeakParameterized,
    method: String,
    /// Attribute paths compared between old and new sub-objects; `None`
    /// calls unconditionally.
    changed: Option<Vec<Vec<String>>>,
    rebind: Option<String>,
    what: String,
}

impl Caller {
    fn into_callback(self) -> Callback {
        Callback::Events(Rc::new(move |events: &[Event]| self.call(events)))
    }

    fn call(&self, events: &[Event]) -> Result<()> {
        let Some(obj) = self.obj.upgrade() else {
            return Ok(());
        };
        if let Some(root) = &self.rebind {
            update_deps(&obj, Some(root), false)?;
        }
        if self.skip(events) {
            tracing::trace!(method = %self.method, "nested attribute unchanged, skipping");
            return Ok(());
        }
        invoke(&obj, &self.method)
    }

    fn skip(&self, events: &[Event]) -> bool {
        let Some(changed) = &self.changed else {
            return false;
        };
        events.iter().all(|event| {
            changed.iter().all(|path| {
                let old = attribute_of(&event.old, path, &self.what);
                let new = attribute_of(&event.new, path, &self.what);
                match (old, new) {
                    (None, None) => true,
                    (Some(old), Some(new)) => old.is_equal(&new),
                    _ => false,
                }
            })
        })
    }
}

/// Reads `path` (and its `what` attribute) off a sub-object value.
///
/// `None` when `value` holds no object at all; a missing attribute along
/// the way reads as [`Value::None`].
fn attribute_of(value: &Value, path: &[String], what: &str) -> Option<Value> {
    let owner = match value {
        Value::Object(obj) => Owner::Instance(obj.clone()),
        Value::Class(cls) => Owner::Class(cls.clone()),
        _ => return None,
    };
    let Some((last, leading)) = path.split_last() else {
        return Some(value.clone());
    };
    let Some(owner) = depends::walk(&owner, leading.iter().map(String::as_str)) else {
        return Some(Value::None);
    };
    let found = if what == VALUE {
        owner.raw_value(last).ok()
    } else {
        owner.effective_param(last).and_then(|p| p.slot(what))
    };
    Some(found.unwrap_or_default())
}

/// Runs the method `name` of `obj`, handing asynchronous bodies to the
/// installed executor.
pub(crate) fn invoke(obj: &Parameterized, name: &str) -> Result<()> {
    let Some(method) = obj.class().method(name) else {
        return Err(ParamError::UnknownMethod {
            method: name.into(),
            owner: obj.to_string(),
        });
    };
    match &method.body {
        MethodBody::Sync(f) => f(obj),
        MethodBody::Async(f) => executor::spawn(name, f(obj)),
    }
}
