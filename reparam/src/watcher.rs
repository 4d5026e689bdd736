// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Watcher registration and removal.
//!
//! A [`Watcher`] is a callback registered against one or more parameter
//! names on a class or instance. Value watchers live in the owner's
//! per-name watcher table; watchers on any other attribute (`constant`,
//! `bounds`, ...) live on the descriptor whose slot they observe.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{ParamError, Result};
use crate::event::Event;
use crate::executor::{self, AsyncTask};
use crate::owner::Owner;
use crate::value::Value;

/// Attribute name of value watchers.
pub(crate) const VALUE: &str = "value";

/// Precedence of watchers installed for method dependencies.
pub(crate) const INTERNAL_PRECEDENCE: i32 = -1;

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

type EventsFn = dyn Fn(&[Event]) -> Result<()>;
type ValuesFn = dyn Fn(&[(String, Value)]) -> Result<()>;
type AsyncFn = dyn Fn(Vec<Event>) -> AsyncTask;

#[derive(Clone)]
pub(crate) enum Callback {
    Events(Rc<EventsFn>),
    Values(Rc<ValuesFn>),
    Async(Rc<AsyncFn>),
}

/// Handle to a registered callback.
///
/// Returned by [`WatchBuilder`] and accepted by `unwatch`. Clones refer to
/// the same registration.
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

struct WatcherInner {
    id: u64,
    names: SmallVec<[String; 2]>,
    what: String,
    onlychanged: bool,
    queued: bool,
    precedence: i32,
    callback: Callback,
}

impl Watcher {
    pub(crate) fn new(
        names: SmallVec<[String; 2]>,
        what: &str,
        onlychanged: bool,
        queued: bool,
        precedence: i32,
        callback: Callback,
    ) -> Self {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        Self {
            inner: Rc::new(WatcherInner {
                id,
                names,
                what: what.into(),
                onlychanged,
                queued,
                precedence,
                callback,
            }),
        }
    }

    /// Watched parameter names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.inner.names
    }

    /// Watched attribute.
    #[must_use]
    pub fn what(&self) -> &str {
        &self.inner.what
    }

    /// Whether unchanged sets are filtered out.
    #[must_use]
    pub fn onlychanged(&self) -> bool {
        self.inner.onlychanged
    }

    /// Whether the callback runs deferred.
    #[must_use]
    pub fn queued(&self) -> bool {
        self.inner.queued
    }

    /// Dispatch order key; lower runs first.
    #[must_use]
    pub fn precedence(&self) -> i32 {
        self.inner.precedence
    }

    /// Delivery order: precedence, then registration order.
    #[inline]
    pub(crate) fn dispatch_key(&self) -> (i32, u64) {
        (self.inner.precedence, self.inner.id)
    }

    /// Whether both handles refer to the same registration.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn watches(&self, event: &Event) -> bool {
        event.what == self.inner.what && self.inner.names.iter().any(|n| *n == event.name)
    }

    pub(crate) fn invoke(&self, events: Vec<Event>) -> Result<()> {
        match &self.inner.callback {
            Callback::Events(f) => f(&events),
            Callback::Values(f) => {
                let values: Vec<_> = events.into_iter().map(|e| (e.name, e.new)).collect();
                f(&values)
            }
            Callback::Async(f) => executor::spawn(&self.to_string(), f(events)),
        }
    }
}

impl fmt::Display for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Watcher(names=[")?;
        for (i, name) in self.inner.names.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{name}'")?;
        }
        write!(
            f,
            "], what='{}', onlychanged={}, queued={}, precedence={})",
            self.inner.what, self.inner.onlychanged, self.inner.queued, self.inner.precedence
        )
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("names", &self.inner.names)
            .field("what", &self.inner.what)
            .field("onlychanged", &self.inner.onlychanged)
            .field("queued", &self.inner.queued)
            .field("precedence", &self.inner.precedence)
            .finish_non_exhaustive()
    }
}

/// Builder for a watcher registration.
///
/// Obtained from [`Parameterized::watcher`](crate::Parameterized::watcher)
/// or [`ParamClass::watcher`](crate::ParamClass::watcher); nothing is
/// registered until a callback is attached.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use reparam::{ClassBuilder, ParamDecl};
///
/// let cls = ClassBuilder::new("P")
///     .param("a", ParamDecl::integer())
///     .build()
///     .unwrap();
/// let obj = cls.instance().build().unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// obj.watcher(["a"])
///     .onlychanged(false)
///     .call(move |events| {
///         sink.borrow_mut().extend(events.iter().map(|e| e.event_type.to_string()));
///         Ok(())
///     })
///     .unwrap();
///
/// obj.set("a", 0).unwrap();
/// assert_eq!(*seen.borrow(), ["set"]);
/// ```
#[must_use = "nothing is registered until a callback is attached"]
pub struct WatchBuilder {
    owner: Owner,
    names: SmallVec<[String; 2]>,
    what: String,
    onlychanged: bool,
    queued: bool,
    precedence: i32,
}

impl WatchBuilder {
    pub(crate) fn new<I, S>(owner: Owner, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner,
            names: names.into_iter().map(Into::into).collect(),
            what: VALUE.into(),
            onlychanged: true,
            queued: false,
            precedence: 0,
        }
    }

    /// Watches a slot instead of the value.
    pub fn what(mut self, what: &str) -> Self {
        self.what = what.into();
        self
    }

    /// Whether sets that leave the value unchanged are filtered out (default `true`).
    pub fn onlychanged(mut self, onlychanged: bool) -> Self {
        self.onlychanged = onlychanged;
        self
    }

    /// Defers nested notifications raised by the callback (default `false`).
    pub fn queued(mut self, queued: bool) -> Self {
        self.queued = queued;
        self
    }

    /// Dispatch order key; lower runs first (default `0`).
    pub fn precedence(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    /// Registers a callback receiving the batch of events.
    pub fn call(self, f: impl Fn(&[Event]) -> Result<()> + 'static) -> Result<Watcher> {
        self.finish(Callback::Events(Rc::new(f)))
    }

    /// Registers a callback receiving `(name, new value)` pairs.
    pub fn call_values(
        self,
        f: impl Fn(&[(String, Value)]) -> Result<()> + 'static,
    ) -> Result<Watcher> {
        self.finish(Callback::Values(Rc::new(f)))
    }

    /// Registers an asynchronous callback run by the installed executor.
    pub fn call_async(self, f: impl Fn(Vec<Event>) -> AsyncTask + 'static) -> Result<Watcher> {
        self.finish(Callback::Async(Rc::new(f)))
    }

    fn finish(self, callback: Callback) -> Result<Watcher> {
        if self.precedence < 0 {
            return Err(ParamError::NegativePrecedence {
                precedence: self.precedence,
            });
        }
        let watcher = Watcher::new(
            self.names,
            &self.what,
            self.onlychanged,
            self.queued,
            self.precedence,
            callback,
        );
        register(&self.owner, &watcher)?;
        Ok(watcher)
    }
}

impl fmt::Debug for WatchBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBuilder")
            .field("owner", &self.owner.to_string())
            .field("names", &self.names)
            .field("what", &self.what)
            .field("onlychanged", &self.onlychanged)
            .field("queued", &self.queued)
            .field("precedence", &self.precedence)
            .finish()
    }
}

/// Adds `watcher` to the tables of `owner`, checking every name first.
pub(crate) fn register(owner: &Owner, watcher: &Watcher) -> Result<()> {
    if !owner.is_initialized() {
        return Err(ParamError::NotInitialized {
            action: "watching parameters",
            owner: owner.to_string(),
        });
    }
    let class = owner.class();
    if let Some(missing) = watcher.names().iter().find(|n| class.param(n).is_none()) {
        return Err(ParamError::UnknownParameter {
            name: missing.clone(),
            owner: class.name().into(),
        });
    }
    for name in watcher.names() {
        match (owner, watcher.what()) {
            (Owner::Instance(obj), VALUE) => obj.add_value_watcher(name, watcher.clone()),
            (Owner::Instance(obj), what) => obj.param_object(name)?.add_watcher(what, watcher.clone()),
            (Owner::Class(cls), what) => {
                if let Some(param) = cls.param(name) {
                    param.add_watcher(what, watcher.clone());
                }
            }
        }
    }
    Ok(())
}

/// Removes `watcher` from the tables of `owner`; `false` if it was not there.
pub(crate) fn unregister(owner: &Owner, watcher: &Watcher) -> bool {
    let mut removed = false;
    for name in watcher.names() {
        removed |= match (owner, watcher.what()) {
            (Owner::Instance(obj), VALUE) => obj.remove_value_watcher(name, watcher),
            (Owner::Instance(obj), what) => obj
                .existing_param(name)
                .or_else(|| obj.class().param(name))
                .is_some_and(|p| p.remove_watcher(what, watcher)),
            (Owner::Class(cls), what) => cls
                .param(name)
                .is_some_and(|p| p.remove_watcher(what, watcher)),
        };
    }
    removed
}

/// Public unwatch: a missing watcher warns, or errors in strict mode.
pub(crate) fn unwatch(owner: &Owner, watcher: &Watcher) -> Result<()> {
    if unregister(owner, watcher) {
        return Ok(());
    }
    if owner.config().is_strict() {
        return Err(ParamError::NoSuchWatcher {
            watcher: watcher.to_string(),
        });
    }
    tracing::warn!("No such watcher {watcher} to remove.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::{ClassBuilder, ParamDecl};

    fn noop() -> Callback {
        Callback::Events(Rc::new(|_| Ok(())))
    }

    #[test]
    fn display_lists_names() {
        let w = Watcher::new(
            ["a".to_string(), "b".to_string()].into_iter().collect(),
            VALUE,
            true,
            false,
            0,
            noop(),
        );
        assert_eq!(
            w.to_string(),
            "Watcher(names=['a', 'b'], what='value', onlychanged=true, queued=false, precedence=0)"
        );
    }

    #[test]
    fn ids_are_unique() {
        let a = Watcher::new(SmallVec::new(), VALUE, true, false, 0, noop());
        let b = Watcher::new(SmallVec::new(), VALUE, true, false, 0, noop());
        assert_ne!(a.inner.id, b.inner.id);
        assert!(a.dispatch_key() < b.dispatch_key());
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn negative_precedence_is_rejected() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .build()
            .unwrap();
        let obj = cls.instance().build().unwrap();
        let err = obj.watcher(["a"]).precedence(-1).call(|_| Ok(())).unwrap_err();
        assert!(matches!(err, ParamError::NegativePrecedence { precedence: -1 }));
    }

    #[test]
    fn unknown_name_is_rejected_before_registration() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .build()
            .unwrap();
        let obj = cls.instance().build().unwrap();
        let err = obj.watch(["a", "nope"], |_| Ok(())).unwrap_err();
        assert!(matches!(err, ParamError::UnknownParameter { ref name, .. } if name == "nope"));
        assert!(obj.value_watchers("a").is_empty());
    }

    #[test]
    fn values_mode_receives_new_values() {
        use std::cell::RefCell;

        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .build()
            .unwrap();
        let obj = cls.instance().build().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        obj.watch_values(["a"], move |values| {
            sink.borrow_mut().extend_from_slice(values);
            Ok(())
        })
        .unwrap();
        obj.set("a", 4).unwrap();
        assert_eq!(*seen.borrow(), [("a".to_string(), Value::Int(4))]);
    }

    #[test]
    fn typed_events_follow_onlychanged() {
        let cls = ClassBuilder::new("P").build().unwrap();
        let e = Event::new(Owner::Class(cls), "a", VALUE, Value::Int(1), Value::Int(2), false);
        assert_eq!(e.typed(true).event_type, EventType::Changed);
        assert_eq!(e.typed(false).event_type, EventType::Set);
    }
}
