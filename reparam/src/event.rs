// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change events delivered to watchers.

use std::fmt;

use crate::class::ParamClass;
use crate::object::Parameterized;
use crate::owner::Owner;
use crate::value::Value;

/// Why an event was delivered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The value was set; delivered to watchers with `onlychanged = false`.
    Set,
    /// The value changed; delivered to watchers with `onlychanged = true`.
    Changed,
    /// Forced by [`Parameterized::trigger`] without a change.
    Triggered,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Set => "set",
            Self::Changed => "changed",
            Self::Triggered => "triggered",
        })
    }
}

/// One parameter mutation, as seen by a watcher.
#[derive(Clone, Debug)]
pub struct Event {
    /// Which attribute changed: `value` or a slot name.
    pub what: String,
    /// Parameter name.
    pub name: String,
    /// Class or instance the change happened on.
    pub owner: Owner,
    /// Previous value.
    pub old: Value,
    /// New value.
    pub new: Value,
    /// Delivery type, resolved per watcher.
    pub event_type: EventType,
}

impl Event {
    pub(crate) fn new(
        owner: Owner,
        name: &str,
        what: &str,
        old: Value,
        new: Value,
        triggered: bool,
    ) -> Self {
        Self {
            what: what.into(),
            name: name.into(),
            owner,
            old,
            new,
            event_type: if triggered {
                EventType::Triggered
            } else {
                EventType::Set
            },
        }
    }

    /// The instance, for instance-level events.
    #[must_use]
    pub fn obj(&self) -> Option<&Parameterized> {
        self.owner.instance()
    }

    /// The owning class.
    #[must_use]
    pub fn class(&self) -> ParamClass {
        self.owner.class()
    }

    /// Whether `old` and `new` differ.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.old.is_equal(&self.new)
    }

    #[inline]
    pub(crate) fn is_triggered(&self) -> bool {
        self.event_type == EventType::Triggered
    }

    pub(crate) fn same_key(&self, other: &Self) -> bool {
        self.name == other.name && self.what == other.what
    }

    /// Folds a later event for the same key into this one.
    pub(crate) fn merge(&mut self, later: Self) {
        if later.is_triggered() {
            self.event_type = EventType::Triggered;
        }
        self.new = later.new;
    }

    /// Copy typed for a watcher with the given `onlychanged` flag.
    pub(crate) fn typed(&self, onlychanged: bool) -> Self {
        let mut event = self.clone();
        if !event.is_triggered() {
            event.event_type = if onlychanged {
                EventType::Changed
            } else {
                EventType::Set
            };
        }
        event
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event(what='{}', name='{}', owner={}, old={}, new={}, type='{}')",
            self.what, self.name, self.owner, self.old, self.new, self.event_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassBuilder;

    #[test]
    fn merge_keeps_first_old_and_last_new() {
        let cls = ClassBuilder::new("P").build().unwrap();
        let owner = Owner::Class(cls);
        let mut first = Event::new(owner.clone(), "a", "value", Value::Int(0), Value::Int(1), false);
        let later = Event::new(owner, "a", "value", Value::Int(1), Value::Int(2), true);
        assert!(first.same_key(&later));

        first.merge(later);
        assert_eq!((first.old, first.new), (Value::Int(0), Value::Int(2)));
        assert_eq!(first.event_type, EventType::Triggered);
    }
}
