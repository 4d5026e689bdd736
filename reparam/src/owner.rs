// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The two kinds of parameter owner: classes and instances.

use std::cell::RefCell;
use std::fmt;

use crate::class::{ParamClass, WeakParamClass};
use crate::config::Config;
use crate::descriptor::Parameter;
use crate::dispatch::DispatchState;
use crate::error::{ParamError, Result};
use crate::object::{Parameterized, WeakParameterized};
use crate::value::Value;
use crate::watcher::Watcher;

/// Something that owns parameter values: a class or one of its instances.
///
/// Events and dependency triples carry their owner so callbacks can tell
/// class-level from instance-level changes.
#[derive(Clone, Debug)]
pub enum Owner {
    /// Class-level descriptors and defaults.
    Class(ParamClass),
    /// An instance.
    Instance(Parameterized),
}

impl Owner {
    /// The class, or the instance's class.
    #[must_use]
    pub fn class(&self) -> ParamClass {
        match self {
            Self::Class(cls) => cls.clone(),
            Self::Instance(obj) => obj.class(),
        }
    }

    /// The instance, for instance owners.
    #[must_use]
    pub fn instance(&self) -> Option<&Parameterized> {
        match self {
            Self::Class(_) => None,
            Self::Instance(obj) => Some(obj),
        }
    }

    /// Whether both refer to the same class or instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Class(a), Self::Class(b)) => a.ptr_eq(b),
            (Self::Instance(a), Self::Instance(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Current value of `name`.
    pub fn get(&self, name: &str) -> Result<Value> {
        match self {
            Self::Class(cls) => cls.get(name),
            Self::Instance(obj) => obj.get(name),
        }
    }

    /// Sets `name` through the validating, notifying set path.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        match self {
            Self::Class(cls) => cls.set(name, value),
            Self::Instance(obj) => obj.set(name, value),
        }
    }

    /// Stored value without evaluating dynamic generators.
    pub(crate) fn raw_value(&self, name: &str) -> Result<Value> {
        match self {
            Self::Class(cls) => cls
                .param(name)
                .map(|p| p.default_value())
                .ok_or_else(|| self.unknown(name)),
            Self::Instance(obj) => obj.raw_value(name),
        }
    }

    /// Descriptor governing sets on this owner: the instance copy when one
    /// exists, the class descriptor otherwise.
    pub(crate) fn effective_param(&self, name: &str) -> Option<Parameter> {
        match self {
            Self::Class(cls) => cls.param(name),
            Self::Instance(obj) => obj.existing_param(name).or_else(|| obj.class().param(name)),
        }
    }

    /// Value watchers registered on `name`.
    pub(crate) fn value_watchers(&self, name: &str) -> Vec<Watcher> {
        match self {
            Self::Class(cls) => cls
                .param(name)
                .map(|p| p.watchers(crate::watcher::VALUE))
                .unwrap_or_default(),
            Self::Instance(obj) => obj.value_watchers(name),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        match self {
            Self::Class(_) => true,
            Self::Instance(obj) => obj.is_initialized(),
        }
    }

    pub(crate) fn config(&self) -> Config {
        self.class().config().clone()
    }

    pub(crate) fn dispatch_state(&self) -> &RefCell<DispatchState> {
        match self {
            Self::Class(cls) => cls.dispatch_state(),
            Self::Instance(obj) => obj.dispatch_state(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakOwner {
        match self {
            Self::Class(cls) => WeakOwner::Class(cls.downgrade()),
            Self::Instance(obj) => WeakOwner::Instance(obj.downgrade()),
        }
    }

    /// Identity key used to group dependencies by owner.
    pub(crate) fn key(&self) -> usize {
        match self {
            Self::Class(cls) => cls.addr(),
            Self::Instance(obj) => obj.addr(),
        }
    }

    pub(crate) fn unknown(&self, name: &str) -> ParamError {
        ParamError::UnknownParameter {
            name: name.into(),
            owner: self.to_string(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(cls) => f.write_str(cls.name()),
            Self::Instance(obj) => write!(f, "{obj}"),
        }
    }
}

/// Non-owning back reference from a descriptor to its owner.
#[derive(Clone, Debug, Default)]
pub(crate) enum WeakOwner {
    #[default]
    Detached,
    Class(WeakParamClass),
    Instance(WeakParameterized),
}

impl WeakOwner {
    pub(crate) fn upgrade(&self) -> Option<Owner> {
        match self {
            Self::Detached => None,
            Self::Class(cls) => cls.upgrade().map(Owner::Class),
            Self::Instance(obj) => obj.upgrade().map(Owner::Instance),
        }
    }
}
