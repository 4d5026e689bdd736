// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reparam: declarative, validated and observable parameters.
//!
//! A [`ParamClass`] declares named, typed parameters with defaults and
//! constraints. Its instances ([`Parameterized`]) hold values that are
//! validated on every set and observed by watchers; methods can declare the
//! parameters they depend on and be re-run whenever those change, including
//! parameters of sub-objects reached through a dotted path.
//!
//! ## Core Concepts
//!
//! ### Declarations and descriptors
//!
//! [`ParamDecl`] is what a class author writes. Building the class resolves
//! each declaration against the same-named parameter of its ancestors into
//! a [`Parameter`] descriptor: undeclared slots are inherited, a kind change
//! re-validates the inherited default, and `readonly` implies `constant`.
//!
//! ### Values
//!
//! Reads resolve instance value → instance descriptor default → class
//! default. Sets validate, honor `readonly` and `constant`, store, then
//! notify.
//!
//! ### Watchers and batching
//!
//! Watchers receive [`Event`]s in ascending precedence. Inside
//! [`Parameterized::update`] or [`Parameterized::batch_call_watchers`]
//! events are collected and every watcher runs once with all of its events.
//!
//! ### Dependencies
//!
//! Methods registered with [`Depends::watch`] run when their dependencies
//! change. Nested dependencies (`sub.gain`) follow the object currently
//! held by `sub`, rebinding when it is replaced.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use reparam::{ClassBuilder, Depends, ParamDecl, Value};
//!
//! let runs = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&runs);
//!
//! let cls = ClassBuilder::new("Mixer")
//!     .param("gain", ParamDecl::number().default(1.0).bounds(0.0, 2.0))
//!     .param("muted", ParamDecl::boolean())
//!     .method("refresh", Depends::on(["gain", "muted"]).watch(), move |_| {
//!         counter.set(counter.get() + 1);
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let mixer = cls.instance().with("gain", 0.5).build().unwrap();
//! assert_eq!(mixer.get("gain").unwrap(), Value::Float(0.5));
//!
//! // Out of bounds: rejected, nothing stored.
//! assert!(mixer.set("gain", 3.0).is_err());
//!
//! // One batch, one run of the dependent method.
//! mixer.update([("gain", Value::Float(1.5)), ("muted", Value::Bool(true))]).unwrap();
//! assert_eq!(runs.get(), 1);
//! ```
//!
//! ## Threading
//!
//! Classes and instances are single-threaded (`Rc` based). Only the async
//! executor hook in [`set_async_executor`] is process-wide.

mod batch;
mod class;
mod config;
mod depends;
mod descriptor;
mod dispatch;
mod error;
mod event;
mod executor;
mod key;
mod kind;
mod mro;
mod object;
mod owner;
mod rebind;
mod spec;
mod store;
mod value;
mod watcher;

pub use class::{ClassBuilder, ParamClass};
pub use config::{Config, TimeSource};
pub use depends::{DependencyInfo, Depends, Intermediate, WatchMode};
pub use descriptor::{ParamDecl, ParamFlags, ParamMap, Parameter};
pub use error::{BoxError, ParamError, Result};
pub use event::{Event, EventType};
pub use executor::{AsyncExecutor, AsyncTask, async_executor, set_async_executor};
pub use key::{FromValue, ParamKey};
pub use kind::{
    Any, Boolean, Instance, Integer, List, Number, ParamKind, Selector, SlotDefault,
    SlotDefaults, Str, slot,
};
pub use object::{InstanceBuilder, Objects, Parameterized};
pub use owner::Owner;
pub use spec::DependencySpec;
pub use value::{ErasedValue, Generator, Value};
pub use watcher::{WatchBuilder, Watcher};
