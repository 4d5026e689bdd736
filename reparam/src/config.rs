// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-class runtime configuration.

use std::fmt;
use std::rc::Rc;

/// Source of the current time for time-dependent dynamic values.
pub type TimeSource = Rc<dyn Fn() -> f64>;

/// Behavior switches attached to a class with
/// [`ClassBuilder::config`](crate::ClassBuilder::config).
///
/// Subclasses inherit the configuration of their first base that has one.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use reparam::Config;
///
/// let now = Rc::new(Cell::new(0.0));
/// let clock = Rc::clone(&now);
/// let config = Config::default()
///     .warnings_as_errors(true)
///     .time_dependent(true)
///     .time_fn(move || clock.get());
///
/// now.set(2.0);
/// assert_eq!(config.current_time(), Some(2.0));
/// assert!(config.is_strict());
/// ```
#[derive(Clone, Default)]
pub struct Config {
    warnings_as_errors: bool,
    time_dependent: bool,
    time_fn: Option<TimeSource>,
}

impl Config {
    /// Turns soft failures (unwatching an unknown watcher) into errors.
    #[must_use]
    pub fn warnings_as_errors(mut self, strict: bool) -> Self {
        self.warnings_as_errors = strict;
        self
    }

    /// Recomputes dynamic values only when the time source advances.
    #[must_use]
    pub fn time_dependent(mut self, time_dependent: bool) -> Self {
        self.time_dependent = time_dependent;
        self
    }

    /// Installs the time source consulted by time-dependent dynamic values.
    #[must_use]
    pub fn time_fn(mut self, f: impl Fn() -> f64 + 'static) -> Self {
        self.time_fn = Some(Rc::new(f));
        self
    }

    /// Whether soft failures are raised as errors.
    #[must_use]
    #[inline]
    pub fn is_strict(&self) -> bool {
        self.warnings_as_errors
    }

    /// Current time stamp, when dynamic values are time dependent.
    #[must_use]
    pub fn current_time(&self) -> Option<f64> {
        if !self.time_dependent {
            return None;
        }
        self.time_fn.as_ref().map(|f| f())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("warnings_as_errors", &self.warnings_as_errors)
            .field("time_dependent", &self.time_dependent)
            .field("time_fn", &self.time_fn.is_some())
            .finish()
    }
}
