// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = ParamError> = core::result::Result<T, E>;

/// Boxed error raised by user code inside a watcher or method callback.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Errors raised while declaring, mutating or observing parameters.
///
/// Every message carries the parameter name and, where it applies, the
/// qualified `Type.param` or instance context it failed on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParamError {
    /// A value was rejected by the validation hook of its parameter kind.
    #[error("{kind} parameter '{param}' {message}")]
    InvalidValue {
        /// Type name of the parameter kind, e.g. `Number`.
        kind: &'static str,
        /// Qualified parameter name, e.g. `P.x`.
        param: String,
        /// Description of the violated constraint.
        message: String,
    },

    /// A name used in an update, watch or trigger is not a parameter of the owner.
    #[error("'{name}' is not a parameter of {owner}")]
    UnknownParameter {
        /// Offending name.
        name: String,
        /// Class or instance the lookup ran on.
        owner: String,
    },

    /// The constructor was given a keyword that is not a parameter.
    #[error("{class}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword {
        /// Class being instantiated.
        class: String,
        /// Offending keyword.
        name: String,
    },

    /// Attempt to modify a read-only parameter.
    #[error("Read-only parameter '{name}' cannot be modified")]
    ReadOnly {
        /// Parameter name.
        name: String,
    },

    /// Attempt to modify a constant parameter after initialization.
    #[error("Constant parameter '{name}' cannot be modified")]
    Constant {
        /// Parameter name.
        name: String,
    },

    /// A typed accessor found a value of a different shape.
    #[error("parameter '{name}' holds {found}, expected {expected}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Requested Rust type.
        expected: &'static str,
        /// Type name of the stored value.
        found: &'static str,
    },

    /// An operation that needs a fully constructed instance ran too early.
    #[error("{action} on {owner} is not supported before the instance has been initialized")]
    NotInitialized {
        /// What was attempted.
        action: &'static str,
        /// Instance context.
        owner: String,
    },

    /// `initialize` was called twice.
    #[error("{owner} has already been initialized")]
    AlreadyInitialized {
        /// Instance context.
        owner: String,
    },

    /// An undeclared slot has no entry in the slot defaults of its kind.
    #[error(
        "Slot '{slot}' of parameter '{param}' has no default value defined in the slot defaults of {kind}"
    )]
    MissingSlotDefault {
        /// Slot name.
        slot: String,
        /// Qualified parameter name.
        param: String,
        /// Type name of the parameter kind.
        kind: &'static str,
    },

    /// A slot that the parameter kind does not declare.
    #[error("{kind} parameter '{param}' has no slot '{slot}'")]
    UnknownSlot {
        /// Slot name.
        slot: String,
        /// Qualified parameter name.
        param: String,
        /// Type name of the parameter kind.
        kind: &'static str,
    },

    /// The resolved default of a parameter failed validation while its class was built.
    #[error(
        "{class}.{param} default failed validation against the attributes inherited through {chain}: {source}"
    )]
    ClassDefinition {
        /// Class being built.
        class: String,
        /// Parameter name.
        param: String,
        /// Classes that contributed slots, nearest first, joined with `, `.
        chain: String,
        /// Underlying validation failure.
        #[source]
        source: Box<ParamError>,
    },

    /// The reserved `name` parameter was overridden by a non-string kind.
    #[error("{class}.name must be a String parameter, not {kind}")]
    InvalidNameOverride {
        /// Class being built.
        class: String,
        /// Kind that was used instead.
        kind: &'static str,
    },

    /// The bases of a class admit no consistent linearization.
    #[error("cannot create a consistent method resolution order for {class} (bases: {bases})")]
    InconsistentHierarchy {
        /// Class being built.
        class: String,
        /// Declared bases joined with `, `.
        bases: String,
    },

    /// The first segment of a nested dependency is not a parameter of its host.
    #[error(
        "Dependency '{spec}' could not be resolved, {owner} has no parameter or attribute '{segment}'"
    )]
    UnresolvedDependency {
        /// Object path of the dependency.
        spec: String,
        /// Host the path was resolved against.
        owner: String,
        /// Missing segment.
        segment: String,
    },

    /// The terminal attribute of a dependency is neither a parameter nor a method.
    #[error("Attribute '{attribute}' could not be resolved on {owner}.")]
    UnresolvedAttribute {
        /// Missing attribute.
        attribute: String,
        /// Object the attribute was looked up on.
        owner: String,
    },

    /// A dependency specification string is malformed.
    #[error("invalid dependency specification '{spec}': {reason}")]
    InvalidSpec {
        /// Raw specification.
        spec: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// User watchers must have a non-negative precedence.
    #[error(
        "watcher precedence must be non-negative, got {precedence}; negative precedences are reserved for internal watchers"
    )]
    NegativePrecedence {
        /// Rejected precedence.
        precedence: i32,
    },

    /// Strict unwatch of a watcher that is not registered.
    #[error("No such watcher {watcher} to remove.")]
    NoSuchWatcher {
        /// Display form of the watcher.
        watcher: String,
    },

    /// An asynchronous callback fired while no executor was installed.
    #[error("cannot run asynchronous callback '{callback}': no async executor is installed")]
    NoAsyncExecutor {
        /// Method or watcher that needed the executor.
        callback: String,
    },

    /// A method name that the class does not define.
    #[error("{owner} has no method '{method}'")]
    UnknownMethod {
        /// Method name.
        method: String,
        /// Class or instance context.
        owner: String,
    },

    /// An error raised by user code inside a callback.
    #[error("callback failed: {source}")]
    Callback {
        /// The user error.
        #[source]
        source: BoxError,
    },
}

impl ParamError {
    /// Wraps an arbitrary error raised inside a watcher or method body.
    ///
    /// ```rust
    /// use reparam::ParamError;
    ///
    /// let err = ParamError::callback("disk full");
    /// assert_eq!(err.to_string(), "callback failed: disk full");
    /// ```
    pub fn callback(source: impl Into<BoxError>) -> Self {
        Self::Callback {
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_parameter() {
        let err = ParamError::Constant { name: "x".into() };
        assert_eq!(err.to_string(), "Constant parameter 'x' cannot be modified");

        let err = ParamError::UnknownParameter {
            name: "nope".into(),
            owner: "P".into(),
        };
        assert_eq!(err.to_string(), "'nope' is not a parameter of P");
    }

    #[test]
    fn unwatch_message_suffix() {
        let err = ParamError::NoSuchWatcher {
            watcher: "Watcher(names=['a'])".into(),
        };
        assert!(err.to_string().ends_with("to remove."));
    }

    #[test]
    fn class_definition_keeps_source() {
        use core::error::Error as _;

        let inner = ParamError::InvalidValue {
            kind: "Number",
            param: "B.x".into(),
            message: "must be at most 5, not 7.".into(),
        };
        let err = ParamError::ClassDefinition {
            class: "B".into(),
            param: "x".into(),
            chain: "B, A".into(),
            source: Box::new(inner),
        };
        assert!(err.to_string().contains("B, A"));
        assert!(err.source().is_some());
    }
}
