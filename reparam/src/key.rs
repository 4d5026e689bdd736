// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed parameter keys.
//!
//! Parameters are addressed by name at runtime. A [`ParamKey<T>`] pairs a
//! name with the Rust type its values convert to, so reads come back typed
//! instead of as a [`Value`].

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use crate::error::{ParamError, Result};
use crate::object::Parameterized;
use crate::value::Value;

/// Conversion out of a [`Value`].
pub trait FromValue: Sized {
    /// Type name used in mismatch errors.
    const EXPECTED: &'static str;

    /// Converts `value`, or returns `None` if it holds another type.
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any value";

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    // Integers widen.
    fn from_value(value: Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "str";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for Vec<Value> {
    const EXPECTED: &'static str = "list";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl FromValue for Parameterized {
    const EXPECTED: &'static str = "Parameterized";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::None => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A parameter name tagged with the type of its values.
///
/// # Example
///
/// ```rust
/// use reparam::{ClassBuilder, ParamDecl, ParamKey};
///
/// const GAIN: ParamKey<f64> = ParamKey::new("gain");
///
/// let cls = ClassBuilder::new("Amp")
///     .param("gain", ParamDecl::number().default(1.5))
///     .build()
///     .unwrap();
/// let amp = cls.instance().build().unwrap();
///
/// assert_eq!(GAIN.get(&amp).unwrap(), 1.5);
/// GAIN.set(&amp, 2.0).unwrap();
/// assert_eq!(GAIN.get(&amp).unwrap(), 2.0);
/// ```
pub struct ParamKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParamKey<T> {
    /// Creates a key for the parameter `name`.
    #[must_use]
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Parameter name.
    #[must_use]
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: FromValue> ParamKey<T> {
    /// Reads the value from `obj`.
    pub fn get(&self, obj: &Parameterized) -> Result<T> {
        let value = obj.get(self.name)?;
        let found = value.type_name();
        T::from_value(value).ok_or_else(|| ParamError::TypeMismatch {
            name: self.name.into(),
            expected: T::EXPECTED,
            found,
        })
    }
}

impl<T: Into<Value>> ParamKey<T> {
    /// Sets the value on `obj` through the validating set path.
    pub fn set(&self, obj: &Parameterized, value: T) -> Result<()> {
        obj.set(self.name, value)
    }
}

// Manual trait implementations to avoid requiring T: Clone, etc.
impl<T> Copy for ParamKey<T> {}

impl<T> Clone for ParamKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for ParamKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for ParamKey<T> {}

impl<T> Hash for ParamKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<T> fmt::Debug for ParamKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamKey")
            .field("name", &self.name)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassBuilder, ParamDecl};

    #[test]
    fn mismatch_names_both_types() {
        let cls = ClassBuilder::new("P")
            .param("label", ParamDecl::string().default("x"))
            .build()
            .unwrap();
        let obj = cls.instance().build().unwrap();
        const LABEL_AS_INT: ParamKey<i64> = ParamKey::new("label");
        let err = LABEL_AS_INT.get(&obj).unwrap_err();
        assert!(matches!(
            err,
            ParamError::TypeMismatch { expected: "int", found: "str", .. }
        ));
    }

    #[test]
    fn optional_values() {
        let cls = ClassBuilder::new("P")
            .param("n", ParamDecl::integer().default(Value::None))
            .build()
            .unwrap();
        let obj = cls.instance().build().unwrap();
        let key: ParamKey<Option<i64>> = ParamKey::new("n");
        assert_eq!(key.get(&obj).unwrap(), None);
        obj.set("n", 3).unwrap();
        assert_eq!(key.get(&obj).unwrap(), Some(3));
    }

    #[test]
    fn keys_compare_by_name() {
        let a: ParamKey<i64> = ParamKey::new("a");
        let copy = a;
        assert_eq!(a, copy);
        assert_ne!(a, ParamKey::new("b"));
        assert!(format!("{a:?}").contains("i64"));
    }
}
