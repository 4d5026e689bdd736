// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamically typed parameter values.
//!
//! [`Value`] is what every parameter stores and what watchers receive in
//! their events. Host objects and classes are values too, which is what lets
//! dependency specifications walk `sub.subsub.name` paths.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::class::ParamClass;
use crate::error::Result;
use crate::object::Parameterized;

/// A type-erased value with clone and equality support.
///
/// Used for payloads that have no dedicated [`Value`] variant.
///
/// # Example
///
/// ```rust
/// use reparam::ErasedValue;
///
/// let value = ErasedValue::new((1_u8, 'x'));
/// assert!(value.is::<(u8, char)>());
/// assert_eq!(value.downcast_ref::<(u8, char)>(), Some(&(1, 'x')));
/// assert!(value.is_equal(&ErasedValue::new((1_u8, 'x'))));
/// ```
pub struct ErasedValue {
    inner: Box<dyn ErasedValueTrait>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ErasedValue {
    /// Creates a new erased value from a concrete value.
    #[must_use]
    pub fn new<T: Clone + PartialEq + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Attempts to downcast to a reference of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.is::<T>() {
            self.inner.as_any().downcast_ref()
        } else {
            None
        }
    }

    /// Compares two erased values; values of different types are never equal.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.inner.eq_dyn(other.inner.as_any())
    }

    /// Name of the contained Rust type.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_boxed(),
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

trait ErasedValueTrait: Any {
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait>;
    fn eq_dyn(&self, other: &dyn Any) -> bool;
}

impl<T: Clone + PartialEq + 'static> ErasedValueTrait for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValueTrait> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }
}

/// A "compute this value" default.
///
/// Parameters whose kind is dynamic (see
/// [`ParamKind::is_dynamic`](crate::ParamKind::is_dynamic)) call the
/// generator on every read, or once per time step when the owning class is
/// configured as time dependent. The last produced value is kept for
/// [`Parameterized::inspect_value`].
///
/// Clones share state; instances receive a fresh generator over the same
/// function when they are created.
#[derive(Clone)]
pub struct Generator {
    func: Rc<dyn Fn() -> Value>,
    state: Rc<GeneratorState>,
}

#[derive(Default)]
struct GeneratorState {
    last: RefCell<Option<Value>>,
    stamp: Cell<Option<f64>>,
}

impl Generator {
    /// Wraps a zero-argument function.
    pub fn new(func: impl Fn() -> Value + 'static) -> Self {
        Self {
            func: Rc::new(func),
            state: Rc::default(),
        }
    }

    /// The most recently produced value, if any.
    #[must_use]
    pub fn last(&self) -> Option<Value> {
        self.state.last.borrow().clone()
    }

    /// A generator over the same function with no produced history.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
            state: Rc::default(),
        }
    }

    /// Produces a value, reusing the last one when `time` has not advanced.
    pub(crate) fn produce(&self, time: Option<f64>, force: bool) -> Value {
        if !force
            && time.is_some()
            && self.state.stamp.get() == time
            && let Some(last) = self.last()
        {
            return last;
        }
        let value = (self.func)();
        *self.state.last.borrow_mut() = Some(value.clone());
        self.state.stamp.set(time);
        value
    }

    #[inline]
    fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("last", &self.state.last.borrow())
            .finish_non_exhaustive()
    }
}

/// A parameter value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value.
    #[default]
    None,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// A host object.
    Object(Parameterized),
    /// A host class.
    Class(ParamClass),
    /// A value computed on read.
    Generator(Generator),
    /// Any other clonable, comparable payload.
    Opaque(ErasedValue),
}

impl Value {
    /// Builds a list value.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Wraps an arbitrary comparable payload.
    pub fn opaque<T: Clone + PartialEq + 'static>(value: T) -> Self {
        Self::Opaque(ErasedValue::new(value))
    }

    /// Returns `true` for [`Value::None`].
    #[must_use]
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The numeric payload; integers widen to floats.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The host object payload.
    #[must_use]
    pub fn as_object(&self) -> Option<&Parameterized> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The host class payload.
    #[must_use]
    pub fn as_class(&self) -> Option<&ParamClass> {
        match self {
            Self::Class(cls) => Some(cls),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Class(_) => "class",
            Self::Generator(_) => "generator",
            Self::Opaque(v) => v.type_name(),
        }
    }

    /// Equality used for change detection.
    ///
    /// Numbers compare across `Int` and `Float`, lists compare element-wise,
    /// objects, classes and generators compare by identity.
    #[must_use]
    pub fn is_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_equal(y))
            }
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Class(a), Self::Class(b)) => a.ptr_eq(b),
            (Self::Generator(a), Self::Generator(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.is_equal(b),
            _ => false,
        }
    }

    /// Whether `other` is the very same value, as required to re-set a constant.
    ///
    /// Scalars are identical when equal; containers and opaque payloads never are.
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(_), _) | (Self::Opaque(_), _) => false,
            (Self::Int(_), Self::Float(_)) | (Self::Float(_), Self::Int(_)) => false,
            _ => self.is_equal(other),
        }
    }

    /// Copies the value for a parameter that instantiates its default.
    ///
    /// Host objects are copied into fresh instances of the same class,
    /// generators are restarted, everything else is cloned.
    pub fn deep_copy(&self) -> Result<Self> {
        Ok(match self {
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(Self::deep_copy)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Self::Object(obj) => Self::Object(obj.deep_copy()?),
            Self::Generator(generator) => Self::Generator(generator.fresh()),
            other => other.clone(),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(obj) => write!(f, "{obj}"),
            Self::Class(cls) => write!(f, "{}", cls.name()),
            Self::Generator(_) => f.write_str("<generator>"),
            Self::Opaque(v) => write!(f, "<{}>", v.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

impl From<Parameterized> for Value {
    fn from(value: Parameterized) -> Self {
        Self::Object(value)
    }
}

impl From<&Parameterized> for Value {
    fn from(value: &Parameterized) -> Self {
        Self::Object(value.clone())
    }
}

impl From<ParamClass> for Value {
    fn from(value: ParamClass) -> Self {
        Self::Class(value)
    }
}

impl From<Generator> for Value {
    fn from(value: Generator) -> Self {
        Self::Generator(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}
