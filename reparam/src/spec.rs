// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency specification strings.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{ParamError, Result};
use crate::watcher::VALUE;

/// A parsed dependency such as `sub.inner.gain:bounds`.
///
/// The part before `:` is a dotted path whose last segment names a
/// parameter (or method) and whose leading segments name the parameters
/// holding the sub-objects to walk through. The part after `:` selects the
/// watched attribute and defaults to `value`.
///
/// # Example
///
/// ```rust
/// use reparam::DependencySpec;
///
/// let spec = DependencySpec::parse("sub.inner.gain:bounds").unwrap();
/// assert_eq!(spec.path(), ["sub", "inner"]);
/// assert_eq!(spec.attribute(), "gain");
/// assert_eq!(spec.what(), "bounds");
/// assert_eq!(spec.root(), "sub");
///
/// let flat = DependencySpec::parse("gain").unwrap();
/// assert!(!flat.is_nested());
/// assert_eq!(flat.what(), "value");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencySpec {
    raw: String,
    path: SmallVec<[String; 2]>,
    attribute: String,
    what: String,
    explicit_what: bool,
}

impl DependencySpec {
    /// Parses `spec`.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason| ParamError::InvalidSpec {
            spec: spec.into(),
            reason,
        };
        let trimmed = spec.trim();
        if trimmed.matches(':').count() > 1 {
            return Err(invalid("at most one ':' is allowed"));
        }
        let (dotted, what) = match trimmed.split_once(':') {
            Some((dotted, what)) => (dotted, what),
            None => (trimmed, ""),
        };
        let mut segments: SmallVec<[String; 2]> = dotted.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(invalid("empty path segment"));
        }
        let attribute = segments.pop().ok_or_else(|| invalid("missing attribute"))?;
        Ok(Self {
            raw: trimmed.into(),
            path: segments,
            attribute,
            what: if what.is_empty() { VALUE.into() } else { what.into() },
            explicit_what: !what.is_empty(),
        })
    }

    /// The specification as written, trimmed.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Sub-object segments leading to the attribute.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Terminal parameter or method name.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Watched attribute: `value` or a slot name.
    #[must_use]
    pub fn what(&self) -> &str {
        &self.what
    }

    /// Whether the attribute was given after `:`.
    #[must_use]
    pub fn has_explicit_what(&self) -> bool {
        self.explicit_what
    }

    /// First segment: the parameter on the host the dependency hangs off.
    #[must_use]
    pub fn root(&self) -> &str {
        self.path.first().unwrap_or(&self.attribute)
    }

    /// Whether the dependency reaches through a sub-object.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        !self.path.is_empty()
    }

    /// Dotted path of the sub-object, `None` for flat specs.
    #[must_use]
    pub fn object_path(&self) -> Option<String> {
        self.is_nested().then(|| self.path.join("."))
    }

    /// Every segment including the attribute.
    pub(crate) fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.path
            .iter()
            .map(String::as_str)
            .chain(core::iter::once(self.attribute.as_str()))
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_spec() {
        let spec = DependencySpec::parse(" a ").unwrap();
        assert_eq!(spec.raw(), "a");
        assert_eq!(spec.root(), "a");
        assert_eq!(spec.object_path(), None);
        assert!(!spec.has_explicit_what());
    }

    #[test]
    fn nested_spec_with_slot() {
        let spec = DependencySpec::parse("b.c.d:constant").unwrap();
        assert_eq!(spec.object_path().as_deref(), Some("b.c"));
        assert_eq!(spec.segments().collect::<Vec<_>>(), ["b", "c", "d"]);
        assert_eq!(spec.what(), "constant");
        assert!(spec.has_explicit_what());
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for bad in ["a:b:c", "a..b", ".a", "", "a.:value"] {
            assert!(
                matches!(DependencySpec::parse(bad), Err(ParamError::InvalidSpec { .. })),
                "{bad}"
            );
        }
    }
}
