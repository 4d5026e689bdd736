// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched updates and triggers shared by classes and instances.

use crate::dispatch::{self, FrameKind};
use crate::error::{ParamError, Result};
use crate::event::Event;
use crate::owner::Owner;
use crate::value::Value;
use crate::watcher::VALUE;

/// Normalizes `(name, value)` pairs.
pub(crate) fn pairs<I, K, V>(values: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn check_names<'a>(owner: &Owner, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let class = owner.class();
    for name in names {
        if class.param(name).is_none() {
            return Err(owner.unknown(name));
        }
    }
    Ok(())
}

/// Sets every pair inside one batching frame.
///
/// Names, values and the `readonly`/`constant` guards are all checked
/// before the first one is stored, so a bad entry leaves the owner
/// untouched.
pub(crate) fn update(owner: &Owner, values: Vec<(String, Value)>) -> Result<()> {
    check_names(owner, values.iter().map(|(n, _)| n.as_str()))?;
    let guard_constants = owner.instance().is_some() && owner.is_initialized();
    for (name, value) in &values {
        let Some(param) = owner.effective_param(name) else {
            continue;
        };
        param.validate(value)?;
        if param.is_readonly() {
            return Err(ParamError::ReadOnly { name: name.clone() });
        }
        if guard_constants && param.is_constant() && !value.identical(&owner.raw_value(name)?) {
            return Err(ParamError::Constant { name: name.clone() });
        }
    }
    tracing::trace!(owner = %owner, count = values.len(), "batched update");
    dispatch::scoped(owner, FrameKind::Scope, || {
        for (name, value) in values {
            owner.set(&name, value)?;
        }
        Ok(())
    })
}

/// Applies `values` for the duration of `f`, then restores what was there.
///
/// An error from `f` wins over an error from the restore.
pub(crate) fn update_scoped<R>(
    owner: &Owner,
    values: Vec<(String, Value)>,
    f: impl FnOnce() -> Result<R>,
) -> Result<R> {
    check_names(owner, values.iter().map(|(n, _)| n.as_str()))?;
    let saved = values
        .iter()
        .map(|(name, _)| -> Result<(String, Value)> { Ok((name.clone(), owner.raw_value(name)?)) })
        .collect::<Result<Vec<_>>>()?;
    let result = update(owner, values).and_then(|()| f());
    let restored = update(owner, saved);
    let value = result?;
    restored?;
    Ok(value)
}

/// Notifies the value watchers of `names` as if each had been set to its
/// current value, even for watchers that only want changes.
pub(crate) fn trigger<I, S>(owner: &Owner, names: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    if !owner.is_initialized() {
        return Err(ParamError::NotInitialized {
            action: "Triggering parameters",
            owner: owner.to_string(),
        });
    }
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    check_names(owner, names.iter().map(String::as_str))?;
    dispatch::scoped(owner, FrameKind::Trigger, || {
        for name in &names {
            let value = owner.raw_value(name)?;
            let event = Event::new(owner.clone(), name, VALUE, value.clone(), value, true);
            dispatch::notify(owner, owner.value_watchers(name), event)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::event::EventType;
    use crate::{ClassBuilder, ParamDecl, Parameterized};

    fn host() -> Parameterized {
        ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .param("b", ParamDecl::integer())
            .build()
            .unwrap()
            .instance()
            .build()
            .unwrap()
    }

    #[test]
    fn invalid_value_aborts_whole_update() {
        let obj = host();
        let err = obj.update([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert!(matches!(err, Err(ParamError::InvalidValue { .. })));
        assert_eq!(obj.get("a").unwrap(), Value::Int(0));
    }

    #[test]
    fn constant_entry_aborts_whole_update() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .param("c", ParamDecl::integer().constant(true))
            .build()
            .unwrap();
        let obj = cls.instance().build().unwrap();
        let err = obj.update([("a", 1), ("c", 5)]);
        assert!(matches!(err, Err(ParamError::Constant { .. })));
        assert_eq!(obj.get("a").unwrap(), Value::Int(0));

        // Re-setting the identical value is not a modification.
        obj.update([("a", 1), ("c", 0)]).unwrap();
        assert_eq!(obj.get("a").unwrap(), Value::Int(1));
    }

    #[test]
    fn trigger_reaches_onlychanged_watchers() {
        let obj = host();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        obj.watch(["a", "b"], move |events| {
            sink.borrow_mut()
                .push(events.iter().map(|e| (e.name.clone(), e.event_type)).collect::<Vec<_>>());
            Ok(())
        })
        .unwrap();
        obj.trigger(["a", "b"]).unwrap();
        assert_eq!(
            *seen.borrow(),
            [vec![
                ("a".to_string(), EventType::Triggered),
                ("b".to_string(), EventType::Triggered)
            ]]
        );
    }

    #[test]
    fn trigger_requires_initialization() {
        let cls = ClassBuilder::new("P")
            .param("a", ParamDecl::integer())
            .build()
            .unwrap();
        let obj = Parameterized::uninitialized(&cls);
        assert!(matches!(
            obj.trigger(["a"]),
            Err(ParamError::NotInitialized { .. })
        ));
    }

    #[test]
    fn scoped_update_restores_after_failure() {
        let obj = host();
        obj.set("a", 3).unwrap();
        let result: Result<()> = obj.update_scoped([("a", 10)], |obj| {
            assert_eq!(obj.get("a")?, Value::Int(10));
            Err(ParamError::callback("boom"))
        });
        assert!(result.is_err());
        assert_eq!(obj.get("a").unwrap(), Value::Int(3));
    }
}
