// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for dependent methods.
//!
//! A class with one counter per method exercises flat, slot, nested and
//! doubly nested dependencies, including rebinding when a sub-object is
//! replaced.

use std::cell::RefCell;
use std::rc::Rc;

use reparam::{
    ClassBuilder, Depends, Intermediate, ParamClass, ParamDecl, ParamError, Parameterized, Result,
    Value,
};

fn bump(obj: &Parameterized, counter: &str) -> Result<()> {
    let count = obj.get(counter)?.as_int().unwrap_or_default();
    obj.set(counter, count + 1)
}

fn count(obj: &Parameterized, counter: &str) -> i64 {
    obj.get(counter).unwrap().as_int().unwrap()
}

fn counting_class() -> ParamClass {
    ClassBuilder::new("P")
        .param("a", ParamDecl::any())
        .param("b", ParamDecl::any())
        .param("single_count", ParamDecl::integer())
        .param("attr_count", ParamDecl::integer())
        .param("single_nested_count", ParamDecl::integer())
        .param("double_nested_count", ParamDecl::integer())
        .param("nested_attr_count", ParamDecl::integer())
        .param("nested_count", ParamDecl::integer())
        .method("single_parameter", Depends::on(["a"]).watch(), |obj| {
            bump(obj, "single_count")
        })
        .method("constant", Depends::on(["a:constant"]).watch(), |obj| {
            bump(obj, "attr_count")
        })
        .method("single_nested", Depends::on(["b.a"]).watch(), |obj| {
            bump(obj, "single_nested_count")
        })
        .method("double_nested", Depends::on(["b.b.a"]).watch(), |obj| {
            bump(obj, "double_nested_count")
        })
        .method(
            "nested_attribute",
            Depends::on(["b.a:constant"]).watch(),
            |obj| bump(obj, "nested_attr_count"),
        )
        .method("nested", Depends::on(["b.param"]).watch(), |obj| {
            bump(obj, "nested_count")
        })
        .build()
        .unwrap()
}

#[test]
fn flat_dependencies() {
    let cls = counting_class();
    let obj = cls.instance().build().unwrap();

    obj.set("a", 1).unwrap();
    assert_eq!(count(&obj, "single_count"), 1);
    obj.set("a", 1).unwrap();
    assert_eq!(count(&obj, "single_count"), 1);

    obj.param_object("a")
        .unwrap()
        .set_slot("constant", true)
        .unwrap();
    assert_eq!(count(&obj, "attr_count"), 1);
    assert_eq!(count(&obj, "single_count"), 1);
}

#[test]
fn initial_sub_object_is_not_watched_after_replacement() {
    let cls = counting_class();
    let init_b = cls.instance().build().unwrap();
    let inst = cls.instance().with("b", &init_b).build().unwrap();
    assert_eq!(
        inst.params_depended_on("single_nested", Intermediate::Yes)
            .unwrap()
            .len(),
        2
    );

    let new_b = cls.instance().build().unwrap();
    inst.set("b", &new_b).unwrap();
    let deps = inst
        .params_depended_on("single_nested", Intermediate::No)
        .unwrap();
    assert_eq!(deps.len(), 1);
    assert!(deps[0].instance().is_some_and(|o| o.ptr_eq(&new_b)));
    assert_eq!(deps[0].name, "a");

    // `a` is `None` on both objects: rebinding alone does not call.
    assert_eq!(count(&inst, "single_nested_count"), 0);

    new_b.set("a", 1).unwrap();
    assert_eq!(count(&inst, "single_nested_count"), 1);

    init_b.set("a", 2).unwrap();
    assert_eq!(count(&inst, "single_nested_count"), 1);
}

#[test]
fn only_intermediates() {
    let cls = counting_class();
    let init_b = cls.instance().build().unwrap();
    let inst = cls.instance().with("b", &init_b).build().unwrap();
    let deps = inst
        .params_depended_on("single_nested", Intermediate::Only)
        .unwrap();
    assert_eq!(deps.len(), 1);
    assert!(deps[0].instance().is_some_and(|o| o.ptr_eq(&inst)));
    assert_eq!(deps[0].name, "b");
}

#[test]
fn double_nested_rebinding() {
    let cls = counting_class();
    let inst = cls.instance().build().unwrap();
    assert!(
        inst.params_depended_on("double_nested", Intermediate::Yes)
            .unwrap()
            .is_empty()
    );

    let inner = cls.instance().build().unwrap();
    let middle = cls.instance().with("b", &inner).build().unwrap();
    inst.set("b", &middle).unwrap();

    let deps = inst
        .params_depended_on("double_nested", Intermediate::Yes)
        .unwrap();
    assert_eq!(deps.len(), 3);
    assert!(deps.iter().all(|d| d.what == "value"));
    assert!(deps.iter().any(|d| d.name == "b" && d.instance().is_some_and(|o| o.ptr_eq(&inst))));
    assert!(deps.iter().any(|d| d.name == "b" && d.instance().is_some_and(|o| o.ptr_eq(&middle))));
    assert!(deps.iter().any(|d| d.name == "a" && d.instance().is_some_and(|o| o.ptr_eq(&inner))));
    assert_eq!(count(&inst, "double_nested_count"), 1);

    inner.set("a", 1).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 2);

    let replacement = cls.instance().with("a", 3).build().unwrap();
    middle.set("b", &replacement).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 3);

    // The replaced object is no longer watched.
    inner.set("a", 4).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 3);

    // Same value of `a`: rebound without calling.
    let same = cls.instance().with("a", 3).build().unwrap();
    middle.set("b", &same).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 3);

    same.set("a", 4).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 4);

    middle
        .set("b", cls.instance().with("a", 3).build().unwrap())
        .unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 5);
}

#[test]
fn double_nested_partially_initialized() {
    let cls = counting_class();
    let middle = cls.instance().build().unwrap();
    let inst = cls.instance().with("b", &middle).build().unwrap();

    let deps = inst
        .params_depended_on("double_nested", Intermediate::Yes)
        .unwrap();
    assert_eq!(deps.len(), 2);
    assert!(deps.iter().all(|d| d.name == "b"));

    let inner = cls.instance().build().unwrap();
    middle.set("b", &inner).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 1);

    inner.set("a", 1).unwrap();
    assert_eq!(count(&inst, "double_nested_count"), 2);
}

#[test]
fn nested_slot_dependency() {
    let cls = counting_class();
    let inst = cls.instance().build().unwrap();
    assert!(
        inst.params_depended_on("nested_attribute", Intermediate::Yes)
            .unwrap()
            .is_empty()
    );

    let sub = cls.instance().build().unwrap();
    inst.set("b", &sub).unwrap();
    let deps = inst
        .params_depended_on("nested_attribute", Intermediate::Yes)
        .unwrap();
    let whats: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.what.as_str())).collect();
    assert_eq!(whats, [("b", "value"), ("a", "constant")]);
    assert_eq!(count(&inst, "nested_attr_count"), 1);

    sub.param_object("a")
        .unwrap()
        .set_slot("constant", true)
        .unwrap();
    assert_eq!(count(&inst, "nested_attr_count"), 2);

    // Replacement carries the same slot value: no call.
    let other = cls.instance().build().unwrap();
    other
        .param_object("a")
        .unwrap()
        .set_slot("constant", true)
        .unwrap();
    inst.set("b", &other).unwrap();
    assert_eq!(count(&inst, "nested_attr_count"), 2);
}

#[test]
fn whole_sub_object_dependency() {
    let cls = counting_class();
    let sub = cls.instance().build().unwrap();
    let inst = cls.instance().with("b", &sub).build().unwrap();
    let before = count(&inst, "nested_count");

    sub.set("a", "changed").unwrap();
    assert!(count(&inst, "nested_count") > before);
}

#[test]
fn misspelled_watched_dependency_fails_at_build() {
    let err = ClassBuilder::new("Typo")
        .param("a", ParamDecl::any())
        .method("m", Depends::on(["aa"]).watch(), |_| Ok(()))
        .build()
        .unwrap_err();
    assert!(matches!(err, ParamError::UnresolvedAttribute { ref attribute, .. } if attribute == "aa"));
    assert_eq!(err.to_string(), "Attribute 'aa' could not be resolved on Typo.");

    // Not watched: only resolved when asked.
    let cls = ClassBuilder::new("Lazy")
        .param("a", ParamDecl::any())
        .method("m", Depends::on(["aa"]), |_| Ok(()))
        .build()
        .unwrap();
    assert!(cls.params_depended_on("m", Intermediate::No).is_err());
}

#[test]
fn nested_root_must_exist() {
    let cls = ClassBuilder::new("P")
        .param("a", ParamDecl::any())
        .method("m", Depends::on(["missing.a"]).watch(), |_| Ok(()))
        .build()
        .unwrap();
    assert!(matches!(
        cls.instance().build(),
        Err(ParamError::UnresolvedDependency { .. })
    ));
}

#[test]
fn on_init_runs_once_after_construction() {
    let runs = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&runs);
    let cls = ClassBuilder::new("P")
        .param("a", ParamDecl::integer())
        .method("m", Depends::on(["a"]).watch().on_init(), move |obj| {
            sink.borrow_mut().push(obj.get("a")?);
            Ok(())
        })
        .build()
        .unwrap();
    let obj = cls.instance().with("a", 4).build().unwrap();
    assert_eq!(*runs.borrow(), [Value::Int(4)]);
    obj.set("a", 5).unwrap();
    assert_eq!(*runs.borrow(), [Value::Int(4), Value::Int(5)]);
}

#[test]
fn queued_methods_run_after_the_batch() {
    let cls = ClassBuilder::new("P")
        .param("a", ParamDecl::integer())
        .param("b", ParamDecl::integer())
        .param("copies", ParamDecl::integer())
        .method("mirror", Depends::on(["a"]).queued(), |obj| {
            let a = obj.get("a")?;
            obj.set("b", a)
        })
        .method("count", Depends::on(["b"]).watch(), |obj| bump(obj, "copies"))
        .build()
        .unwrap();
    let obj = cls.instance().build().unwrap();
    obj.set("a", 2).unwrap();
    assert_eq!(obj.get("b").unwrap(), Value::Int(2));
    assert_eq!(count(&obj, "copies"), 1);
}

#[test]
fn subclass_methods_run_after_inherited_ones() {
    let values = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&values);
    let a = ClassBuilder::new("A")
        .param("a", ParamDecl::string())
        .method("test", Depends::on(["a"]).watch(), move |obj| {
            let value = obj.get("a")?;
            sink.borrow_mut()
                .push(value.as_str().unwrap_or_default().to_owned());
            Ok(())
        })
        .build()
        .unwrap();
    let sink = Rc::clone(&values);
    let b = ClassBuilder::new("B")
        .base(&a)
        .method("more_test", Depends::on(["a"]).watch(), move |obj| {
            let value = obj.get("a")?;
            sink.borrow_mut()
                .push(value.as_str().unwrap_or_default().to_uppercase());
            Ok(())
        })
        .build()
        .unwrap();

    let obj = b.instance().build().unwrap();
    obj.set("a", "a").unwrap();
    assert_eq!(*values.borrow(), ["a", "A"]);
}

#[test]
fn call_method_and_unknown_method() {
    let cls = counting_class();
    let obj = cls.instance().build().unwrap();
    obj.call_method("single_parameter").unwrap();
    assert_eq!(count(&obj, "single_count"), 1);
    assert!(matches!(
        obj.call_method("nope"),
        Err(ParamError::UnknownMethod { .. })
    ));
}
