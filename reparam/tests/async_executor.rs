// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous callbacks and the process-wide executor hook.
//!
//! The executor is global, so everything runs in a single test.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use reparam::{
    AsyncTask, ClassBuilder, Depends, Event, ParamDecl, ParamError, Parameterized, Value,
    set_async_executor,
};

fn block_on(mut task: AsyncTask) {
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        if let Poll::Ready(result) = task.as_mut().poll(&mut cx) {
            result.unwrap();
            return;
        }
    }
}

#[test]
fn async_callbacks_run_on_the_installed_executor() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let cls = ClassBuilder::new("Remote")
        .param("a", ParamDecl::integer())
        .async_method(
            "refresh",
            Depends::on(["a"]).watch(),
            move |obj: &Parameterized| -> AsyncTask {
                let sink = Rc::clone(&sink);
                let value = obj.get("a");
                Box::pin(async move {
                    sink.borrow_mut().push(format!("method {}", value?));
                    Ok(())
                })
            },
        )
        .build()
        .unwrap();
    let obj = cls.instance().build().unwrap();

    set_async_executor(None);
    let err = obj.set("a", 1).unwrap_err();
    assert!(matches!(err, ParamError::NoAsyncExecutor { ref callback } if callback == "refresh"));
    assert_eq!(obj.get("a").unwrap(), Value::Int(1));

    let previous = set_async_executor(Some(Arc::new(block_on)));
    assert!(previous.is_none());

    obj.set("a", 2).unwrap();
    assert_eq!(*log.borrow(), ["method 2"]);

    let sink = Rc::clone(&log);
    obj.watcher(["a"])
        .precedence(1)
        .call_async(move |events: Vec<Event>| -> AsyncTask {
            let sink = Rc::clone(&sink);
            Box::pin(async move {
                sink.borrow_mut()
                    .push(format!("watcher {}", events[0].new));
                Ok(())
            })
        })
        .unwrap();

    obj.set("a", 3).unwrap();
    obj.call_method("refresh").unwrap();
    assert_eq!(
        *log.borrow(),
        ["method 2", "method 3", "watcher 3", "method 3"]
    );

    assert!(set_async_executor(None).is_some());
    assert!(reparam::async_executor().is_none());
}
