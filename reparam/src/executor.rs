// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide hook for running asynchronous callbacks.
//!
//! Asynchronous watchers and `async` dependent methods produce an
//! [`AsyncTask`]; the core never polls it. It is handed to the executor
//! installed with [`set_async_executor`], which owns scheduling and
//! cancellation. Without an executor, firing such a callback fails with
//! [`ParamError::NoAsyncExecutor`].

use core::future::Future;
use core::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ParamError, Result};

/// A callback's pending work.
pub type AsyncTask = Pin<Box<dyn Future<Output = Result<()>>>>;

/// Runs [`AsyncTask`]s to completion.
pub type AsyncExecutor = Arc<dyn Fn(AsyncTask) + Send + Sync>;

static ASYNC_EXECUTOR: RwLock<Option<AsyncExecutor>> = parking_lot::const_rwlock(None);

/// Installs `executor`, or removes the current one with `None`.
///
/// Returns the previously installed executor.
pub fn set_async_executor(executor: Option<AsyncExecutor>) -> Option<AsyncExecutor> {
    core::mem::replace(&mut *ASYNC_EXECUTOR.write(), executor)
}

/// The installed executor, if any.
#[must_use]
pub fn async_executor() -> Option<AsyncExecutor> {
    ASYNC_EXECUTOR.read().clone()
}

/// Hands `task` to the installed executor.
pub(crate) fn spawn(callback: &str, task: AsyncTask) -> Result<()> {
    // Cloned so the lock is released before the executor runs.
    let Some(executor) = async_executor() else {
        return Err(ParamError::NoAsyncExecutor {
            callback: callback.into(),
        });
    };
    tracing::trace!(callback, "scheduling asynchronous callback");
    executor(task);
    Ok(())
}
