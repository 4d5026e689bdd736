// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event dispatch with an explicit batching stack.
//!
//! Every owner (class or instance) carries a [`DispatchState`]: a stack of
//! frames plus the events and watchers collected while any frame is open.
//! With no frame open an event is delivered on the spot; inside a frame it
//! is queued and delivered when the outermost running frame closes.
//!
//! Frames:
//!
//! - `Scope`: a batched update; closing the outermost one flushes.
//! - `Trigger`: like `Scope`, opened by `trigger`.
//! - `Queued`: open while a queued watcher runs, so the changes it makes are
//!   collected instead of re-entering dispatch. Closing it never flushes.
//! - `Discard`: everything collected while it is open is dropped on close.
//!
//! Flushing delivers every queued watcher once, in ascending precedence,
//! with the events for the names it watches in first-change order. Changes
//! made by callbacks on another owner are dispatched through that owner's
//! state and finish before control returns (depth-first).

use std::mem;

use crate::error::Result;
use crate::event::Event;
use crate::owner::Owner;
use crate::watcher::Watcher;

/// Kind of batching frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Scope,
    Trigger,
    Queued,
    Discard,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    saved: Option<(Vec<Event>, Vec<Watcher>)>,
}

/// Per-owner batching stack and pending notifications.
#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    frames: Vec<Frame>,
    events: Vec<Event>,
    watchers: Vec<Watcher>,
}

impl DispatchState {
    #[inline]
    pub(crate) fn is_batching(&self) -> bool {
        !self.frames.is_empty()
    }

    fn enqueue(&mut self, event: Event, watcher: &Watcher) {
        if let Some(pending) = self.events.iter_mut().find(|e| e.same_key(&event)) {
            pending.merge(event);
        } else {
            self.events.push(event);
        }
        if !self.watchers.iter().any(|w| w.ptr_eq(watcher)) {
            self.watchers.push(watcher.clone());
        }
    }
}

fn is_batching(owner: &Owner) -> bool {
    owner.dispatch_state().borrow().is_batching()
}

fn enter(owner: &Owner, kind: FrameKind) {
    let mut state = owner.dispatch_state().borrow_mut();
    let saved = (kind == FrameKind::Discard)
        .then(|| (state.events.clone(), state.watchers.clone()));
    state.frames.push(Frame { kind, saved });
}

/// Closes the innermost frame; returns whether a flush is due.
fn exit(owner: &Owner) -> bool {
    let mut state = owner.dispatch_state().borrow_mut();
    let Some(frame) = state.frames.pop() else {
        return false;
    };
    if let Some((events, watchers)) = frame.saved {
        state.events = events;
        state.watchers = watchers;
        return false;
    }
    !state.is_batching() && frame.kind != FrameKind::Queued
}

/// Runs `f` inside a frame of the given kind.
///
/// The frame is closed even when `f` fails. Closing the outermost
/// `Scope`/`Trigger` frame flushes whatever was stored before the failure;
/// the error of `f` takes priority over one raised while flushing.
pub(crate) fn scoped<R>(
    owner: &Owner,
    kind: FrameKind,
    f: impl FnOnce() -> Result<R>,
) -> Result<R> {
    enter(owner, kind);
    let result = f();
    if exit(owner) {
        let flushed = flush(owner);
        let value = result?;
        flushed?;
        return Ok(value);
    }
    result
}

/// Delivers `event` to `watchers` (ascending precedence, ties in
/// registration order), or queues it when the owner is batching.
pub(crate) fn notify(owner: &Owner, mut watchers: Vec<Watcher>, event: Event) -> Result<()> {
    watchers.sort_by_key(Watcher::dispatch_key);
    for watcher in &watchers {
        call_watcher(owner, watcher, &event)?;
    }
    if !is_batching(owner) {
        flush(owner)?;
    }
    Ok(())
}

fn call_watcher(owner: &Owner, watcher: &Watcher, event: &Event) -> Result<()> {
    if !event.is_triggered() && watcher.onlychanged() && !event.changed() {
        return Ok(());
    }
    {
        let mut state = owner.dispatch_state().borrow_mut();
        if state.is_batching() {
            state.enqueue(event.clone(), watcher);
            return Ok(());
        }
    }
    execute(owner, watcher, vec![event.typed(watcher.onlychanged())])
}

fn execute(owner: &Owner, watcher: &Watcher, events: Vec<Event>) -> Result<()> {
    if watcher.queued() {
        scoped(owner, FrameKind::Queued, || watcher.invoke(events))
    } else {
        watcher.invoke(events)
    }
}

/// Delivers everything queued on `owner` until nothing is left.
pub(crate) fn flush(owner: &Owner) -> Result<()> {
    loop {
        let (events, mut watchers) = {
            let mut state = owner.dispatch_state().borrow_mut();
            if state.events.is_empty() {
                state.watchers.clear();
                return Ok(());
            }
            (mem::take(&mut state.events), mem::take(&mut state.watchers))
        };
        tracing::trace!(
            owner = %owner,
            events = events.len(),
            watchers = watchers.len(),
            "flushing batched notifications"
        );
        watchers.sort_by_key(Watcher::dispatch_key);
        for watcher in &watchers {
            let batch: Vec<Event> = events
                .iter()
                .filter(|e| watcher.watches(e))
                .filter(|e| e.is_triggered() || !watcher.onlychanged() || e.changed())
                .map(|e| e.typed(watcher.onlychanged()))
                .collect();
            if !batch.is_empty() {
                execute(owner, watcher, batch)?;
            }
        }
    }
}
