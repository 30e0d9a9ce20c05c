// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render request coalescing.
//!
//! At most one pass runs at a time. Requests arriving while a pass runs collapse into a single
//! trailing batch that starts as soon as the running pass settles, whatever its outcome.
//!
//! ```text
//! Idle ──admit──▶ Rendering ──admit──▶ RenderingWithTrailing ──admit──▶ (merged)
//!   ▲                 │                          │
//!   └────complete─────┘                          └──complete──▶ Rendering (trailing batch)
//! ```
//!
//! The scheduler is a plain state machine; the chart owns it behind a mutex and drives passes.

use std::time::Instant;

use tokio::sync::oneshot;

/// Observable scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No pass is running.
    Idle,
    /// A pass is running and nothing is queued behind it.
    Rendering,
    /// A pass is running and a trailing batch is queued behind it.
    RenderingWithTrailing,
}

/// One render request, settled exactly once.
#[derive(Debug)]
pub(crate) struct Ticket<T> {
    ordinal: u64,
    issued_at: Instant,
    tx: oneshot::Sender<T>,
}

impl<T> Ticket<T> {
    /// Delivers the outcome. A caller that dropped its future simply never sees it.
    pub(crate) fn settle(self, outcome: T) {
        log::trace!(
            "settling render ticket #{} after {:?}",
            self.ordinal,
            self.issued_at.elapsed()
        );
        let _ = self.tx.send(outcome);
    }
}

/// What [`Scheduler::admit`] decided for a request.
#[derive(Debug)]
pub(crate) enum Admission<T> {
    /// Start a pass now for this batch.
    Start(Vec<Ticket<T>>),
    /// The request opened the trailing batch.
    Queued,
    /// The request joined the existing trailing batch.
    Merged,
}

#[derive(Debug)]
enum Slot<T> {
    Idle,
    Rendering,
    RenderingWithTrailing(Vec<Ticket<T>>),
}

#[derive(Debug)]
pub(crate) struct Scheduler<T> {
    slot: Slot<T>,
    next_ordinal: u64,
    passes: u64,
}

impl<T> Scheduler<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Slot::Idle,
            next_ordinal: 0,
            passes: 0,
        }
    }

    pub(crate) fn state(&self) -> SchedulerState {
        match self.slot {
            Slot::Idle => SchedulerState::Idle,
            Slot::Rendering => SchedulerState::Rendering,
            Slot::RenderingWithTrailing(_) => SchedulerState::RenderingWithTrailing,
        }
    }

    /// Number of passes started so far.
    pub(crate) fn passes(&self) -> u64 {
        self.passes
    }

    /// Issues a ticket for a new request.
    pub(crate) fn ticket(&mut self, tx: oneshot::Sender<T>) -> Ticket<T> {
        self.next_ordinal += 1;
        Ticket {
            ordinal: self.next_ordinal,
            issued_at: Instant::now(),
            tx,
        }
    }

    /// Routes a request: start it, queue it as the trailing batch, or merge it into that batch.
    pub(crate) fn admit(&mut self, ticket: Ticket<T>) -> Admission<T> {
        let ordinal = ticket.ordinal;
        match &mut self.slot {
            Slot::Idle => {
                self.slot = Slot::Rendering;
                self.passes += 1;
                log::debug!("render #{ordinal}: idle -> rendering (pass {})", self.passes);
                Admission::Start(vec![ticket])
            }
            Slot::Rendering => {
                self.slot = Slot::RenderingWithTrailing(vec![ticket]);
                log::debug!("render #{ordinal}: rendering -> rendering with trailing");
                Admission::Queued
            }
            Slot::RenderingWithTrailing(batch) => {
                batch.push(ticket);
                log::debug!(
                    "render #{ordinal}: merged into trailing batch of {}",
                    batch.len()
                );
                Admission::Merged
            }
        }
    }

    /// Marks the running pass as settled. Returns the trailing batch if one must start next.
    pub(crate) fn complete(&mut self) -> Option<Vec<Ticket<T>>> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::RenderingWithTrailing(batch) => {
                self.slot = Slot::Rendering;
                self.passes += 1;
                log::debug!(
                    "starting trailing pass {} for {} request(s)",
                    self.passes,
                    batch.len()
                );
                Some(batch)
            }
            Slot::Rendering | Slot::Idle => {
                log::debug!("rendering -> idle");
                None
            }
        }
    }

    /// Returns to idle, handing back any queued tickets.
    pub(crate) fn reset(&mut self) -> Vec<Ticket<T>> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::RenderingWithTrailing(batch) => batch,
            Slot::Rendering | Slot::Idle => Vec::new(),
        }
    }
}
