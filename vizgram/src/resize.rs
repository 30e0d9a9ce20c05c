// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debounced re-fitting on mount point resizes.
//!
//! The watcher subscribes to the mount point's resize notifications at most once. The first
//! notification after a quiet period starts a debounce timer; notifications arriving before it
//! fires are absorbed. When the timer fires, the fit callback runs once with whatever size the
//! mount point has by then.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use vizgram_render::{MountPoint, ObserverId};

#[derive(Debug)]
struct Binding {
    mount: MountPoint,
    observer: ObserverId,
    /// Cleared on unbind; timers already running check it before fitting.
    live: Arc<AtomicBool>,
}

#[derive(Debug)]
pub(crate) struct ResizeWatcher {
    debounce: Duration,
    binding: Mutex<Option<Binding>>,
}

impl ResizeWatcher {
    pub(crate) fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            binding: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.lock().is_some()
    }

    /// Subscribes to `mount`. Does nothing and returns `false` if already bound.
    ///
    /// `fit` runs on `runtime` with a strong reference to `target`, as long as the target is
    /// still alive and this binding is still in place when the debounce elapses.
    pub(crate) fn bind<T, F, Fut>(
        &self,
        mount: &MountPoint,
        runtime: Handle,
        target: Weak<T>,
        fit: F,
    ) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut binding = self.lock();
        if binding.is_some() {
            return false;
        }
        let debounce = self.debounce;
        let pending = Arc::new(AtomicBool::new(false));
        let fit = Arc::new(fit);
        let live = Arc::new(AtomicBool::new(true));
        let bound = live.clone();
        let observer = mount.observe(move |size| {
            if pending.swap(true, Ordering::AcqRel) {
                log::trace!("resize to {}x{} coalesced", size.width, size.height);
                return;
            }
            let pending = pending.clone();
            let target = target.clone();
            let fit = fit.clone();
            let bound = bound.clone();
            runtime.spawn(async move {
                tokio::time::sleep(debounce).await;
                pending.store(false, Ordering::Release);
                if !bound.load(Ordering::Acquire) {
                    log::trace!("resize fit dropped; watcher was unbound");
                    return;
                }
                if let Some(target) = target.upgrade() {
                    fit(target).await;
                }
            });
        });
        log::debug!("bound resize watcher to mount {}", mount.uid());
        *binding = Some(Binding {
            mount: mount.clone(),
            observer,
            live,
        });
        true
    }

    /// Unsubscribes. Returns `false` if nothing was bound.
    pub(crate) fn unbind(&self) -> bool {
        let Some(binding) = self.lock().take() else {
            return false;
        };
        binding.live.store(false, Ordering::Release);
        binding.mount.unobserve(binding.observer);
        log::debug!("unbound resize watcher from mount {}", binding.mount.uid());
        true
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.unbind();
    }
}
