// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mount points, drawing surfaces, and the document that names them.
//!
//! A [`MountPoint`] is the box a chart paints into. It reports its size synchronously, holds
//! at most one attached [`Surface`], and notifies resize observers registered through
//! [`MountPoint::observe`]. Observers live in one process-wide registry keyed by mount point,
//! so a mount point can be observed by several charts and dropped without leaking callbacks
//! (call [`MountPoint::unobserve`] to release them).

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use hashbrown::HashMap;
use kurbo::Size;
use smallvec::SmallVec;

use crate::canvas::CanvasSurface;

/// Size given to mount points created without an explicit one.
pub const DEFAULT_MOUNT_SIZE: Size = Size::new(640.0, 480.0);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drawing output attached to a mount point.
#[derive(Clone, Debug, PartialEq)]
pub enum Surface {
    /// A serialized SVG document.
    Svg(String),
    /// A recorded canvas.
    Canvas(CanvasSurface),
}

impl Surface {
    /// Returns the SVG markup, if this is an SVG surface.
    pub fn as_svg(&self) -> Option<&str> {
        match self {
            Self::Svg(markup) => Some(markup),
            Self::Canvas(_) => None,
        }
    }

    /// Returns the canvas, if this is a canvas surface.
    pub fn as_canvas(&self) -> Option<&CanvasSurface> {
        match self {
            Self::Canvas(canvas) => Some(canvas),
            Self::Svg(_) => None,
        }
    }
}

/// Handle returned by [`MountPoint::observe`], used to stop observing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type ResizeCallback = Arc<dyn Fn(Size) + Send + Sync>;

#[derive(Default)]
struct ObserverRegistry {
    next: u64,
    by_mount: HashMap<u64, SmallVec<[(ObserverId, ResizeCallback); 1]>>,
}

fn observers() -> &'static Mutex<ObserverRegistry> {
    static OBSERVERS: OnceLock<Mutex<ObserverRegistry>> = OnceLock::new();
    OBSERVERS.get_or_init(Mutex::default)
}

static NEXT_MOUNT: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct MountInner {
    uid: u64,
    id: Option<String>,
    size: Mutex<Size>,
    surface: Mutex<Option<Surface>>,
    in_document: AtomicBool,
}

/// A box that can host one drawing surface.
///
/// Cloning yields another reference to the same mount point.
#[derive(Clone)]
pub struct MountPoint {
    inner: Arc<MountInner>,
}

impl fmt::Debug for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountPoint")
            .field("uid", &self.inner.uid)
            .field("id", &self.inner.id)
            .field("size", &self.box_size())
            .field("has_surface", &self.has_surface())
            .finish()
    }
}

impl MountPoint {
    /// Creates an anonymous mount point that is not part of any document.
    pub fn detached(size: Size) -> Self {
        Self::build(None, size)
    }

    /// Creates a mount point carrying an identifier, for registration in a [`Document`].
    pub fn with_id(id: impl Into<String>, size: Size) -> Self {
        Self::build(Some(id.into()), size)
    }

    fn build(id: Option<String>, size: Size) -> Self {
        Self {
            inner: Arc::new(MountInner {
                uid: NEXT_MOUNT.fetch_add(1, Ordering::Relaxed),
                id,
                size: Mutex::new(size),
                surface: Mutex::new(None),
                in_document: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique number of this mount point.
    pub fn uid(&self) -> u64 {
        self.inner.uid
    }

    /// Identifier used for document lookup, if any.
    pub fn id(&self) -> Option<&str> {
        self.inner.id.as_deref()
    }

    /// Returns `true` if both values refer to the same mount point.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` while the mount point is registered in a [`Document`].
    pub fn is_in_document(&self) -> bool {
        self.inner.in_document.load(Ordering::Acquire)
    }

    /// Returns the current box size.
    pub fn box_size(&self) -> Size {
        *lock(&self.inner.size)
    }

    /// Changes the box size and notifies every resize observer, unless the size is unchanged.
    pub fn resize(&self, size: Size) {
        {
            let mut current = lock(&self.inner.size);
            if *current == size {
                return;
            }
            *current = size;
        }
        let callbacks: SmallVec<[ResizeCallback; 2]> = lock(observers())
            .by_mount
            .get(&self.inner.uid)
            .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        log::trace!(
            "mount {} resized to {}x{}, notifying {} observer(s)",
            self.inner.uid,
            size.width,
            size.height,
            callbacks.len()
        );
        for callback in callbacks {
            callback(size);
        }
    }

    /// Registers a callback invoked with the new size after every change.
    pub fn observe(&self, callback: impl Fn(Size) + Send + Sync + 'static) -> ObserverId {
        let mut registry = lock(observers());
        registry.next += 1;
        let id = ObserverId(registry.next);
        registry
            .by_mount
            .entry(self.inner.uid)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback registered with [`MountPoint::observe`]. Returns `false` if it was
    /// already gone.
    pub fn unobserve(&self, observer: ObserverId) -> bool {
        let mut registry = lock(observers());
        let Some(list) = registry.by_mount.get_mut(&self.inner.uid) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != observer);
        let removed = list.len() != before;
        if list.is_empty() {
            registry.by_mount.remove(&self.inner.uid);
        }
        removed
    }

    /// Returns the number of resize observers of this mount point.
    pub fn observer_count(&self) -> usize {
        lock(observers())
            .by_mount
            .get(&self.inner.uid)
            .map_or(0, SmallVec::len)
    }

    /// Attaches a surface, replacing any previous one.
    pub fn attach_surface(&self, surface: Surface) {
        *lock(&self.inner.surface) = Some(surface);
    }

    /// Detaches and returns the current surface.
    pub fn detach_surface(&self) -> Option<Surface> {
        lock(&self.inner.surface).take()
    }

    /// Returns a copy of the current surface.
    pub fn surface(&self) -> Option<Surface> {
        lock(&self.inner.surface).clone()
    }

    /// Returns `true` if a surface is attached.
    pub fn has_surface(&self) -> bool {
        lock(&self.inner.surface).is_some()
    }
}

/// Named mount points, looked up by identifier.
#[derive(Clone, Debug, Default)]
pub struct Document {
    elements: Arc<Mutex<HashMap<String, MountPoint>>>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide document.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Document> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Creates a mount point with `id` and registers it.
    pub fn create_element(&self, id: impl Into<String>, size: Size) -> MountPoint {
        let mount = MountPoint::with_id(id, size);
        self.attach(&mount);
        mount
    }

    /// Registers a mount point under its identifier. Anonymous mount points are ignored.
    ///
    /// Returns `false` if the mount point has no identifier.
    pub fn attach(&self, mount: &MountPoint) -> bool {
        let Some(id) = mount.id() else {
            return false;
        };
        let previous = lock(&self.elements).insert(id.to_owned(), mount.clone());
        if let Some(previous) = previous {
            if !previous.ptr_eq(mount) {
                previous.inner.in_document.store(false, Ordering::Release);
            }
        }
        mount.inner.in_document.store(true, Ordering::Release);
        true
    }

    /// Unregisters the mount point with `id`.
    pub fn detach(&self, id: &str) -> Option<MountPoint> {
        let mount = lock(&self.elements).remove(id)?;
        mount.inner.in_document.store(false, Ordering::Release);
        Some(mount)
    }

    /// Looks up a registered mount point.
    pub fn get_element_by_id(&self, id: &str) -> Option<MountPoint> {
        lock(&self.elements).get(id).cloned()
    }
}
