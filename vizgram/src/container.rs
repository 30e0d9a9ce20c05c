// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolution of the user-supplied render target.

use kurbo::Size;
use vizgram_core::ConfigurationError;
use vizgram_render::{Document, MountPoint};

/// Where a chart paints.
#[derive(Clone, Debug, Default)]
pub enum Container {
    /// A fresh mount point owned by the chart and attached to no document.
    #[default]
    Detached,
    /// An existing mount point, used as-is.
    Mount(MountPoint),
    /// The identifier of a mount point registered in the chart's document.
    Id(String),
}

impl From<MountPoint> for Container {
    fn from(mount: MountPoint) -> Self {
        Self::Mount(mount)
    }
}

impl From<&str> for Container {
    fn from(id: &str) -> Self {
        Self::Id(id.to_owned())
    }
}

impl From<String> for Container {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

/// The outcome of resolving a [`Container`], cached for the chart's lifetime.
#[derive(Debug)]
pub(crate) struct ResolvedContainer {
    pub(crate) mount: Result<MountPoint, ConfigurationError>,
    pub(crate) owned: bool,
}

/// Maps a target to a mount point. Unknown identifiers are kept as errors so that every later
/// render rejects with them.
pub(crate) fn resolve(target: Container, document: &Document, size: Size) -> ResolvedContainer {
    match target {
        Container::Detached => ResolvedContainer {
            mount: Ok(MountPoint::detached(size)),
            owned: true,
        },
        Container::Mount(mount) => ResolvedContainer {
            mount: Ok(mount),
            owned: false,
        },
        Container::Id(id) => {
            let mount = document.get_element_by_id(&id).ok_or_else(|| {
                log::warn!("container {id:?} is not in the document");
                ConfigurationError::UnknownContainer(id)
            });
            ResolvedContainer {
                mount,
                owned: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use vizgram_render::DEFAULT_MOUNT_SIZE;

    use super::*;

    #[test]
    fn absent_targets_get_an_owned_detached_mount() {
        let resolved = resolve(Container::Detached, &Document::new(), Size::new(5.0, 6.0));
        assert!(resolved.owned);
        let mount = resolved.mount.unwrap();
        assert!(!mount.is_in_document());
        assert_eq!(mount.box_size(), Size::new(5.0, 6.0));
    }

    #[test]
    fn handles_are_used_as_is() {
        let mount = MountPoint::detached(DEFAULT_MOUNT_SIZE);
        let resolved = resolve(mount.clone().into(), &Document::new(), DEFAULT_MOUNT_SIZE);
        assert!(!resolved.owned);
        assert!(resolved.mount.unwrap().ptr_eq(&mount));
    }

    #[test]
    fn identifiers_are_looked_up_in_the_document() {
        let document = Document::new();
        let mount = document.create_element("plot", DEFAULT_MOUNT_SIZE);
        let found = resolve("plot".into(), &document, DEFAULT_MOUNT_SIZE);
        assert!(found.mount.unwrap().ptr_eq(&mount));

        let missing = resolve("nope".into(), &document, DEFAULT_MOUNT_SIZE);
        assert_eq!(
            missing.mount.unwrap_err(),
            ConfigurationError::UnknownContainer("nope".into())
        );
    }
}
