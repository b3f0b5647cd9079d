use crate::backend::{RenderDevice, ResourceId};

use super::ResourceState;

/// Exclusive owner of one device handle.
///
/// Storing a new handle frees the previous one first. Clearing is idempotent,
/// and nothing is freed against a device that reports itself dead.
#[derive(Debug)]
pub struct Slot<H> {
    label: &'static str,
    handle: Option<H>,
}

impl<H> Slot<H>
where
    H: Copy + PartialEq + Into<ResourceId>,
{
    pub const fn new(label: &'static str) -> Self {
        Self { label, handle: None }
    }

    #[inline]
    pub fn get(&self) -> Option<H> {
        self.handle
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.handle.is_some()
    }

    #[inline]
    pub fn state(&self) -> ResourceState {
        if self.handle.is_some() {
            ResourceState::Ready
        } else {
            ResourceState::Unbuilt
        }
    }

    /// Frees the current handle (if any) and stores `handle`.
    pub fn replace<D: RenderDevice + ?Sized>(&mut self, device: &mut D, handle: H) {
        if self.handle == Some(handle) {
            return;
        }
        self.clear(device);
        log::trace!("{}: now {}", self.label, handle.into());
        self.handle = Some(handle);
    }

    /// Stores the outcome of a build: a new handle, or nothing.
    pub fn set<D: RenderDevice + ?Sized>(&mut self, device: &mut D, handle: Option<H>) {
        match handle {
            Some(h) => self.replace(device, h),
            None => self.clear(device),
        }
    }

    /// Frees the current handle and leaves the slot empty.
    pub fn clear<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        let Some(old) = self.handle.take() else {
            return;
        };
        if device.is_alive() {
            log::trace!("{}: freeing {}", self.label, old.into());
            device.free(old.into());
        } else {
            log::trace!("{}: device gone, dropping {}", self.label, old.into());
        }
    }

    /// Empties the slot without touching the device.
    pub fn forget(&mut self) -> Option<H> {
        self.handle.take()
    }
}
