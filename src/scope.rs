//! Scoped changes to state shared with the user session.
//!
//! Each guard captures the current value on entry and writes it back when dropped, so an
//! early return or `?` can never leak a changed selection into the user's session. Guards
//! deref to the host and nest.

use crate::host::{Selection, SkeletonHost, SkeletonId};
use std::ops::{Deref, DerefMut};

/// Restores the host selection on drop.
pub struct SelectionScope<'a, H: SkeletonHost + ?Sized> {
    host: &'a mut H,
    saved: Option<Selection>,
}

impl<'a, H: SkeletonHost + ?Sized> SelectionScope<'a, H> {
    pub fn enter(host: &'a mut H) -> Self {
        let saved = host.selection();
        Self { host, saved: Some(saved) }
    }
}

impl<H: SkeletonHost + ?Sized> Deref for SelectionScope<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &*self.host
    }
}

impl<H: SkeletonHost + ?Sized> DerefMut for SelectionScope<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut *self.host
    }
}

impl<H: SkeletonHost + ?Sized> Drop for SelectionScope<'_, H> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.host.set_selection(saved);
        }
    }
}

/// Makes a skeleton's root container selectable until dropped.
pub struct SelectableScope<'a, H: SkeletonHost + ?Sized> {
    host: &'a mut H,
    skeleton: SkeletonId,
    previous: bool,
}

impl<'a, H: SkeletonHost + ?Sized> SelectableScope<'a, H> {
    pub fn enter(host: &'a mut H, skeleton: SkeletonId) -> Self {
        let previous = host.root_selectable(skeleton);
        if !previous {
            host.set_root_selectable(skeleton, true);
        }
        Self { host, skeleton, previous }
    }
}

impl<H: SkeletonHost + ?Sized> Deref for SelectableScope<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &*self.host
    }
}

impl<H: SkeletonHost + ?Sized> DerefMut for SelectableScope<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut *self.host
    }
}

impl<H: SkeletonHost + ?Sized> Drop for SelectableScope<'_, H> {
    fn drop(&mut self) {
        if !self.previous {
            self.host.set_root_selectable(self.skeleton, false);
        }
    }
}
