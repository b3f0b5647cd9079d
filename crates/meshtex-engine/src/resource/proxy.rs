use std::cell::Cell;
use std::rc::Rc;

use crate::backend::{Extent, TextureHandle};

/// Shared, late-bound reference to a mesh texture's output.
///
/// The owner republishes into the proxy every time the render target is
/// rebuilt, so clones always resolve to the live texture (or to nothing while
/// the output is unbuilt).
#[derive(Debug, Clone, Default)]
pub struct TextureProxy {
    inner: Rc<Cell<Option<(TextureHandle, Extent)>>>,
}

impl TextureProxy {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> Option<TextureHandle> {
        self.inner.get().map(|(h, _)| h)
    }

    /// Size of the published texture, or zero when unbuilt.
    #[inline]
    pub fn size(&self) -> Extent {
        self.inner.get().map(|(_, e)| e).unwrap_or_default()
    }

    /// True if both proxies share the same cell.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn publish(&self, texture: TextureHandle, size: Extent) {
        self.inner.set(Some((texture, size)));
    }

    pub(crate) fn unpublish(&self) {
        self.inner.set(None);
    }
}

/// Source texture input: a fixed handle or another output's proxy.
#[derive(Debug, Clone)]
pub enum TextureRef {
    Handle(TextureHandle),
    Proxy(TextureProxy),
}

impl TextureRef {
    /// Handle the reference points at right now.
    #[inline]
    pub fn resolve(&self) -> Option<TextureHandle> {
        match self {
            Self::Handle(h) => Some(*h),
            Self::Proxy(p) => p.get(),
        }
    }
}

impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Handle(a), Self::Handle(b)) => a == b,
            (Self::Proxy(a), Self::Proxy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<TextureHandle> for TextureRef {
    fn from(handle: TextureHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<TextureProxy> for TextureRef {
    fn from(proxy: TextureProxy) -> Self {
        Self::Proxy(proxy)
    }
}

impl From<&TextureProxy> for TextureRef {
    fn from(proxy: &TextureProxy) -> Self {
        Self::Proxy(proxy.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_see_republished_texture() {
        let proxy = TextureProxy::new();
        let view = proxy.clone();
        assert_eq!(view.get(), None);
        assert_eq!(view.size(), Extent::default());

        proxy.publish(TextureHandle(4), Extent::new(8, 8));
        assert_eq!(view.get(), Some(TextureHandle(4)));

        proxy.publish(TextureHandle(9), Extent::new(16, 8));
        assert_eq!(view.get(), Some(TextureHandle(9)));
        assert_eq!(view.size(), Extent::new(16, 8));

        proxy.unpublish();
        assert_eq!(view.get(), None);
    }

    #[test]
    fn texture_ref_resolves_through_proxy() {
        let proxy = TextureProxy::new();
        let r = TextureRef::from(&proxy);
        assert_eq!(r.resolve(), None);
        proxy.publish(TextureHandle(2), Extent::new(1, 1));
        assert_eq!(r.resolve(), Some(TextureHandle(2)));
        assert_eq!(TextureRef::from(TextureHandle(5)).resolve(), Some(TextureHandle(5)));
    }

    #[test]
    fn texture_ref_equality() {
        let a = TextureProxy::new();
        let b = TextureProxy::new();
        assert_eq!(TextureRef::from(&a), TextureRef::from(&a));
        assert_ne!(TextureRef::from(&a), TextureRef::from(&b));
        assert_ne!(TextureRef::from(&a), TextureRef::from(TextureHandle(1)));
    }
}
