use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Extent, TextureHandle};

/// Emitted after every resolve pass, including passes that drew nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Changed {
    /// All draw prerequisites were live after the pass.
    pub ready: bool,
    /// Current output texture, if a target exists.
    pub texture: Option<TextureHandle>,
    pub size: Extent,
    /// Increments once per pass.
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(super) type Callback = Rc<RefCell<dyn FnMut(&Changed)>>;

#[derive(Default)]
pub(super) struct Listeners {
    next: u64,
    entries: Vec<(ListenerId, Callback)>,
}

impl Listeners {
    pub(super) fn add(&mut self, f: impl FnMut(&Changed) + 'static) -> ListenerId {
        self.next += 1;
        let id = ListenerId(self.next);
        self.entries.push((id, Rc::new(RefCell::new(f))));
        id
    }

    pub(super) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != before
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Callbacks to invoke once the owner's borrow is released.
    pub(super) fn snapshot(&self) -> Vec<Callback> {
        self.entries.iter().map(|(_, cb)| cb.clone()).collect()
    }
}

pub(super) fn notify(callbacks: &[Callback], changed: &Changed) {
    for cb in callbacks {
        // A callback that re-enters itself is skipped rather than panicking.
        if let Ok(mut f) = cb.try_borrow_mut() {
            f(changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn changed(revision: u64) -> Changed {
        Changed { ready: false, texture: None, size: Extent::default(), revision }
    }

    #[test]
    fn removed_listener_is_not_called() {
        let hits = Rc::new(Cell::new(0));
        let mut l = Listeners::default();
        let h = hits.clone();
        let id = l.add(move |_| h.set(h.get() + 1));

        notify(&l.snapshot(), &changed(1));
        assert!(l.remove(id));
        assert!(!l.remove(id));
        notify(&l.snapshot(), &changed(2));

        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn ids_are_unique() {
        let mut l = Listeners::default();
        let a = l.add(|_| {});
        let b = l.add(|_| {});
        assert_ne!(a, b);
    }
}
