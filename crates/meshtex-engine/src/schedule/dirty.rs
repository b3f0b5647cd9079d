use bitflags::bitflags;

bitflags! {
    /// Set of stale stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u8 {
        const GEOMETRY = 1 << 0;
        const SHADER = 1 << 1;
        /// Render target, framebuffer and pipeline.
        const PIPELINE = 1 << 2;
        const BINDING = 1 << 3;
        /// Transform uniform contents only.
        const TRANSFORM = 1 << 4;
        /// Nothing to rebuild, but draw again.
        const REDRAW = 1 << 5;
        /// Pipeline only (cull mode); the render target is kept.
        const RASTER = 1 << 6;
    }
}

/// Dirty flags plus the coalescing bit.
///
/// Protocol per resolve window:
/// 1. setters call [`mark`](Self::mark); schedule a resolve only when it returns true
/// 2. the resolve calls [`begin_pass`](Self::begin_pass) and rebuilds what it got
/// 3. the resolve calls [`finish_pass`](Self::finish_pass); schedule again if it returns true
///
/// Marks made between 2 and 3 are kept for the next window.
#[derive(Debug, Default)]
pub struct DirtyState {
    flags: DirtyFlags,
    pending: bool,
    in_pass: bool,
}

impl DirtyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `flags`. Returns true if a resolve must now be scheduled.
    pub fn mark(&mut self, flags: DirtyFlags) -> bool {
        self.flags |= flags;
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Takes the accumulated flags for this pass.
    ///
    /// A shader change implies pipeline and binding rebuilds.
    pub fn begin_pass(&mut self) -> DirtyFlags {
        debug_assert!(!self.in_pass, "resolve passes must not nest");
        self.in_pass = true;
        let mut flags = std::mem::take(&mut self.flags);
        if flags.contains(DirtyFlags::SHADER) {
            flags |= DirtyFlags::PIPELINE | DirtyFlags::BINDING;
        }
        flags
    }

    /// Ends the pass. Returns true if marks arrived meanwhile and one more
    /// resolve has to be scheduled for them.
    pub fn finish_pass(&mut self) -> bool {
        self.in_pass = false;
        self.pending = !self.flags.is_empty();
        self.pending
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Drops everything, e.g. on teardown. Leaves `pending` set so nothing
    /// gets scheduled again.
    pub fn close(&mut self) {
        self.flags = DirtyFlags::empty();
        self.pending = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_mark_schedules() {
        let mut d = DirtyState::new();
        assert!(d.mark(DirtyFlags::PIPELINE));
        assert!(!d.mark(DirtyFlags::GEOMETRY));
        assert!(!d.mark(DirtyFlags::BINDING));

        let flags = d.begin_pass();
        assert!(flags.contains(DirtyFlags::PIPELINE | DirtyFlags::GEOMETRY | DirtyFlags::BINDING));
        assert!(!d.finish_pass());
        assert!(!d.is_pending());
    }

    #[test]
    fn shader_implies_pipeline_and_binding() {
        let mut d = DirtyState::new();
        d.mark(DirtyFlags::SHADER);
        let flags = d.begin_pass();
        assert!(flags.contains(DirtyFlags::PIPELINE));
        assert!(flags.contains(DirtyFlags::BINDING));
        assert!(!flags.contains(DirtyFlags::GEOMETRY));
    }

    #[test]
    fn marks_during_pass_go_to_next_window() {
        let mut d = DirtyState::new();
        d.mark(DirtyFlags::GEOMETRY);
        let first = d.begin_pass();
        assert_eq!(first, DirtyFlags::GEOMETRY);

        // Re-entrant write while resolving: must not schedule recursively.
        assert!(!d.mark(DirtyFlags::BINDING));
        assert!(d.finish_pass());
        assert!(d.is_pending());

        assert_eq!(d.begin_pass(), DirtyFlags::BINDING);
        assert!(!d.finish_pass());
    }

    #[test]
    fn closed_state_never_schedules() {
        let mut d = DirtyState::new();
        d.close();
        assert!(!d.mark(DirtyFlags::SHADER));
    }

    #[test]
    fn close_discards_accumulated_flags() {
        let mut d = DirtyState::new();
        d.mark(DirtyFlags::GEOMETRY | DirtyFlags::REDRAW);
        d.close();
        assert!(d.is_pending());
        assert!(d.begin_pass().is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must not nest")]
    fn nested_pass_is_caught() {
        let mut d = DirtyState::new();
        d.mark(DirtyFlags::GEOMETRY);
        d.begin_pass();
        d.begin_pass();
    }
}
