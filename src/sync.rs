//! Bidirectional canvas synchronization.
//!
//! A [`TransformSync`] attaches one [`TransformLink`] to each of two canvases.
//! When either side changes, its link recomputes the other side from scratch
//! through a [`GridTransform`] and fires the matching notification there.
//! That notification would immediately trigger the opposite link and loop;
//! both links therefore share one [`SyncGuard`], and a link that finds a
//! propagation already in flight does nothing.

use std::cell::Cell;
use std::rc::Rc;

use crate::canvas::{CanvasHandle, CanvasListener, ListenerId, Rect, WeakCanvas};
use crate::error::EngineResult;
use crate::ops::dct::{Dct2, GridTransform, InverseDct2};

// ============================================================================
// GUARD
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    Propagating,
}

/// Propagation state shared by the links of one canvas pair.
#[derive(Clone, Debug, Default)]
pub struct SyncGuard(Rc<Cell<SyncState>>);

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.0.get()
    }

    pub fn is_propagating(&self) -> bool {
        self.state() == SyncState::Propagating
    }

    /// Check-and-set in one step.  `None` while another propagation holds
    /// the guard.  The guard returns to `Idle` when the token drops, on
    /// every exit path.
    pub fn try_enter(&self) -> Option<PropagationToken> {
        if self.is_propagating() {
            return None;
        }
        self.0.set(SyncState::Propagating);
        Some(PropagationToken { guard: self.clone() })
    }
}

/// Held for the duration of one propagation step.
#[derive(Debug)]
pub struct PropagationToken {
    guard: SyncGuard,
}

impl Drop for PropagationToken {
    fn drop(&mut self) {
        self.guard.0.set(SyncState::Idle);
    }
}

// ============================================================================
// LINK: one direction
// ============================================================================

/// Listener on `source` that keeps `target ≈ transform(source)`.
///
/// Holds only weak references to both canvases.
pub struct TransformLink {
    source: WeakCanvas,
    target: WeakCanvas,
    transform: Rc<dyn GridTransform>,
    guard: SyncGuard,
}

impl TransformLink {
    pub fn new(source: &CanvasHandle, target: &CanvasHandle, transform: Rc<dyn GridTransform>, guard: SyncGuard) -> Self {
        Self {
            source: source.downgrade(),
            target: target.downgrade(),
            transform,
            guard,
        }
    }

    fn is_source(&self, canvas: &CanvasHandle) -> bool {
        self.source.upgrade().is_some_and(|s| s.ptr_eq(canvas))
    }

    /// Recompute `target` from the whole of `source`.  With `resize`, the
    /// target first takes the source's dimensions.  Nothing is written
    /// unless the transform succeeds.
    fn transfer(&self, source: &CanvasHandle, target: &CanvasHandle, resize: bool) -> EngineResult<()> {
        let (output, width, height, from) = {
            let src = source.borrow();
            let (width, height) = src.dimensions();
            let output = self.transform.transform(src.samples(), width, height)?;
            (output, width, height, src.name().to_owned())
        };

        let mut tgt = target.borrow_mut();
        if resize {
            tgt.resize(width, height)?;
        }
        tgt.replace_whole(output)?;
        log::debug!("{} {}x{} \"{}\" -> \"{}\"", self.transform.name(), width, height, from, tgt.name());
        Ok(())
    }

    /// Shared body of both callbacks: guard, transfer, notify the target.
    fn propagate(&self, source: &CanvasHandle, loaded: bool) {
        if !self.is_source(source) {
            return;
        }
        let Some(_token) = self.guard.try_enter() else {
            log::trace!("{} link skipped: propagation in flight", self.transform.name());
            return;
        };
        let Some(target) = self.target.upgrade() else {
            return;
        };

        match self.transfer(source, &target, loaded) {
            Ok(()) if loaded => target.notify_loaded(),
            Ok(()) => target.notify_modified(None),
            Err(e) => log::warn!("{} propagation aborted: {}", self.transform.name(), e),
        }
    }
}

impl CanvasListener for TransformLink {
    fn on_modified(&self, source: &CanvasHandle, _region: Option<Rect>) {
        // The transform is global; any local edit recomputes everything.
        self.propagate(source, false);
    }

    fn on_loaded(&self, source: &CanvasHandle) {
        self.propagate(source, true);
    }
}

// ============================================================================
// PAIR
// ============================================================================

/// Two [`TransformLink`]s, `a → forward → b` and `b → inverse → a`, sharing
/// one guard.  Dropping this value leaves the links attached; call
/// [`TransformSync::unlink`] to detach them.
pub struct TransformSync {
    a: WeakCanvas,
    b: WeakCanvas,
    guard: SyncGuard,
    forward_id: ListenerId,
    inverse_id: ListenerId,
}

impl TransformSync {
    pub fn link(
        a: &CanvasHandle,
        b: &CanvasHandle,
        forward: Rc<dyn GridTransform>,
        inverse: Rc<dyn GridTransform>,
    ) -> Self {
        let guard = SyncGuard::new();
        let forward_id = a.attach(Rc::new(TransformLink::new(a, b, forward, guard.clone())));
        let inverse_id = b.attach(Rc::new(TransformLink::new(b, a, inverse, guard.clone())));
        Self {
            a: a.downgrade(),
            b: b.downgrade(),
            guard,
            forward_id,
            inverse_id,
        }
    }

    /// `a` spatial, `b` its DCT.
    pub fn dct(a: &CanvasHandle, b: &CanvasHandle) -> Self {
        Self::link(a, b, Rc::new(Dct2), Rc::new(InverseDct2))
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    pub fn is_propagating(&self) -> bool {
        self.guard.is_propagating()
    }

    pub fn unlink(self) {
        if let Some(a) = self.a.upgrade() {
            a.detach(self.forward_id);
        }
        if let Some(b) = self.b.upgrade() {
            b.detach(self.inverse_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::error::EngineError;
    use crate::ops::dct::Identity;

    struct Failing;

    impl GridTransform for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn transform(&self, input: &[f32], _w: usize, _h: usize) -> EngineResult<Vec<f32>> {
            Err(EngineError::Shape { expected: 0, actual: input.len() })
        }
    }

    fn pair(w: usize, h: usize) -> (CanvasHandle, CanvasHandle) {
        (
            CanvasHandle::new(Canvas::with_size("a", w, h).unwrap()),
            CanvasHandle::new(Canvas::with_size("b", w, h).unwrap()),
        )
    }

    #[test]
    fn token_releases_guard_on_drop() {
        let guard = SyncGuard::new();
        let token = guard.try_enter().unwrap();
        assert!(guard.is_propagating());
        assert!(guard.try_enter().is_none());
        drop(token);
        assert_eq!(guard.state(), SyncState::Idle);
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn modified_source_rewrites_target() {
        let (a, b) = pair(4, 4);
        let sync = TransformSync::link(&a, &b, Rc::new(Identity), Rc::new(Identity));
        a.borrow_mut().set(1, 2, 3.0);
        a.notify_modified(Some(Rect::new(1, 2, 1, 1)));
        assert_eq!(b.borrow().get(1, 2), 3.0);
        assert!(!sync.is_propagating());
    }

    #[test]
    fn failing_transform_still_releases_guard() {
        let (a, b) = pair(2, 2);
        let sync = TransformSync::link(&a, &b, Rc::new(Failing), Rc::new(Failing));
        b.borrow_mut().set(0, 0, 9.0);
        a.borrow_mut().set(0, 0, 1.0);
        a.notify_modified(None);
        assert!(!sync.is_propagating());
        assert_eq!(b.borrow().get(0, 0), 9.0);

        // A later, healthy edit in the other direction is not locked out.
        sync.unlink();
        let _sync = TransformSync::link(&a, &b, Rc::new(Identity), Rc::new(Identity));
        b.notify_modified(None);
        assert_eq!(a.borrow().get(0, 0), 9.0);
    }

    #[test]
    fn unlink_detaches_both_directions() {
        let (a, b) = pair(2, 2);
        let sync = TransformSync::dct(&a, &b);
        assert_eq!(a.listener_count(), 1);
        assert_eq!(b.listener_count(), 1);
        sync.unlink();
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 0);
    }

    #[test]
    fn dropped_target_is_ignored() {
        let (a, b) = pair(2, 2);
        let _sync = TransformSync::dct(&a, &b);
        drop(b);
        a.notify_modified(None);
    }

    #[test]
    fn independent_pairs_do_not_share_state() {
        let (a, b) = pair(2, 2);
        let (c, d) = pair(2, 2);
        let first = TransformSync::link(&a, &b, Rc::new(Identity), Rc::new(Identity));
        let _second = TransformSync::link(&c, &d, Rc::new(Identity), Rc::new(Identity));

        let _held = first.guard().try_enter().unwrap();
        c.borrow_mut().set(1, 1, 4.0);
        c.notify_modified(None);
        assert_eq!(d.borrow().get(1, 1), 4.0);

        // The held pair is blocked.
        a.borrow_mut().set(1, 1, 4.0);
        a.notify_modified(None);
        assert_eq!(b.borrow().get(1, 1), 0.0);
    }
}
