//! Target rectangle lifecycle

use common::Rect;

/// Tracks the committed target rectangle and how many times the shared
/// surface has been (re)allocated, so redundant recreation is observable.
#[derive(Debug, Clone, Copy)]
pub struct TargetTracker {
    current: Rect,
    allocations: u64,
}

impl TargetTracker {
    /// The initial pipeline build counts as the first allocation.
    pub fn new(initial: Rect) -> Self {
        Self {
            current: initial,
            allocations: 1,
        }
    }

    pub fn current(&self) -> Rect {
        self.current
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Whether `next` requires tearing down and rebuilding the surface.
    pub fn requires_recreate(&self, next: &Rect) -> bool {
        *next != self.current
    }

    /// Record a completed recreation for `next`.
    pub fn commit(&mut self, next: Rect) {
        self.current = next;
        self.allocations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rect_needs_no_recreate() {
        let tracker = TargetTracker::new(Rect::new(0, 0, 1920, 1080));
        assert!(!tracker.requires_recreate(&Rect::new(0, 0, 1920, 1080)));
        assert_eq!(tracker.allocations(), 1);
    }

    #[test]
    fn changed_rect_allocates_once_per_commit() {
        let mut tracker = TargetTracker::new(Rect::new(0, 0, 1920, 1080));
        let next = Rect::new(100, 100, 300, 200);

        assert!(tracker.requires_recreate(&next));
        tracker.commit(next);
        assert_eq!(tracker.allocations(), 2);
        assert_eq!(tracker.current(), next);

        // Committing the same rect again would be a caller bug, but the
        // guard itself must report it as redundant.
        assert!(!tracker.requires_recreate(&next));
        assert_eq!(tracker.allocations(), 2);
    }

    #[test]
    fn moved_rect_with_same_extent_still_recreates() {
        let tracker = TargetTracker::new(Rect::new(0, 0, 640, 480));
        assert!(tracker.requires_recreate(&Rect::new(10, 0, 640, 480)));
    }
}
