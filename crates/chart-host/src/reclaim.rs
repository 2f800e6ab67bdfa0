// File: crates/chart-host/src/reclaim.rs
// Summary: Resource reclamation for a container: timers, GPU drawing contexts, child content.

use tracing::debug;

use crate::surface::Container;
use crate::timers::TimerBook;

/// What a reclaim pass released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub timers_cancelled: usize,
    pub contexts_lost: usize,
}

/// Cancel every timer owned by `container`, force-lose its GPU contexts and
/// empty it. Safe to repeat; a second pass releases nothing.
pub fn reclaim(container: &dyn Container, timers: &TimerBook) -> ReclaimReport {
    let timers_cancelled = timers.cancel_all(container.id());
    let contexts_lost = release_surface(container);
    let report = ReclaimReport { timers_cancelled, contexts_lost };
    if report != ReclaimReport::default() {
        debug!(container = container.id().0, ?report, "reclaimed container");
    }
    report
}

/// GPU contexts and child content only; timers are left alone.
/// Browsers cap live GPU contexts per page, so every discarded canvas must give
/// its context back before the element goes away.
pub fn release_surface(container: &dyn Container) -> usize {
    let mut lost = 0;
    for canvas in container.canvases() {
        if canvas.has_gpu_context() {
            canvas.lose_context();
            lost += 1;
        }
    }
    container.clear_children();
    lost
}
