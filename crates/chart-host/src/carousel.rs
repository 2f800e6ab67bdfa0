// File: crates/chart-host/src/carousel.rs
// Summary: Carousel widget owning a chart set whose slots are shown one at a time.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::host::ChartHost;
use crate::identity::parse_composite_id;
use crate::registry::Widget;

pub struct Carousel {
    host: Weak<ChartHost>,
    logical_id: String,
    current: Cell<usize>,
    disposed: Cell<bool>,
}

impl Carousel {
    /// Create the widget and register it, replacing whatever the logical id held.
    pub fn mount(host: &Rc<ChartHost>, chart_id: &str) -> Rc<Self> {
        let carousel = Rc::new(Self {
            host: Rc::downgrade(host),
            logical_id: parse_composite_id(chart_id).logical_id,
            current: Cell::new(0),
            disposed: Cell::new(false),
        });
        host.store_widget(carousel.clone(), chart_id);
        carousel
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Show `slot`. The newly displayed chart is resized to its container so it
    /// lays out against the size it is actually shown at.
    pub fn switch_to(&self, slot: usize) -> bool {
        if self.disposed.get() {
            return false;
        }
        let Some(host) = self.host.upgrade() else { return false };
        let Some(chart) = host.lookup_exact(&self.logical_id).and_then(|set| set.get(slot).cloned()) else {
            debug!(carousel = %self.logical_id, slot, "no chart registered for slot");
            return false;
        };
        self.current.set(slot);
        let (width, height) = chart.container().size();
        chart.resize(width, height);
        true
    }
}

impl Widget for Carousel {
    fn current_slot(&self) -> usize {
        self.current.get()
    }

    fn dispose(&self) {
        self.disposed.set(true);
    }
}
