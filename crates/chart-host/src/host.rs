// File: crates/chart-host/src/host.rs
// Summary: Host context: owns the registry and timer book, and is the disposal boundary for a page.
// Notes:
// - All chart work runs on the current thread's `tokio::task::LocalSet`; the
//   host and its charts are `!Send` by construction.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::chart::{ChartInstance, ChartSpec};
use crate::config::HostOptions;
use crate::engine::RenderEngine;
use crate::identity::{parse_composite_id, IdInfo, IdentityTuple};
use crate::protocol::Transport;
use crate::registry::{dispose_evicted, ChartSet, Registry, Widget};
use crate::surface::Container;
use crate::timers::TimerBook;

pub struct ChartHost {
    options: HostOptions,
    engine: Rc<dyn RenderEngine>,
    transport: Rc<dyn Transport>,
    registry: RefCell<Registry<ChartInstance>>,
    timers: TimerBook,
}

impl ChartHost {
    pub fn new(options: HostOptions, engine: Rc<dyn RenderEngine>, transport: Rc<dyn Transport>) -> Rc<Self> {
        Rc::new(Self {
            options,
            engine,
            transport,
            registry: RefCell::new(Registry::new()),
            timers: TimerBook::new(),
        })
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn engine(&self) -> &Rc<dyn RenderEngine> {
        &self.engine
    }

    pub fn transport(&self) -> &Rc<dyn Transport> {
        &self.transport
    }

    pub fn timers(&self) -> &TimerBook {
        &self.timers
    }

    /// Build, register and render a chart in `container`.
    pub fn create_chart(self: &Rc<Self>, container: Rc<dyn Container>, spec: ChartSpec) -> Rc<ChartInstance> {
        let chart = ChartInstance::new(self, container, spec);
        chart.init();
        chart
    }

    /// Register `chart` under its own id; displaced members are disposed.
    pub fn store(&self, chart: Rc<ChartInstance>) {
        let chart_id = chart.chart_id().to_string();
        let evicted = self.registry.borrow_mut().store(chart, &chart_id);
        if !evicted.is_empty() {
            debug!(chart = %chart_id, count = evicted.members.len(), "rebinding chart set; disposing previous members");
        }
        dispose_evicted(evicted);
    }

    pub fn store_widget(&self, widget: Rc<dyn Widget>, chart_id: &str) {
        let evicted = self.registry.borrow_mut().store_widget(widget, chart_id);
        dispose_evicted(evicted);
    }

    pub fn lookup(&self, logical_id: &str, identity: Option<&IdentityTuple>) -> Option<ChartSet<ChartInstance>> {
        self.registry.borrow().lookup(logical_id, identity)
    }

    pub fn lookup_exact(&self, logical_id: &str) -> Option<ChartSet<ChartInstance>> {
        self.registry.borrow().get(logical_id).cloned()
    }

    /// Chart addressed by `chart_id`: its explicit slot, else the displayed member.
    pub fn resolve(&self, chart_id: &str, identity: Option<&IdentityTuple>) -> Option<Rc<ChartInstance>> {
        let set = self.lookup(chart_id, identity)?;
        match parse_composite_id(chart_id).slot {
            Some(slot) => set.get(slot).cloned(),
            None => set.displayed().cloned(),
        }
    }

    pub(crate) fn unregister(&self, chart: &Rc<ChartInstance>) {
        let widget = self.registry.borrow_mut().remove_member(chart);
        if let Some(widget) = widget {
            widget.dispose();
        }
    }

    /// Dispose and drop every chart whose identity satisfies `predicate`.
    pub fn evict_all<P>(&self, predicate: P) -> usize
    where
        P: FnMut(&IdInfo) -> bool,
    {
        let evicted = self.registry.borrow_mut().evict_where(predicate);
        let count = evicted.members.len();
        dispose_evicted(evicted);
        count
    }

    pub fn evict_sheet(&self, sheet_index: u32) -> usize {
        self.evict_all(|info| info.sheet_index == Some(sheet_index))
    }

    pub fn evict_block(&self, ec_name: &str) -> usize {
        self.evict_all(|info| info.ec_name.as_deref() == Some(ec_name))
    }

    /// Number of registered chart instances across all sets.
    pub fn chart_count(&self) -> usize {
        self.registry.borrow().member_count()
    }

    pub fn set_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Page-unload teardown: dispose every chart and widget, sweep every timer
    /// and purge the engine's own instance cache. Safe to call repeatedly.
    pub fn dispose(&self) -> usize {
        let evicted = self.registry.borrow_mut().drain();
        let count = evicted.members.len();
        dispose_evicted(evicted);
        let swept = self.timers.sweep();
        self.engine.purge_cache();
        if count > 0 || swept > 0 {
            info!(charts = count, timers = swept, "chart host disposed");
        }
        count
    }
}
