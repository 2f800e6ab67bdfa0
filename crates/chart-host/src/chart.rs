// File: crates/chart-host/src/chart.rs
// Summary: Chart instance lifecycle (simple and background-aware variants) over the engine contract.
// Notes:
// - The variant is a closed tag chosen at construction; both variants share
//   one lifecycle and differ only in how a payload is rendered.
// - `teardown` releases everything but leaves the instance reusable (resize
//   fallback, non-patchable refresh); `clear` is the terminal form.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::attr::ChartAttr;
use crate::autorefresh;
use crate::engine::{Capabilities, EngineHandle};
use crate::error::{HostError, Result};
use crate::host::ChartHost;
use crate::identity::{IdInfo, IdentityTuple};
use crate::links;
use crate::protocol::{export_url, DataRequest, ExportQuery, RefreshRequest};
use crate::reclaim::{reclaim, release_surface};
use crate::refresh::{request_refresh, OnApplied, RefreshOutcome, RefreshParams, RequestGate};
use crate::registry::RegistryMember;
use crate::surface::Container;
use crate::timers::{TimerBook, TimerKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Simple,
    /// Renders a declared background and a placeholder when the payload has no series.
    BackgroundAware,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChartState {
    Uninitialized,
    /// Engine instance live.
    Rendering,
    /// Placeholder shown, no engine instance.
    EmptyData,
    /// Terminal.
    Cleared,
}

/// Everything the server payload declares about a chart before it is mounted.
#[derive(Clone, Debug)]
pub struct ChartSpec {
    pub chart_id: String,
    pub identity: IdentityTuple,
    pub kind: ChartKind,
    pub options: ChartAttr,
}

impl ChartSpec {
    pub fn new(chart_id: impl Into<String>, options: ChartAttr) -> Self {
        Self { chart_id: chart_id.into(), identity: IdentityTuple::default(), kind: ChartKind::Simple, options }
    }

    pub fn with_identity(mut self, identity: IdentityTuple) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }
}

/// One outstanding claim on the loading indicator.
#[must_use]
pub(crate) struct LoadingShare {
    epoch: u64,
}

pub struct ChartInstance {
    host: Weak<ChartHost>,
    container: Rc<dyn Container>,
    kind: ChartKind,
    id_info: IdInfo,
    show_loading: bool,
    options: RefCell<ChartAttr>,
    engine: RefCell<Option<Box<dyn EngineHandle>>>,
    state: Cell<ChartState>,
    size: Cell<(u32, u32)>,
    gate: RequestGate,
    last_payload: RefCell<Option<RefreshRequest>>,
    loading: Cell<u32>,
    loading_epoch: Cell<u64>,
}

impl ChartInstance {
    /// Build an unmounted instance; call [`ChartInstance::init`] to register and render it.
    pub fn new(host: &Rc<ChartHost>, container: Rc<dyn Container>, spec: ChartSpec) -> Rc<Self> {
        let size = container.size();
        Rc::new(Self {
            host: Rc::downgrade(host),
            kind: spec.kind,
            id_info: IdInfo::new(&spec.chart_id, &spec.identity),
            show_loading: host.options().show_loading,
            options: RefCell::new(spec.options),
            engine: RefCell::new(None),
            state: Cell::new(ChartState::Uninitialized),
            size: Cell::new(size),
            gate: RequestGate::new(),
            last_payload: RefCell::new(None),
            loading: Cell::new(0),
            loading_epoch: Cell::new(0),
            container,
        })
    }

    pub fn chart_id(&self) -> &str {
        &self.id_info.chart_id
    }

    pub fn id_info(&self) -> &IdInfo {
        &self.id_info
    }

    pub fn kind(&self) -> ChartKind {
        self.kind
    }

    pub fn state(&self) -> ChartState {
        self.state.get()
    }

    pub fn container(&self) -> &Rc<dyn Container> {
        &self.container
    }

    pub fn options(&self) -> ChartAttr {
        self.options.borrow().clone()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    /// Capabilities of the live engine handle, `None` when no handle is held.
    pub fn engine_capabilities(&self) -> Option<Capabilities> {
        self.engine.borrow().as_ref().map(|h| h.capabilities())
    }

    pub fn has_engine(&self) -> bool {
        self.engine.borrow().is_some()
    }

    pub fn loading_depth(&self) -> u32 {
        self.loading.get()
    }

    pub(crate) fn host(&self) -> Option<Rc<ChartHost>> {
        self.host.upgrade()
    }

    pub(crate) fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub(crate) fn last_payload(&self) -> Option<RefreshRequest> {
        self.last_payload.borrow().clone()
    }

    pub(crate) fn set_last_payload(&self, payload: RefreshRequest) {
        *self.last_payload.borrow_mut() = Some(payload);
    }

    /// Register with the host, build the engine instance and start timers.
    pub fn init(self: &Rc<Self>) {
        let Some(host) = self.host() else {
            warn!(chart = %self.chart_id(), "init on a dropped host");
            return;
        };
        host.store(self.clone());
        self.mount();
        debug!(chart = %self.chart_id(), state = ?self.state(), "chart initialised");
    }

    fn mount(self: &Rc<Self>) {
        self.render();
        self.start_timers();
    }

    fn rebuild(self: &Rc<Self>) {
        self.teardown();
        self.mount();
    }

    fn render(self: &Rc<Self>) {
        let Some(host) = self.host() else { return };
        self.release_engine();
        let options = self.options();

        if self.kind == ChartKind::BackgroundAware {
            // never leave a previous background behind the new rendering
            self.container.set_background(None);
            if !options.has_series() {
                self.container.set_placeholder(true);
                self.state.set(ChartState::EmptyData);
                debug!(chart = %self.chart_id(), "no renderable series; showing placeholder");
                return;
            }
            self.container.set_placeholder(false);
            if let Some(background) = options.background() {
                self.container.set_background(Some(&background));
            }
        }

        match host.engine().init(&self.container, &options) {
            Ok(mut handle) => {
                links::attach(&Rc::downgrade(self), handle.as_mut(), &options);
                *self.engine.borrow_mut() = Some(handle);
                self.state.set(ChartState::Rendering);
            }
            Err(err) => warn!(chart = %self.chart_id(), %err, "engine init failed"),
        }
    }

    fn start_timers(self: &Rc<Self>) {
        let Some(host) = self.host() else { return };
        self.start_watermark(&host);
        let intervals = self.options.borrow().refresh_intervals();
        match intervals {
            Some(intervals) => {
                autorefresh::start(&host, self, &intervals);
            }
            None => {
                host.timers().cancel_kind(self.container.id(), TimerKind::AutoRefresh);
            }
        }
    }

    fn start_watermark(&self, host: &ChartHost) {
        let owner = self.container.id();
        host.timers().cancel_kind(owner, TimerKind::Watermark);
        let Some(text) = self.options.borrow().watermark().map(str::to_string) else { return };
        let container = self.container.clone();
        let period = host.options().watermark_interval();
        let task = tokio::task::spawn_local(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                container.draw_watermark(&text);
            }
        });
        host.timers().attach(owner, TimerKind::Watermark, task.abort_handle());
    }

    /// Run every teardown capability the handle declares; failures are logged, never raised.
    fn release_engine(&self) {
        let Some(mut handle) = self.engine.borrow_mut().take() else { return };
        let caps = handle.capabilities();
        if caps.contains(Capabilities::CLEAR) {
            if let Err(err) = handle.clear() {
                warn!(chart = %self.chart_id(), %err, "engine clear failed");
            }
        }
        if caps.contains(Capabilities::REMOVE) {
            if let Err(err) = handle.remove() {
                warn!(chart = %self.chart_id(), %err, "engine remove failed");
            }
        }
        if caps.contains(Capabilities::DISPOSE) {
            if let Err(err) = handle.dispose() {
                warn!(chart = %self.chart_id(), %err, "engine dispose failed");
            }
        }
    }

    fn teardown(&self) {
        let host = self.host();
        let detached = TimerBook::new();
        let timers = host.as_ref().map(|h| h.timers()).unwrap_or(&detached);
        timers.cancel_kind(self.container.id(), TimerKind::Watermark);
        self.release_engine();
        reclaim(self.container.as_ref(), timers);
        if self.kind == ChartKind::BackgroundAware {
            self.container.set_background(None);
            self.container.set_placeholder(false);
        }
        self.loading_epoch.set(self.loading_epoch.get() + 1);
        if self.loading.replace(0) > 0 && self.show_loading {
            self.container.set_loading(false);
        }
    }

    /// Release engine, timers and container content. Idempotent; the instance
    /// stays cleared and in-flight responses become inert.
    pub fn clear(&self) {
        if self.state.get() == ChartState::Cleared {
            return;
        }
        self.gate.invalidate();
        self.teardown();
        self.state.set(ChartState::Cleared);
        debug!(chart = %self.chart_id(), "chart cleared");
    }

    /// `clear` plus forgetting the last applied request.
    pub fn clear_all(&self) {
        self.clear();
        self.last_payload.borrow_mut().take();
    }

    /// Dispose and drop the registry entry.
    pub fn remove(self: &Rc<Self>) {
        self.clear_all();
        if let Some(host) = self.host() {
            host.unregister(self);
        }
    }

    /// Resize in place when the engine can, otherwise tear down and rebuild.
    pub fn resize(self: &Rc<Self>, width: u32, height: u32) {
        if matches!(self.state.get(), ChartState::Cleared | ChartState::Uninitialized) {
            return;
        }
        self.size.set((width, height));
        let resized = {
            let mut engine = self.engine.borrow_mut();
            match engine.as_mut() {
                Some(handle) if handle.capabilities().contains(Capabilities::RESIZE) => match handle.resize() {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(chart = %self.chart_id(), %err, "engine resize failed; rebuilding");
                        false
                    }
                },
                _ => false,
            }
        };
        if !resized {
            self.rebuild();
        }
    }

    /// Debounced remote refresh; see [`crate::refresh`].
    pub fn refresh(self: &Rc<Self>, parameters: Map<String, Value>, force: bool) -> JoinHandle<RefreshOutcome> {
        request_refresh(self.clone(), RefreshParams { parameters, force }, None)
    }

    pub fn refresh_with(
        self: &Rc<Self>,
        params: RefreshParams,
        on_applied: OnApplied,
    ) -> JoinHandle<RefreshOutcome> {
        request_refresh(self.clone(), params, Some(on_applied))
    }

    /// User interaction (point click, drill-down): resolve hyperlinks server-side and dispatch them.
    pub fn on_interaction(self: &Rc<Self>, parameters: Map<String, Value>) -> JoinHandle<usize> {
        links::resolve_interaction(self.clone(), parameters, None)
    }

    /// Navigate to the image export of `slot`; returns the URL used, or
    /// [`HostError::Disposed`] once the owning host is gone.
    pub fn export_image(&self, slot: usize) -> Result<String> {
        let host = self.host().ok_or(HostError::Disposed)?;
        let (width, height) = self.size.get();
        let url = export_url(
            &host.options().endpoints.export,
            &ExportQuery {
                session_id: &host.options().session_id,
                width,
                height,
                index: slot,
                chart_id: self.chart_id(),
                sheet_index: self.id_info.sheet_index,
                ec_name: self.id_info.ec_name.as_deref(),
            },
        );
        host.transport().navigate(&url);
        Ok(url)
    }

    pub(crate) fn refresh_payload(&self, parameters: Map<String, Value>) -> RefreshRequest {
        let (chart_width, chart_height) = self.size.get();
        RefreshRequest {
            chart_id: self.id_info.chart_id.clone(),
            chart_width,
            chart_height,
            sheet_index: self.id_info.sheet_index,
            ec_name: self.id_info.ec_name.clone(),
            parameters,
        }
    }

    pub(crate) fn data_payload(&self, slot: Option<usize>) -> DataRequest {
        let (chart_width, chart_height) = self.size.get();
        DataRequest {
            chart_id: self.id_info.chart_id.clone(),
            chart_width,
            chart_height,
            sheet_index: self.id_info.sheet_index,
            ec_name: self.id_info.ec_name.clone(),
            index: slot,
        }
    }

    /// Take a share of the loading indicator. Shares taken before a teardown
    /// are void afterwards.
    pub(crate) fn begin_loading(&self) -> LoadingShare {
        let depth = self.loading.get();
        self.loading.set(depth + 1);
        if depth == 0 && self.show_loading {
            self.container.set_loading(true);
        }
        LoadingShare { epoch: self.loading_epoch.get() }
    }

    pub(crate) fn end_loading(&self, share: LoadingShare) {
        let depth = self.loading.get();
        if depth == 0 || share.epoch != self.loading_epoch.get() {
            return;
        }
        self.loading.set(depth - 1);
        if depth == 1 && self.show_loading {
            self.container.set_loading(false);
        }
    }

    /// Apply a fresh option payload: patch in place when the shape allows it,
    /// otherwise rebuild. Timers are restarted either way.
    pub(crate) fn apply_options(self: &Rc<Self>, attr: ChartAttr) {
        if self.state.get() == ChartState::Cleared {
            return;
        }
        let previous = self.options.replace(attr.clone());
        let patchable = self.state.get() == ChartState::Rendering
            && !attr.requires_rebuild_from(&previous)
            && (self.kind == ChartKind::Simple || attr.has_series());
        if patchable {
            let patched = match self.engine.borrow_mut().as_mut() {
                Some(handle) => match handle.set_options(&attr) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(chart = %self.chart_id(), %err, "set_options failed; rebuilding");
                        false
                    }
                },
                None => false,
            };
            if patched {
                self.start_timers();
                return;
            }
        }
        self.rebuild();
    }

    /// Patch series data from a data-only refresh without touching timers.
    pub(crate) fn apply_data(self: &Rc<Self>, series: Value, slot: Option<usize>) {
        if self.state.get() == ChartState::Cleared {
            return;
        }
        self.options.borrow_mut().merge_series(slot, series);
        let options = self.options();
        if self.kind == ChartKind::BackgroundAware {
            let was_empty = self.state.get() == ChartState::EmptyData;
            let is_empty = !options.has_series();
            if was_empty && is_empty {
                return;
            }
            if was_empty != is_empty {
                self.rerender();
                return;
            }
        }
        let patched = match self.engine.borrow_mut().as_mut() {
            Some(handle) => {
                let result = if handle.capabilities().contains(Capabilities::SET_DATA) {
                    handle.set_data(&options, slot)
                } else {
                    handle.set_options(&options)
                };
                result.map_err(|err| warn!(chart = %self.chart_id(), %err, "data patch failed")).is_ok()
            }
            None => false,
        };
        if !patched {
            self.rerender();
        }
    }

    /// New engine instance on a clean surface, timers untouched.
    fn rerender(self: &Rc<Self>) {
        self.release_engine();
        release_surface(self.container.as_ref());
        self.render();
    }
}

impl RegistryMember for ChartInstance {
    fn id_info(&self) -> IdInfo {
        self.id_info.clone()
    }

    fn dispose(&self) {
        self.clear_all();
    }
}
