// File: crates/chart-host/src/refresh.rs
// Summary: Debounced, latest-wins remote refresh of a chart instance.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::chart::{ChartInstance, ChartState};
use crate::protocol::{decode_entries, pick_entry};

/// Issues request tickets; only the most recently issued ticket is current.
#[derive(Debug, Default)]
pub struct RequestGate {
    generation: Cell<u64>,
}

/// Marker of one issued request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTicket(u64);

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede every earlier ticket.
    pub fn issue(&self) -> RequestTicket {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        RequestTicket(next)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.generation.get() == ticket.0
    }

    /// Make every outstanding ticket stale without issuing a new one.
    pub fn invalidate(&self) {
        self.generation.set(self.generation.get() + 1);
    }
}

/// How a refresh request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A newer request was issued during the debounce window.
    Superseded,
    /// Payload equal to the last applied one; no network call made.
    Unchanged,
    Applied,
    /// Response arrived after a newer request was issued; discarded.
    Stale,
    /// Transport or decode failure; last-good state kept.
    Failed,
    /// Instance cleared or host gone before the request could run.
    Cleared,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshParams {
    /// Caller-supplied parameters sent as `__parameters__`.
    pub parameters: Map<String, Value>,
    /// Skip the payload-equality short circuit.
    pub force: bool,
}

impl RefreshParams {
    pub fn new(parameters: Map<String, Value>) -> Self {
        Self { parameters, force: false }
    }

    pub fn forced(parameters: Map<String, Value>) -> Self {
        Self { parameters, force: true }
    }
}

pub type OnApplied = Box<dyn FnOnce(&ChartInstance)>;

/// Record a new ticket on `chart` and run the refresh on the local event loop.
/// Must be called from within a `tokio::task::LocalSet`.
pub fn request_refresh(
    chart: Rc<ChartInstance>,
    params: RefreshParams,
    on_applied: Option<OnApplied>,
) -> JoinHandle<RefreshOutcome> {
    let ticket = chart.gate().issue();
    tokio::task::spawn_local(async move { run_refresh(chart, ticket, params, on_applied).await })
}

async fn run_refresh(
    chart: Rc<ChartInstance>,
    ticket: RequestTicket,
    params: RefreshParams,
    on_applied: Option<OnApplied>,
) -> RefreshOutcome {
    let Some(host) = chart.host() else { return RefreshOutcome::Cleared };

    tokio::time::sleep(host.options().debounce()).await;
    if !chart.gate().is_current(ticket) {
        trace!(chart = %chart.chart_id(), "refresh superseded during debounce");
        return RefreshOutcome::Superseded;
    }
    if chart.state() == ChartState::Cleared {
        return RefreshOutcome::Cleared;
    }

    let payload = chart.refresh_payload(params.parameters);
    if !params.force && chart.last_payload().as_ref() == Some(&payload) {
        trace!(chart = %chart.chart_id(), "refresh payload unchanged; skipping request");
        return RefreshOutcome::Unchanged;
    }
    let request = match payload.to_http(&host.options().endpoints.refresh) {
        Ok(r) => r,
        Err(err) => {
            warn!(chart = %chart.chart_id(), %err, "could not encode refresh request");
            return RefreshOutcome::Failed;
        }
    };

    let transport = host.transport().clone();
    drop(host);
    let share = chart.begin_loading();
    let result = transport.send(request).await;
    chart.end_loading(share);

    if !chart.gate().is_current(ticket) {
        trace!(chart = %chart.chart_id(), "discarding stale refresh response");
        return RefreshOutcome::Stale;
    }
    let body = match result {
        Ok(body) => body,
        Err(err) => {
            warn!(chart = %chart.chart_id(), %err, "refresh request failed");
            return RefreshOutcome::Failed;
        }
    };
    let entry = match decode_entries(body) {
        Ok(entries) => pick_entry(entries, chart.chart_id()),
        Err(err) => {
            warn!(chart = %chart.chart_id(), %err, "malformed refresh response");
            return RefreshOutcome::Failed;
        }
    };
    let Some(entry) = entry else {
        warn!(chart = %chart.chart_id(), "refresh response carried no chart entry");
        return RefreshOutcome::Failed;
    };

    chart.set_last_payload(payload);
    chart.apply_options(entry.chart_attr);
    if let Some(callback) = on_applied {
        callback(&chart);
    }
    RefreshOutcome::Applied
}
