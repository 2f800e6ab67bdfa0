// File: crates/chart-host/src/autorefresh.rs
// Summary: Recurring data-only refresh timers, one per chart or one per carousel slot.

use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::attr::RefreshIntervals;
use crate::chart::{ChartInstance, ChartState};
use crate::host::ChartHost;
use crate::protocol::{decode_entries, pick_entry};
use crate::refresh::RefreshOutcome;
use crate::timers::TimerKind;

/// (Re)start auto-refresh for `chart`. Existing auto-refresh timers of the
/// chart's container are cancelled first. Returns the number of timers started.
pub fn start(host: &ChartHost, chart: &Rc<ChartInstance>, intervals: &RefreshIntervals) -> usize {
    let owner = chart.container().id();
    let cancelled = host.timers().cancel_kind(owner, TimerKind::AutoRefresh);
    if cancelled > 0 {
        trace!(chart = %chart.chart_id(), cancelled, "restarting auto-refresh");
    }
    match intervals {
        RefreshIntervals::Single(period) => usize::from(spawn_timer(host, chart, *period, None)),
        RefreshIntervals::PerSlot(slots) => slots
            .iter()
            .filter(|(slot, period)| spawn_timer(host, chart, *period, Some(*slot)))
            .count(),
    }
}

/// Cancel the chart's auto-refresh timers without touching anything else.
pub fn stop(host: &ChartHost, chart: &ChartInstance) -> usize {
    host.timers().cancel_kind(chart.container().id(), TimerKind::AutoRefresh)
}

fn spawn_timer(host: &ChartHost, chart: &Rc<ChartInstance>, period: Duration, slot: Option<usize>) -> bool {
    let Some(first) = Instant::now().checked_add(period) else {
        warn!(chart = %chart.chart_id(), ?period, ?slot, "auto-refresh period out of range; timer not started");
        return false;
    };
    let weak: Weak<ChartInstance> = Rc::downgrade(chart);
    let task = tokio::task::spawn_local(async move {
        let mut ticker = interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(chart) = weak.upgrade() else { break };
            let Some(host) = chart.host() else { break };
            if !chart.container().is_attached() {
                debug!(chart = %chart.chart_id(), "container detached; stopping auto-refresh");
                host.timers().cancel_all(chart.container().id());
                chart.clear();
                break;
            }
            drop(host);
            tick(&chart, slot).await;
        }
    });
    host.timers().attach(chart.container().id(), TimerKind::AutoRefresh, task.abort_handle());
    true
}

/// One data-only refresh for `slot` (or the whole chart).
pub async fn tick(chart: &Rc<ChartInstance>, slot: Option<usize>) -> RefreshOutcome {
    let Some(host) = chart.host() else { return RefreshOutcome::Cleared };
    let request = match chart.data_payload(slot).to_http(&host.options().endpoints.data) {
        Ok(r) => r,
        Err(err) => {
            warn!(chart = %chart.chart_id(), %err, "could not encode data request");
            return RefreshOutcome::Failed;
        }
    };
    let transport = host.transport().clone();
    drop(host);

    let result = transport.send(request).await;
    if chart.state() == ChartState::Cleared {
        return RefreshOutcome::Stale;
    }
    let entry = match result.and_then(decode_entries) {
        Ok(entries) => pick_entry(entries, chart.chart_id()),
        Err(err) => {
            warn!(chart = %chart.chart_id(), %err, "auto-refresh request failed");
            return RefreshOutcome::Failed;
        }
    };
    let Some(series) = entry.and_then(|e| e.chart_attr.as_value().get("series").cloned()) else {
        warn!(chart = %chart.chart_id(), "auto-refresh response carried no series");
        return RefreshOutcome::Failed;
    };
    chart.apply_data(series, slot);
    RefreshOutcome::Applied
}
