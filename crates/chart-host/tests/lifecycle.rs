// File: crates/chart-host/tests/lifecycle.rs
// Purpose: Instance lifecycle: render variants, teardown, reclaim, resize, host disposal and carousel.

mod common;

use std::time::Duration;

use chart_host::identity::ChartOrigin;
use chart_host::{
    reclaim, Background, Capabilities, Carousel, ChartAttr, ChartKind, ChartSpec, ChartState, Container, HostError, HostOptions,
    IdentityTuple, ReclaimReport, RefreshOutcome, TimerKind, Widget,
};
use common::{echo_body, host, host_with, line_attr, local, settle, FakeContainer, FakeEngine, FakeTransport};
use serde_json::{json, Map, Value};

fn decorated(series: Value) -> Value {
    json!({
        "chartType": "line",
        "background": { "type": "color", "value": "#eee" },
        "series": series
    })
}

fn versioned(v: i64) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("v".into(), json!(v));
    map
}

#[tokio::test(start_paused = true)]
async fn background_aware_swaps_between_engine_and_placeholder() {
    local(async {
        let engine = FakeEngine::full();
        // v=1 answers with no series, anything else with one
        let transport = FakeTransport::new(|req| {
            let series = if req.params["__parameters__"]["v"] == 1 { json!([]) } else { json!([{ "data": [1] }]) };
            (Duration::from_millis(10), Ok(echo_body(req, &decorated(series))))
        });
        let host = host(&engine, &transport);
        let container = FakeContainer::new(300, 200);
        let spec = ChartSpec::new("Float1", ChartAttr::new(decorated(json!([{ "data": [1] }]))))
            .with_kind(ChartKind::BackgroundAware);
        let chart = host.create_chart(container.clone(), spec);

        assert_eq!(chart.state(), ChartState::Rendering);
        assert_eq!(*container.background.borrow(), Some(Background::Color { value: "#eee".into() }));
        assert!(!container.placeholder.get());

        assert_eq!(chart.refresh(versioned(1), false).await.unwrap(), RefreshOutcome::Applied);
        assert_eq!(chart.state(), ChartState::EmptyData);
        assert!(!chart.has_engine());
        assert_eq!(engine.log.live_handles(), 0);
        assert!(container.placeholder.get());
        assert!(container.background.borrow().is_none());

        assert_eq!(chart.refresh(versioned(2), false).await.unwrap(), RefreshOutcome::Applied);
        assert_eq!(chart.state(), ChartState::Rendering);
        assert_eq!(engine.log.live_handles(), 1);
        assert_eq!(engine.log.inits.get(), 2);
        assert!(!container.placeholder.get());
        assert!(container.background.borrow().is_some());
        assert!(!container.stacked_background.get());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn simple_chart_renders_even_without_series() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let container = FakeContainer::new(100, 100);
        let chart = host.create_chart(container.clone(), ChartSpec::new("Float1", ChartAttr::new(json!({ "series": [] }))));

        assert_eq!(chart.state(), ChartState::Rendering);
        assert!(!container.placeholder.get());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn reclaim_releases_everything_once() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let container = FakeContainer::new(100, 100);
        let gpu_a = container.add_canvas(true);
        let gpu_b = container.add_canvas(true);
        let plain = container.add_canvas(false);

        let first = tokio::task::spawn_local(std::future::pending::<()>());
        let second = tokio::task::spawn_local(std::future::pending::<()>());
        host.timers().attach(container.id(), TimerKind::AutoRefresh, first.abort_handle());
        host.timers().attach(container.id(), TimerKind::Watermark, second.abort_handle());

        let report = reclaim(container.as_ref(), host.timers());
        assert_eq!(report, ReclaimReport { timers_cancelled: 2, contexts_lost: 2 });
        assert_eq!(reclaim(container.as_ref(), host.timers()), ReclaimReport::default());

        assert_eq!(host.timers().active(container.id()), 0);
        assert_eq!(gpu_a.lose_calls.get(), 1);
        assert_eq!(gpu_b.lose_calls.get(), 1);
        assert_eq!(plain.lose_calls.get(), 0);
        assert_eq!(container.canvas_count(), 0);
        assert!(first.await.unwrap_err().is_cancelled());
        assert!(second.await.unwrap_err().is_cancelled());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn clear_is_idempotent() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let container = FakeContainer::new(300, 200);
        let attr = json!({ "series": [{ "data": [1] }], "watermark": "TRIAL", "autoRefreshTime": 5 });
        let chart = host.create_chart(container.clone(), ChartSpec::new("Float1", ChartAttr::new(attr)));
        let canvas = container.add_canvas(true);
        assert_eq!(host.timers().active(container.id()), 2);

        chart.clear();
        chart.clear();

        assert_eq!(chart.state(), ChartState::Cleared);
        assert!(!chart.has_engine());
        assert_eq!(engine.log.disposals.get(), 1);
        assert_eq!(engine.log.clears.get(), 1);
        assert_eq!(canvas.lose_calls.get(), 1);
        assert_eq!(host.timers().total(), 0);
        // still registered until removed
        assert_eq!(host.chart_count(), 1);
        chart.remove();
        assert_eq!(host.chart_count(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn watermark_redraws_until_cleared() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let container = FakeContainer::new(300, 200);
        let attr = json!({ "series": [{ "data": [1] }], "watermark": "TRIAL" });
        let chart = host.create_chart(container.clone(), ChartSpec::new("Float1", ChartAttr::new(attr)));

        settle(2500).await;
        let drawn = container.watermarks.get();
        assert!(drawn >= 3, "drawn {drawn} times");
        assert_eq!(host.timers().active_kind(container.id(), TimerKind::Watermark), 1);

        chart.clear();
        settle(3000).await;
        assert_eq!(container.watermarks.get(), drawn);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn resize_uses_engine_when_capable() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let chart = host.create_chart(FakeContainer::new(300, 200), ChartSpec::new("Float1", line_attr()));

        chart.resize(400, 300);
        assert_eq!(engine.log.resizes.get(), 1);
        assert_eq!(engine.log.inits.get(), 1);
        assert_eq!(chart.size(), (400, 300));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn resize_without_capability_rebuilds() {
    local(async {
        let engine = FakeEngine::new(Capabilities::all() - Capabilities::RESIZE);
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let container = FakeContainer::new(300, 200);
        let attr = json!({ "series": [{ "data": [1] }], "autoRefreshTime": 5 });
        let chart = host.create_chart(container.clone(), ChartSpec::new("Float1", ChartAttr::new(attr)));

        chart.resize(400, 300);
        assert_eq!(engine.log.resizes.get(), 0);
        assert_eq!(engine.log.inits.get(), 2);
        assert_eq!(engine.log.disposals.get(), 1);
        assert_eq!(engine.log.live_handles(), 1);
        assert_eq!(chart.state(), ChartState::Rendering);
        assert_eq!(host.timers().active_kind(container.id(), TimerKind::AutoRefresh), 1);

        chart.clear();
        chart.resize(500, 500);
        assert_eq!(engine.log.inits.get(), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn failed_engine_init_leaves_chart_unrendered() {
    local(async {
        let engine = FakeEngine::full();
        engine.fail_init.set(true);
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let chart = host.create_chart(FakeContainer::new(300, 200), ChartSpec::new("Float1", line_attr()));

        assert_eq!(chart.state(), ChartState::Uninitialized);
        assert!(!chart.has_engine());
        assert_eq!(host.chart_count(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn re_registering_an_id_disposes_the_previous_chart() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let old = host.create_chart(FakeContainer::new(300, 200), ChartSpec::new("Chart__Float1", line_attr()));
        let new = host.create_chart(FakeContainer::new(300, 200), ChartSpec::new("Chart__Float1", line_attr()));

        assert_eq!(old.state(), ChartState::Cleared);
        assert_eq!(new.state(), ChartState::Rendering);
        assert_eq!(host.chart_count(), 1);
        assert_eq!(engine.log.disposals.get(), 1);
        let resolved = host.resolve("Float1", None).unwrap();
        assert_eq!(resolved.chart_id(), new.chart_id());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn sheet_eviction_drops_only_matching_slot() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let spec = |slot: usize, sheet: u32| {
            ChartSpec::new(format!("Chart__Cells_A1__index__{slot}"), line_attr())
                .with_identity(IdentityTuple::default().with_kind(ChartOrigin::Cell).with_sheet(sheet))
        };
        let first = host.create_chart(FakeContainer::new(300, 200), spec(0, 0));
        let second = host.create_chart(FakeContainer::new(300, 200), spec(1, 1));
        assert_eq!(host.lookup("Cells_A1", None).unwrap().slots(), vec![0, 1]);

        assert_eq!(host.evict_sheet(0), 1);
        assert_eq!(host.lookup("Cells_A1", None).unwrap().slots(), vec![1]);
        assert_eq!(first.state(), ChartState::Cleared);
        assert_eq!(second.state(), ChartState::Rendering);

        assert_eq!(host.evict_block("nothing"), 0);
        assert_eq!(host.evict_sheet(1), 1);
        assert_eq!(host.set_count(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn host_dispose_tears_down_everything() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let timed = json!({ "series": [{ "data": [1] }], "watermark": "T", "autoRefreshTime": [1, 2] });
        let charts = vec![
            host.create_chart(FakeContainer::new(10, 10), ChartSpec::new("A", line_attr())),
            host.create_chart(FakeContainer::new(10, 10), ChartSpec::new("B", ChartAttr::new(timed))),
            host.create_chart(FakeContainer::new(10, 10), ChartSpec::new("C__index__1", line_attr())),
        ];
        let carousel = Carousel::mount(&host, "Chart__D");
        assert_eq!(host.timers().total(), 3);

        assert_eq!(host.dispose(), 3);
        assert_eq!(host.chart_count(), 0);
        assert_eq!(host.set_count(), 0);
        assert_eq!(host.timers().total(), 0);
        assert!(charts.iter().all(|c| c.state() == ChartState::Cleared));
        assert!(carousel.is_disposed());
        assert_eq!(engine.log.live_handles(), 0);
        assert_eq!(engine.log.purged.get(), 1);

        assert_eq!(host.dispose(), 0);
        settle(5000).await;
        assert_eq!(transport.count("/chart/data"), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn carousel_switch_changes_displayed_member() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let host = host(&engine, &transport);
        let carousel = Carousel::mount(&host, "Chart__Float9");
        for (slot, sheet) in [(0, 0), (1, 1)] {
            let spec = ChartSpec::new(format!("Chart__Float9__index__{slot}"), line_attr())
                .with_identity(IdentityTuple::named("Deck").with_sheet(sheet));
            host.create_chart(FakeContainer::new(320, 240), spec);
        }
        let sheet_one = IdentityTuple::default().with_sheet(1);

        assert_eq!(host.resolve("Float9", Some(&sheet_one)).unwrap().id_info().slot, 0);
        assert!(carousel.switch_to(1));
        assert_eq!(carousel.current_slot(), 1);
        assert_eq!(engine.log.resizes.get(), 1);
        assert_eq!(host.resolve("Float9", Some(&sheet_one)).unwrap().id_info().slot, 1);
        assert!(!carousel.switch_to(7));
        assert_eq!(carousel.current_slot(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn export_navigates_to_image_url() {
    local(async {
        let engine = FakeEngine::full();
        let transport = FakeTransport::echo(10, json!({}));
        let options = HostOptions { session_id: "sess-1".into(), ..HostOptions::default() };
        let host = host_with(options, &engine, &transport);
        let spec = ChartSpec::new("Chart__Float1__index__1", line_attr())
            .with_identity(IdentityTuple::default().with_sheet(0).with_ec_name("Block A"));
        let chart = host.create_chart(FakeContainer::new(640, 480), spec);

        let url = chart.export_image(1).unwrap();
        assert_eq!(
            url,
            "/chart/export?sessionID=sess-1&width=640&height=480&index=1&chartID=Chart__Float1__index__1&sheetIndex=0&ecName=Block%20A"
        );
        assert_eq!(*transport.navigations.borrow(), vec![url]);

        drop(host);
        assert!(matches!(chart.export_image(1), Err(HostError::Disposed)));
        assert_eq!(transport.navigations.borrow().len(), 1);
    })
    .await;
}
