// File: crates/demo/src/main.rs
// Summary: Scripted page session: mount charts, refresh, follow links, auto-refresh, export, tear down.

mod sandbox;

use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use chart_host::{
    AnimationEvent, Carousel, ChartAttr, ChartHost, ChartKind, ChartSpec, HostOptions, IdentityTuple,
};
use serde_json::{json, Map};
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sandbox::{CannedServer, LogEngine, Panel};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,chart_host=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Optional host options JSON as the first argument
    let options = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read options '{path}'"))?;
            HostOptions::from_json(&text).with_context(|| format!("invalid options in '{path}'"))?
        }
        None => HostOptions { session_id: "demo-session".to_string(), ..HostOptions::default() },
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to build runtime")?;
    LocalSet::new().block_on(&runtime, session(options))
}

async fn session(options: HostOptions) -> Result<()> {
    let engine = Rc::new(LogEngine::default());
    let server = CannedServer::new(Duration::from_millis(40));
    let host = ChartHost::new(options, engine.clone(), server.clone());

    // 1) Mount: a linked source, its target, a background-aware float and a two-slot carousel
    let source_attr = json!({
        "chartType": "bar",
        "watermark": "TRIAL",
        "series": [{ "name": "q", "data": [3, 1, 4] }],
        "autoLinks": [{ "target": "Cells__B2", "refreshType": "increment", "parameters": { "from": "A1" } }]
    });
    let source = host.create_chart(
        Panel::new(1, 300, 200),
        ChartSpec::new("Cells__A1__", ChartAttr::new(source_attr)).with_identity(IdentityTuple::named("Quarterly").with_sheet(0)),
    );
    let target = host.create_chart(
        Panel::new(2, 300, 200),
        ChartSpec::new("Cells__B2", ChartAttr::new(json!({ "chartType": "pie", "series": [{ "data": [1] }] })))
            .with_identity(IdentityTuple::default().with_sheet(0)),
    );
    let float_panel = Panel::new(3, 480, 320);
    let float_attr = json!({
        "chartType": "line",
        "background": { "type": "gradient", "from": "#fff", "to": "#def", "angle": 90.0 },
        "autoRefreshTime": 2,
        "series": []
    });
    let float = host.create_chart(
        float_panel.clone(),
        ChartSpec::new("Chart__Float1", ChartAttr::new(float_attr)).with_kind(ChartKind::BackgroundAware),
    );
    let carousel = Carousel::mount(&host, "Chart__Deck");
    for slot in 0..2u32 {
        host.create_chart(
            Panel::new(10 + u64::from(slot), 320, 240),
            ChartSpec::new(format!("Chart__Deck__index__{slot}"), ChartAttr::new(json!({ "series": [{ "data": [slot] }] })))
                .with_identity(IdentityTuple::default().with_sheet(1)),
        );
    }
    info!(charts = host.chart_count(), sets = host.set_count(), float = ?float.state(), "mounted");

    // 2) Exit animation on the source: the increment link refreshes B2 once the animation ends
    engine.play_exit(&AnimationEvent { point: Some(json!({ "x": 2 })), series_name: Some("q".into()) });
    tokio::time::sleep(Duration::from_millis(800)).await;

    // 3) Burst of refreshes inside the debounce window: only the last one goes out
    let first = source.refresh(Map::new(), false);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = source.refresh(Map::new(), false);
    let (first, second) = (first.await.context("refresh task failed")?, second.await.context("refresh task failed")?);
    info!(?first, ?second, "refresh burst settled");

    // 4) Click-through resolved by the server
    let mut click = Map::new();
    click.insert("row".into(), json!(2));
    let dispatched = source.on_interaction(click).await.context("interaction task failed")?;
    info!(dispatched, "interaction dispatched");

    // 5) Resize: in place for the bar source, teardown and rebuild for the pie target
    source.resize(360, 240);
    target.resize(360, 240);
    info!(target = ?target.state(), live_engines = engine.live(), "resized");

    // 6) Carousel paging, auto-refresh on the empty float
    carousel.switch_to(1);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    info!(float = ?float.state(), "after first auto-refresh tick");

    // 7) Export, then drop the float's panel from the page
    let url = source.export_image(0).context("exporting the source chart")?;
    info!(%url, "exported");
    float_panel.detach();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    info!(float = ?float.state(), timers = host.timers().total(), "after detach");

    // 8) Sheet switch evicts the carousel slots, page unload disposes the rest
    let evicted = host.evict_sheet(1);
    let disposed = host.dispose();
    info!(
        evicted,
        disposed,
        live_engines = engine.live(),
        navigations = server.navigations.borrow().len(),
        "session finished"
    );
    Ok(())
}
