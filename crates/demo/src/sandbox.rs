// File: crates/demo/src/sandbox.rs
// Summary: In-process stand-ins for the page: a logging engine, plain containers and a canned chart server.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chart_host::{
    AnimationEvent, AnimationHandler, AnimationPhase, Background, Canvas, Capabilities, ChartAttr, Container,
    ContainerId, EngineHandle, HostError, HttpRequest, RenderEngine, Result, Transport,
};
use futures::future::LocalBoxFuture;
use serde_json::{json, Value};
use tracing::info;

type Hooks = Rc<RefCell<Vec<(u64, AnimationPhase, AnimationHandler)>>>;

/// Engine that renders nothing and reports what it was asked to do.
#[derive(Default)]
pub struct LogEngine {
    hooks: Hooks,
    live: Rc<Cell<usize>>,
    next: Cell<u64>,
}

impl LogEngine {
    /// Play an exit animation on every hooked instance.
    pub fn play_exit(&self, event: &AnimationEvent) {
        for phase in [AnimationPhase::ExitBegin, AnimationPhase::ExitEnd] {
            for (_, hooked, handler) in self.hooks.borrow_mut().iter_mut() {
                if *hooked == phase {
                    handler(event);
                }
            }
        }
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }
}

impl RenderEngine for LogEngine {
    fn init(&self, container: &Rc<dyn Container>, options: &ChartAttr) -> Result<Box<dyn EngineHandle>> {
        let kind = options.chart_type().unwrap_or("line").to_string();
        info!(container = container.id().0, %kind, series = options.series().len(), "engine init");
        self.live.set(self.live.get() + 1);
        let id = self.next.get() + 1;
        self.next.set(id);
        Ok(Box::new(LogHandle { id, kind, hooks: self.hooks.clone(), live: self.live.clone() }))
    }

    fn purge_cache(&self) {
        self.hooks.borrow_mut().clear();
    }
}

struct LogHandle {
    id: u64,
    kind: String,
    hooks: Hooks,
    live: Rc<Cell<usize>>,
}

impl EngineHandle for LogHandle {
    fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::RESIZE | Capabilities::DISPOSE | Capabilities::EVENTS | Capabilities::SET_DATA;
        // pie layouts are recomputed from scratch
        if self.kind == "pie" { caps - Capabilities::RESIZE } else { caps }
    }

    fn set_options(&mut self, options: &ChartAttr) -> Result<()> {
        info!(kind = %self.kind, series = options.series().len(), "engine set_options");
        Ok(())
    }

    fn resize(&mut self) -> Result<()> {
        info!(kind = %self.kind, "engine resize");
        Ok(())
    }

    fn dispose(&mut self) -> Result<()> {
        self.live.set(self.live.get().saturating_sub(1));
        self.hooks.borrow_mut().retain(|(owner, _, _)| *owner != self.id);
        info!(kind = %self.kind, "engine dispose");
        Ok(())
    }

    fn on(&mut self, phase: AnimationPhase, handler: AnimationHandler) -> Result<()> {
        self.hooks.borrow_mut().push((self.id, phase, handler));
        Ok(())
    }

    fn set_data(&mut self, options: &ChartAttr, slot: Option<usize>) -> Result<()> {
        info!(kind = %self.kind, ?slot, series = options.series().len(), "engine set_data");
        Ok(())
    }
}

struct GpuCanvas;

impl Canvas for GpuCanvas {
    fn has_gpu_context(&self) -> bool {
        true
    }

    fn lose_context(&self) {
        info!("gpu context released");
    }
}

pub struct Panel {
    id: ContainerId,
    size: (u32, u32),
    attached: Cell<bool>,
    canvas: RefCell<Option<Rc<GpuCanvas>>>,
}

impl Panel {
    pub fn new(id: u64, width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            id: ContainerId(id),
            size: (width, height),
            attached: Cell::new(true),
            canvas: RefCell::new(Some(Rc::new(GpuCanvas))),
        })
    }

    pub fn detach(&self) {
        self.attached.set(false);
    }
}

impl Container for Panel {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn is_attached(&self) -> bool {
        self.attached.get()
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn canvases(&self) -> Vec<Rc<dyn Canvas>> {
        self.canvas.borrow().iter().map(|c| c.clone() as Rc<dyn Canvas>).collect()
    }

    fn clear_children(&self) {
        self.canvas.borrow_mut().take();
    }

    fn set_loading(&self, visible: bool) {
        info!(panel = self.id.0, visible, "loading indicator");
    }

    fn set_background(&self, background: Option<&Background>) {
        if let Some(bg) = background {
            info!(panel = self.id.0, ?bg, "background drawn");
        }
    }

    fn set_placeholder(&self, visible: bool) {
        if visible {
            info!(panel = self.id.0, "empty-data placeholder shown");
        }
    }

    fn draw_watermark(&self, text: &str) {
        info!(panel = self.id.0, %text, "watermark");
    }
}

/// Canned chart server. Every refresh bumps a revision counter so the
/// returned series visibly change between calls.
pub struct CannedServer {
    latency: Duration,
    revision: Cell<u64>,
    pub navigations: RefCell<Vec<String>>,
}

impl CannedServer {
    pub fn new(latency: Duration) -> Rc<Self> {
        Rc::new(Self { latency, revision: Cell::new(0), navigations: RefCell::new(Vec::new()) })
    }

    fn respond(&self, request: &HttpRequest) -> Result<Value> {
        let rev = self.revision.get() + 1;
        self.revision.set(rev);
        let chart_id = request.params.get("chartID").cloned().unwrap_or(Value::Null);
        let kind = if chart_id.as_str().is_some_and(|id| id.contains("B2")) { "pie" } else { "line" };
        match request.path.as_str() {
            "/chart/refresh" | "/chart/data" => Ok(json!([{
                "id": chart_id,
                "chartAttr": { "chartType": kind, "series": [{ "name": "rev", "data": [rev, rev * 2, rev * 3] }] }
            }])),
            "/chart/hyperlink" => Ok(json!([
                { "type": "chart", "target": "Cells__B2", "parameters": { "drill": rev } },
                { "type": "url", "url": "https://reports.example/detail" }
            ])),
            other => Err(HostError::Transport(format!("404 {other}"))),
        }
    }
}

impl Transport for CannedServer {
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<Value>> {
        info!(path = %request.path, method = ?request.method, "request");
        let result = self.respond(&request);
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            result
        })
    }

    fn navigate(&self, url: &str) {
        info!(%url, "navigate");
        self.navigations.borrow_mut().push(url.to_string());
    }
}
