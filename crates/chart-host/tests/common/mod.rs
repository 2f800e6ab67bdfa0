// File: crates/chart-host/tests/common/mod.rs
// Purpose: In-memory engine, container and transport fakes shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chart_host::attr::Background;
use chart_host::engine::{AnimationEvent, AnimationHandler, AnimationPhase, Capabilities, EngineHandle, RenderEngine};
use chart_host::protocol::{HttpRequest, Transport};
use chart_host::surface::{Canvas, Container, ContainerId};
use chart_host::{ChartAttr, ChartHost, HostError, HostOptions, Result};
use futures::future::LocalBoxFuture;
use serde_json::{json, Value};
use tokio::task::LocalSet;

static NEXT_CONTAINER: AtomicU64 = AtomicU64::new(1);

/// Run `fut` on a fresh `LocalSet` so `spawn_local` is available.
pub async fn local<F: Future>(fut: F) -> F::Output {
    LocalSet::new().run_until(fut).await
}

pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ---- engine -----------------------------------------------------------------

#[derive(Default)]
pub struct EngineLog {
    pub inits: Cell<usize>,
    pub set_options: Cell<usize>,
    pub set_data: RefCell<Vec<Option<usize>>>,
    pub resizes: Cell<usize>,
    pub clears: Cell<usize>,
    pub disposals: Cell<usize>,
    pub purged: Cell<usize>,
    pub last_options: RefCell<Option<ChartAttr>>,
    live: RefCell<HashSet<u64>>,
    handlers: RefCell<Vec<(u64, AnimationPhase, AnimationHandler)>>,
    next_handle: Cell<u64>,
}

impl EngineLog {
    pub fn live_handles(&self) -> usize {
        self.live.borrow().len()
    }

    /// Fire `phase` on every live handle that hooked it.
    pub fn fire(&self, phase: AnimationPhase, event: &AnimationEvent) -> usize {
        let live = self.live.borrow().clone();
        let mut fired = 0;
        for (handle, hooked, handler) in self.handlers.borrow_mut().iter_mut() {
            if *hooked == phase && live.contains(&*handle) {
                handler(event);
                fired += 1;
            }
        }
        fired
    }

    pub fn hooks(&self) -> Vec<AnimationPhase> {
        self.handlers.borrow().iter().map(|(_, p, _)| *p).collect()
    }
}

pub struct FakeEngine {
    pub log: Rc<EngineLog>,
    pub caps: Capabilities,
    pub fail_init: Cell<bool>,
}

impl FakeEngine {
    pub fn new(caps: Capabilities) -> Rc<Self> {
        Rc::new(Self { log: Rc::new(EngineLog::default()), caps, fail_init: Cell::new(false) })
    }

    pub fn full() -> Rc<Self> {
        Self::new(Capabilities::all())
    }
}

impl RenderEngine for FakeEngine {
    fn init(&self, _container: &Rc<dyn Container>, options: &ChartAttr) -> Result<Box<dyn EngineHandle>> {
        if self.fail_init.get() {
            return Err(HostError::Engine("init refused".into()));
        }
        let id = self.log.next_handle.get() + 1;
        self.log.next_handle.set(id);
        self.log.inits.set(self.log.inits.get() + 1);
        self.log.live.borrow_mut().insert(id);
        *self.log.last_options.borrow_mut() = Some(options.clone());
        Ok(Box::new(FakeHandle { id, log: self.log.clone(), caps: self.caps }))
    }

    fn purge_cache(&self) {
        self.log.purged.set(self.log.purged.get() + 1);
    }
}

struct FakeHandle {
    id: u64,
    log: Rc<EngineLog>,
    caps: Capabilities,
}

impl EngineHandle for FakeHandle {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn set_options(&mut self, options: &ChartAttr) -> Result<()> {
        self.log.set_options.set(self.log.set_options.get() + 1);
        *self.log.last_options.borrow_mut() = Some(options.clone());
        Ok(())
    }

    fn resize(&mut self) -> Result<()> {
        self.log.resizes.set(self.log.resizes.get() + 1);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.log.clears.set(self.log.clears.get() + 1);
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        Err(HostError::Engine("remove blew up".into()))
    }

    fn dispose(&mut self) -> Result<()> {
        self.log.disposals.set(self.log.disposals.get() + 1);
        self.log.live.borrow_mut().remove(&self.id);
        Ok(())
    }

    fn on(&mut self, phase: AnimationPhase, handler: AnimationHandler) -> Result<()> {
        self.log.handlers.borrow_mut().push((self.id, phase, handler));
        Ok(())
    }

    fn set_data(&mut self, options: &ChartAttr, slot: Option<usize>) -> Result<()> {
        self.log.set_data.borrow_mut().push(slot);
        *self.log.last_options.borrow_mut() = Some(options.clone());
        Ok(())
    }
}

// ---- container --------------------------------------------------------------

pub struct FakeCanvas {
    pub gpu: bool,
    pub lose_calls: Cell<usize>,
}

impl Canvas for FakeCanvas {
    fn has_gpu_context(&self) -> bool {
        self.gpu
    }

    fn lose_context(&self) {
        self.lose_calls.set(self.lose_calls.get() + 1);
    }
}

pub struct FakeContainer {
    id: ContainerId,
    attached: Cell<bool>,
    size: Cell<(u32, u32)>,
    canvases: RefCell<Vec<Rc<FakeCanvas>>>,
    pub cleared: Cell<usize>,
    pub loading: Cell<bool>,
    pub loading_shown: Cell<usize>,
    pub background: RefCell<Option<Background>>,
    /// Set when a background was drawn over one that was never removed.
    pub stacked_background: Cell<bool>,
    pub placeholder: Cell<bool>,
    pub watermarks: Cell<usize>,
}

impl FakeContainer {
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            id: ContainerId(NEXT_CONTAINER.fetch_add(1, Ordering::Relaxed)),
            attached: Cell::new(true),
            size: Cell::new((width, height)),
            canvases: RefCell::new(Vec::new()),
            cleared: Cell::new(0),
            loading: Cell::new(false),
            loading_shown: Cell::new(0),
            background: RefCell::new(None),
            stacked_background: Cell::new(false),
            placeholder: Cell::new(false),
            watermarks: Cell::new(0),
        })
    }

    pub fn add_canvas(&self, gpu: bool) -> Rc<FakeCanvas> {
        let canvas = Rc::new(FakeCanvas { gpu, lose_calls: Cell::new(0) });
        self.canvases.borrow_mut().push(canvas.clone());
        canvas
    }

    pub fn canvas_count(&self) -> usize {
        self.canvases.borrow().len()
    }

    pub fn detach(&self) {
        self.attached.set(false);
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }
}

impl Container for FakeContainer {
    fn id(&self) -> ContainerId {
        self.id
    }

    fn is_attached(&self) -> bool {
        self.attached.get()
    }

    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn canvases(&self) -> Vec<Rc<dyn Canvas>> {
        self.canvases.borrow().iter().map(|c| c.clone() as Rc<dyn Canvas>).collect()
    }

    fn clear_children(&self) {
        self.canvases.borrow_mut().clear();
        self.cleared.set(self.cleared.get() + 1);
    }

    fn set_loading(&self, visible: bool) {
        if visible {
            self.loading_shown.set(self.loading_shown.get() + 1);
        }
        self.loading.set(visible);
    }

    fn set_background(&self, background: Option<&Background>) {
        let mut current = self.background.borrow_mut();
        if background.is_some() && current.is_some() {
            self.stacked_background.set(true);
        }
        *current = background.cloned();
    }

    fn set_placeholder(&self, visible: bool) {
        self.placeholder.set(visible);
    }

    fn draw_watermark(&self, _text: &str) {
        self.watermarks.set(self.watermarks.get() + 1);
    }
}

// ---- transport --------------------------------------------------------------

type Responder = Box<dyn FnMut(&HttpRequest) -> (Duration, Result<Value>)>;

pub struct FakeTransport {
    pub requests: RefCell<Vec<HttpRequest>>,
    pub navigations: RefCell<Vec<String>>,
    responder: RefCell<Responder>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Rc<Self>
    where
        F: FnMut(&HttpRequest) -> (Duration, Result<Value>) + 'static,
    {
        Rc::new(Self {
            requests: RefCell::new(Vec::new()),
            navigations: RefCell::new(Vec::new()),
            responder: RefCell::new(Box::new(responder)),
        })
    }

    /// Echo server: answers every request after `latency_ms` with an entry for
    /// the requested chart whose `chartAttr` is `attr` plus the sent parameters.
    pub fn echo(latency_ms: u64, attr: Value) -> Rc<Self> {
        Self::new(move |req| (Duration::from_millis(latency_ms), Ok(echo_body(req, &attr))))
    }

    pub fn sent_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests.borrow().iter().filter(|r| r.path == path).cloned().collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.sent_to(path).len()
    }
}

/// `[{id: <chartID>, chartAttr: attr + {echo: __parameters__}}]`
pub fn echo_body(req: &HttpRequest, attr: &Value) -> Value {
    let id = req.params.get("chartID").cloned().unwrap_or(Value::Null);
    let mut chart_attr = attr.clone();
    if let (Some(obj), Some(params)) = (chart_attr.as_object_mut(), req.params.get("__parameters__")) {
        obj.insert("echo".to_string(), params.clone());
    }
    json!([{ "id": id, "chartAttr": chart_attr }])
}

impl Transport for FakeTransport {
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<Value>> {
        self.requests.borrow_mut().push(request.clone());
        let (delay, result) = (&mut *self.responder.borrow_mut())(&request);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            result
        })
    }

    fn navigate(&self, url: &str) {
        self.navigations.borrow_mut().push(url.to_string());
    }
}

// ---- host -------------------------------------------------------------------

pub fn host(engine: &Rc<FakeEngine>, transport: &Rc<FakeTransport>) -> Rc<ChartHost> {
    host_with(HostOptions::default(), engine, transport)
}

pub fn host_with(options: HostOptions, engine: &Rc<FakeEngine>, transport: &Rc<FakeTransport>) -> Rc<ChartHost> {
    ChartHost::new(options, engine.clone(), transport.clone())
}

pub fn line_attr() -> ChartAttr {
    ChartAttr::new(json!({ "chartType": "line", "series": [{ "name": "s1", "data": [1, 2, 3] }] }))
}
