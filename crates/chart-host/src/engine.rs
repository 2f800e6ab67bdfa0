// File: crates/chart-host/src/engine.rs
// Summary: Capability contract of the wrapped rendering engine (consumed, never implemented here).

use std::rc::Rc;

use bitflags::bitflags;
use serde_json::{Map, Value};

use crate::attr::ChartAttr;
use crate::error::{HostError, Result};
use crate::surface::Container;

bitflags! {
    /// Optional members an engine handle implements. Call sites check these
    /// before invoking the matching method.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const RESIZE = 1 << 0;
        const CLEAR = 1 << 1;
        const REMOVE = 1 << 2;
        const DISPOSE = 1 << 3;
        const EVENTS = 1 << 4;
        const SET_DATA = 1 << 5;
    }
}

/// Animation phases the engine reports around data-changing transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimationPhase {
    ExitBegin,
    ExitEnd,
}

impl AnimationPhase {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::ExitBegin => "exitBegin",
            Self::ExitEnd => "exitEnd",
        }
    }
}

/// Payload delivered with an animation phase: the point/series under transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationEvent {
    pub point: Option<Value>,
    pub series_name: Option<String>,
}

impl AnimationEvent {
    /// Context merged into link parameters when the event triggers a refresh.
    pub fn context(&self) -> Map<String, Value> {
        let mut ctx = Map::new();
        if let Some(point) = &self.point {
            ctx.insert("point".to_string(), point.clone());
        }
        if let Some(name) = &self.series_name {
            ctx.insert("seriesName".to_string(), Value::String(name.clone()));
        }
        ctx
    }
}

pub type AnimationHandler = Box<dyn FnMut(&AnimationEvent)>;

/// Live engine instance bound to one container.
pub trait EngineHandle {
    fn capabilities(&self) -> Capabilities;

    fn set_options(&mut self, options: &ChartAttr) -> Result<()>;

    fn resize(&mut self) -> Result<()> {
        Err(HostError::Unsupported("resize"))
    }

    fn clear(&mut self) -> Result<()> {
        Err(HostError::Unsupported("clear"))
    }

    fn remove(&mut self) -> Result<()> {
        Err(HostError::Unsupported("remove"))
    }

    fn dispose(&mut self) -> Result<()> {
        Err(HostError::Unsupported("dispose"))
    }

    fn on(&mut self, _phase: AnimationPhase, _handler: AnimationHandler) -> Result<()> {
        Err(HostError::Unsupported("on"))
    }

    /// Patch series data in place; `slot` scopes the patch to one carousel chart.
    fn set_data(&mut self, _options: &ChartAttr, _slot: Option<usize>) -> Result<()> {
        Err(HostError::Unsupported("setData"))
    }
}

/// Engine entry point.
pub trait RenderEngine {
    fn init(&self, container: &Rc<dyn Container>, options: &ChartAttr) -> Result<Box<dyn EngineHandle>>;

    /// Drop any engine-level instance cache; called on host disposal only.
    fn purge_cache(&self) {}
}
