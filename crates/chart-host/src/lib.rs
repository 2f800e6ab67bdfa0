// File: crates/chart-host/src/lib.rs
// Summary: Library entry point; exports the chart lifecycle, registry and refresh-coordination API.

pub mod attr;
pub mod autorefresh;
pub mod carousel;
pub mod chart;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod identity;
pub mod links;
pub mod protocol;
pub mod reclaim;
pub mod refresh;
pub mod registry;
pub mod surface;
pub mod timers;

pub use attr::{Background, ChartAttr, HyperLink, LinkTag, RefreshIntervals};
pub use carousel::Carousel;
pub use chart::{ChartInstance, ChartKind, ChartSpec, ChartState};
pub use config::{Endpoints, HostOptions};
pub use engine::{AnimationEvent, AnimationHandler, AnimationPhase, Capabilities, EngineHandle, RenderEngine};
pub use error::{HostError, Result};
pub use host::ChartHost;
pub use identity::{parse_composite_id, ChartOrigin, CompositeId, IdInfo, IdentityTuple};
pub use protocol::{HttpRequest, Method, Transport};
pub use reclaim::{reclaim, ReclaimReport};
pub use refresh::{RefreshOutcome, RefreshParams, RequestGate, RequestTicket};
pub use registry::{ChartSet, Registry, RegistryMember, Widget};
pub use surface::{Canvas, Container, ContainerId};
pub use timers::{TimerBook, TimerKind};
