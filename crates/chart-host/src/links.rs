// File: crates/chart-host/src/links.rs
// Summary: Animation-synchronised hyperlink dispatch and server-side link resolution.

use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::attr::{ChartAttr, HyperLink, LinkTag};
use crate::chart::ChartInstance;
use crate::engine::{AnimationEvent, AnimationPhase, Capabilities, EngineHandle};
use crate::identity::IdentityTuple;
use crate::protocol::{decode_actions, LinkAction, LinkRequest};

/// Which phase hooks a chart type uses, fixed when the engine instance is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// Entry and exit animations run concurrently: one hook, whole table.
    Overlap,
    /// `exitBegin` carries increment links, `exitEnd` everything else.
    Phased,
}

impl DispatchMode {
    pub fn for_chart(animate_overlap: bool) -> Self {
        if animate_overlap { Self::Overlap } else { Self::Phased }
    }

    pub fn phases(self) -> &'static [AnimationPhase] {
        match self {
            Self::Overlap => &[AnimationPhase::ExitEnd],
            Self::Phased => &[AnimationPhase::ExitBegin, AnimationPhase::ExitEnd],
        }
    }
}

/// Links of `links` dispatched when `phase` fires under `mode`.
pub fn select_links(mode: DispatchMode, phase: AnimationPhase, links: &[HyperLink]) -> Vec<HyperLink> {
    let keep = |link: &&HyperLink| match (mode, phase) {
        (DispatchMode::Overlap, AnimationPhase::ExitEnd) => true,
        (DispatchMode::Overlap, AnimationPhase::ExitBegin) => false,
        (DispatchMode::Phased, AnimationPhase::ExitBegin) => link.tag() == Some(LinkTag::Increment),
        (DispatchMode::Phased, AnimationPhase::ExitEnd) => link.tag() != Some(LinkTag::Increment),
    };
    links.iter().filter(keep).cloned().collect()
}

/// Wire the declared auto-link table to the engine's animation hooks.
/// Returns the number of hooks registered.
pub fn attach(chart: &Weak<ChartInstance>, handle: &mut dyn EngineHandle, options: &ChartAttr) -> usize {
    let links = options.auto_links();
    if links.is_empty() || !handle.capabilities().contains(Capabilities::EVENTS) {
        return 0;
    }
    let mode = DispatchMode::for_chart(options.animate_overlap());
    let mut hooked = 0;
    for &phase in mode.phases() {
        let selected = select_links(mode, phase, &links);
        if selected.is_empty() {
            continue;
        }
        let source = chart.clone();
        let hook = Box::new(move |event: &AnimationEvent| {
            if let Some(chart) = source.upgrade() {
                dispatch(&chart, phase, selected.clone(), event.clone());
            }
        });
        match handle.on(phase, hook) {
            Ok(()) => hooked += 1,
            Err(err) => warn!(phase = phase.event_name(), %err, "could not hook animation phase"),
        }
    }
    hooked
}

/// Dispatch `links` for an animation event raised by `source`. Increment
/// links wait for the exit animation to finish before refreshing.
pub fn dispatch(
    source: &Rc<ChartInstance>,
    phase: AnimationPhase,
    links: Vec<HyperLink>,
    event: AnimationEvent,
) -> JoinHandle<usize> {
    let source = source.clone();
    tokio::task::spawn_local(async move {
        let Some(host) = source.host() else { return 0 };
        if phase == AnimationPhase::ExitBegin {
            tokio::time::sleep(host.options().increment_link_delay()).await;
        }
        let scope = scope_of(&source);
        let context = event.context();
        let mut dispatched = 0;
        for link in links {
            let mut parameters = link.parameters.clone();
            parameters.extend(context.clone());
            match &link.target {
                Some(target) => match host.resolve(target, Some(&scope)) {
                    Some(chart) => {
                        chart.refresh(parameters, true);
                        dispatched += 1;
                    }
                    None => debug!(target = %target, "animation link target not registered"),
                },
                None => {
                    source.on_interaction(parameters);
                    dispatched += 1;
                }
            }
        }
        dispatched
    })
}

/// Post `parameters` to the hyperlink endpoint and dispatch the returned
/// actions, optionally keeping only those whose tag matches `tag`.
pub fn resolve_interaction(
    source: Rc<ChartInstance>,
    parameters: Map<String, Value>,
    tag: Option<LinkTag>,
) -> JoinHandle<usize> {
    tokio::task::spawn_local(async move {
        let Some(host) = source.host() else { return 0 };
        let request = LinkRequest {
            chart_id: source.chart_id().to_string(),
            parameters,
            identity: source.id_info().identity(),
        };
        let request = match request.to_http(&host.options().endpoints.hyperlink) {
            Ok(r) => r,
            Err(err) => {
                warn!(chart = %source.chart_id(), %err, "could not encode hyperlink request");
                return 0;
            }
        };
        let body = match host.transport().send(request).await {
            Ok(body) => body,
            Err(err) => {
                warn!(chart = %source.chart_id(), %err, "hyperlink resolution failed");
                return 0;
            }
        };
        let actions = match decode_actions(body) {
            Ok(actions) => actions,
            Err(err) => {
                warn!(chart = %source.chart_id(), %err, "malformed hyperlink actions");
                return 0;
            }
        };

        let scope = scope_of(&source);
        let mut dispatched = 0;
        for action in actions {
            if let Some(wanted) = tag {
                // untagged actions count as reload-style
                if action.tag().unwrap_or(LinkTag::Reload) != wanted {
                    continue;
                }
            }
            match action {
                LinkAction::Chart { target, parameters, .. } => match host.resolve(&target, Some(&scope)) {
                    Some(chart) => {
                        chart.refresh(parameters, true);
                        dispatched += 1;
                    }
                    None => debug!(target = %target, "hyperlink target not registered"),
                },
                LinkAction::Url { url } => {
                    host.transport().navigate(&url);
                    dispatched += 1;
                }
            }
        }
        dispatched
    })
}

/// Sheet/block scope of `source`, used to disambiguate link targets.
fn scope_of(source: &ChartInstance) -> IdentityTuple {
    let info = source.id_info();
    IdentityTuple { name: None, kind: None, sheet_index: info.sheet_index, ec_name: info.ec_name.clone() }
}
