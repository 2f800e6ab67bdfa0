// File: crates/chart-host/src/surface.rs
// Summary: Container and canvas contracts standing in for the host page's DOM nodes.

use std::rc::Rc;

use crate::attr::Background;

/// Stable identity of a container, used as the owner key for timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u64);

/// Visual container owning one chart instance. Methods take `&self`;
/// implementations manage their own interior state like DOM nodes do.
pub trait Container {
    fn id(&self) -> ContainerId;

    /// Still part of the live document tree.
    fn is_attached(&self) -> bool;

    /// Declared width/height in CSS pixels.
    fn size(&self) -> (u32, u32);

    /// Canvas-bearing descendants.
    fn canvases(&self) -> Vec<Rc<dyn Canvas>>;

    /// Drop all child content (and the listeners attached to it).
    fn clear_children(&self);

    fn set_loading(&self, visible: bool);

    /// Replace the background element; `None` removes it.
    fn set_background(&self, background: Option<&Background>);

    /// Show or hide the empty-data placeholder.
    fn set_placeholder(&self, visible: bool);

    fn draw_watermark(&self, text: &str);
}

pub trait Canvas {
    /// Whether a GPU drawing context was ever produced for this canvas.
    fn has_gpu_context(&self) -> bool;

    /// Force the GPU context to be lost, returning it to the page-wide pool.
    fn lose_context(&self);
}
