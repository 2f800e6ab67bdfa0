// File: crates/chart-host/src/attr.rs
// Summary: Typed accessors over the opaque chart option payload (series, timers, background, links).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option payload handed to the rendering engine. Opaque except for the
/// handful of fields the lifecycle layer reads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartAttr(Value);

impl ChartAttr {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn series(&self) -> &[Value] {
        self.0
            .get("series")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// False when the payload reports zero renderable series.
    pub fn has_series(&self) -> bool {
        !self.series().is_empty()
    }

    pub fn watermark(&self) -> Option<&str> {
        self.0.get("watermark").and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn refresh_intervals(&self) -> Option<RefreshIntervals> {
        RefreshIntervals::from_value(self.0.get("autoRefreshTime")?)
    }

    pub fn background(&self) -> Option<Background> {
        let raw = self.0.get("background")?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Declared hyperlink table dispatched on animation phases; malformed entries are skipped.
    pub fn auto_links(&self) -> Vec<HyperLink> {
        let Some(items) = self.0.get("autoLinks").and_then(Value::as_array) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect()
    }

    pub fn animate_overlap(&self) -> bool {
        self.0.get("animateOverlap").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn chart_type(&self) -> Option<&str> {
        self.0.get("chartType").and_then(Value::as_str)
    }

    /// Whether moving from `previous` to `self` needs a full engine teardown
    /// rather than an in-place `set_options`.
    pub fn requires_rebuild_from(&self, previous: &ChartAttr) -> bool {
        let forced = self.0.get("rebuild").and_then(Value::as_bool).unwrap_or(false);
        // animation hooks are wired once per engine instance
        let links_changed = self.0.get("autoLinks") != previous.0.get("autoLinks")
            || self.animate_overlap() != previous.animate_overlap();
        forced
            || links_changed
            || self.chart_type() != previous.chart_type()
            || self.background() != previous.background()
    }

    /// Replace series data, scoped to one carousel slot when the payload
    /// carries a `charts` array with that index.
    pub fn merge_series(&mut self, slot: Option<usize>, series: Value) {
        if let Some(slot) = slot {
            if let Some(chart) = self
                .0
                .get_mut("charts")
                .and_then(Value::as_array_mut)
                .and_then(|charts| charts.get_mut(slot))
                .and_then(Value::as_object_mut)
            {
                chart.insert("series".to_string(), series);
                return;
            }
        }
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert("series".to_string(), series);
        }
    }
}

impl From<Value> for ChartAttr {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Auto-refresh cadence: one interval, or one per carousel slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshIntervals {
    Single(Duration),
    PerSlot(Vec<(usize, Duration)>),
}

impl RefreshIntervals {
    /// Seconds as a number or an array of numbers; non-positive entries disable that slot.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let secs = |v: &Value| {
            v.as_f64()
                .filter(|s| *s > 0.0)
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .filter(|d| !d.is_zero())
        };
        match raw {
            Value::Array(items) => {
                let slots: Vec<(usize, Duration)> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| secs(v).map(|d| (i, d)))
                    .collect();
                if slots.is_empty() { None } else { Some(Self::PerSlot(slots)) }
            }
            other => secs(other).map(Self::Single),
        }
    }

    /// Number of recurring timers this cadence needs.
    pub fn timer_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::PerSlot(slots) => slots.len(),
        }
    }
}

/// Background fill rendered behind a background-aware chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Background {
    Color { value: String },
    Gradient {
        from: String,
        to: String,
        #[serde(default)]
        angle: f32,
    },
    Image {
        url: String,
        #[serde(default)]
        layout: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkTag {
    Increment,
    Reload,
}

/// One entry of the declared auto-link table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperLink {
    /// Chart id the link refreshes; links without a target go through server resolution.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub refresh_type: Option<LinkTag>,
    /// Legacy free-text script form.
    #[serde(default)]
    pub script: Option<String>,
}

impl HyperLink {
    /// Structured tag first, then a substring probe of the legacy script.
    pub fn tag(&self) -> Option<LinkTag> {
        if self.refresh_type.is_some() {
            return self.refresh_type;
        }
        let script = self.script.as_deref()?.to_ascii_lowercase();
        if script.contains("increment") {
            Some(LinkTag::Increment)
        } else if script.contains("reload") {
            Some(LinkTag::Reload)
        } else {
            None
        }
    }
}
