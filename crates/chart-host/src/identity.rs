// File: crates/chart-host/src/identity.rs
// Summary: Composite chart id codec and identity-tuple matching used for registry lookups.

use serde::{Deserialize, Serialize};

/// Separator between a logical id and its slot index.
pub const INDEX_MARKER: &str = "__index__";
/// Namespace prefix carried by legacy payload shapes.
pub const NAMESPACE_PREFIX: &str = "Chart__";

const TOKEN_SEPARATOR: &str = "__";

/// `<logicalId>` plus an optional slot parsed from `[Chart__]<logicalId>[__index__<slot>]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub logical_id: String,
    /// `None` when the id carries no (or an empty) slot suffix.
    pub slot: Option<usize>,
}

impl CompositeId {
    pub fn parse(raw: &str) -> Self {
        parse_composite_id(raw)
    }

    /// Slot used for storage and lookup; unspecified slots default to 0.
    pub fn slot_or_default(&self) -> usize {
        self.slot.unwrap_or(0)
    }
}

/// Split a raw chart id into logical id and slot. Never fails: malformed input
/// comes back whole as the logical id with no slot.
pub fn parse_composite_id(raw: &str) -> CompositeId {
    let malformed = || CompositeId { logical_id: raw.to_string(), slot: None };
    let body = raw.strip_prefix(NAMESPACE_PREFIX).unwrap_or(raw);
    if body.is_empty() {
        return malformed();
    }
    let Some((logical, slot)) = body.rsplit_once(INDEX_MARKER) else {
        return CompositeId { logical_id: body.to_string(), slot: None };
    };
    if logical.is_empty() {
        return malformed();
    }
    if slot.is_empty() {
        return CompositeId { logical_id: logical.to_string(), slot: None };
    }
    match slot.parse::<usize>() {
        Ok(n) => CompositeId { logical_id: logical.to_string(), slot: Some(n) },
        Err(_) => malformed(),
    }
}

/// Inverse of [`parse_composite_id`] for a concrete slot.
pub fn build_composite_id(logical_id: &str, slot: usize) -> String {
    format!("{NAMESPACE_PREFIX}{logical_id}{INDEX_MARKER}{slot}")
}

/// True when `logical_id` appears in `key` as a whole run of `__`-separated tokens,
/// so `A1` matches `Cells__A1` but not `Cells__A10`.
pub fn contains_token(key: &str, logical_id: &str) -> bool {
    if logical_id.is_empty() {
        return false;
    }
    if key == logical_id {
        return true;
    }
    let hay: Vec<&str> = key.split(TOKEN_SEPARATOR).collect();
    let needle: Vec<&str> = logical_id.split(TOKEN_SEPARATOR).collect();
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Where a chart was declared in the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartOrigin {
    Cell,
    Float,
    ChartEditor,
    FormBlock,
}

/// Lookup filter; `None` fields are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTuple {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChartOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec_name: Option<String>,
}

impl IdentityTuple {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_kind(mut self, kind: ChartOrigin) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_sheet(mut self, sheet_index: u32) -> Self {
        self.sheet_index = Some(sheet_index);
        self
    }

    pub fn with_ec_name(mut self, ec_name: impl Into<String>) -> Self {
        self.ec_name = Some(ec_name.into());
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.name.is_none() && self.kind.is_none() && self.sheet_index.is_none() && self.ec_name.is_none()
    }
}

/// Identity carried by a live chart instance, used for hyperlink correlation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdInfo {
    /// Raw id as delivered by the server payload.
    pub chart_id: String,
    pub logical_id: String,
    pub slot: usize,
    pub name: String,
    pub kind: Option<ChartOrigin>,
    pub sheet_index: Option<u32>,
    pub ec_name: Option<String>,
}

impl IdInfo {
    /// Build from a raw chart id and the declared identity; the name falls back to the logical id.
    pub fn new(chart_id: &str, identity: &IdentityTuple) -> Self {
        let parsed = parse_composite_id(chart_id);
        Self {
            chart_id: chart_id.to_string(),
            name: identity.name.clone().unwrap_or_else(|| parsed.logical_id.clone()),
            slot: parsed.slot_or_default(),
            logical_id: parsed.logical_id,
            kind: identity.kind,
            sheet_index: identity.sheet_index,
            ec_name: identity.ec_name.clone(),
        }
    }

    pub fn identity(&self) -> IdentityTuple {
        IdentityTuple {
            name: Some(self.name.clone()),
            kind: self.kind,
            sheet_index: self.sheet_index,
            ec_name: self.ec_name.clone(),
        }
    }
}

/// Every defined field of `query` must equal the candidate's; names compare case-insensitively.
pub fn matches_identity(candidate: &IdInfo, query: &IdentityTuple) -> bool {
    if let Some(name) = &query.name {
        if !candidate.name.eq_ignore_ascii_case(name) {
            return false;
        }
    }
    if query.kind.is_some() && query.kind != candidate.kind {
        return false;
    }
    if query.sheet_index.is_some() && query.sheet_index != candidate.sheet_index {
        return false;
    }
    if query.ec_name.is_some() && query.ec_name != candidate.ec_name {
        return false;
    }
    true
}
