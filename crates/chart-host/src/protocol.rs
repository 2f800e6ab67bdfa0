// File: crates/chart-host/src/protocol.rs
// Summary: Transport contract plus request/response shapes for the chart server endpoints.

use futures::future::LocalBoxFuture;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attr::{ChartAttr, LinkTag};
use crate::error::Result;
use crate::identity::{parse_composite_id, IdentityTuple};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request handed to the transport; `params` is the JSON body for POST and
/// the query parameters for GET.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub params: Value,
}

/// HTTP client used to reach the chart server. Completion is delivered on the
/// local event loop; there is no cancellation of an issued request.
pub trait Transport {
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<Value>>;

    /// Navigate the page (used by export and URL hyperlinks).
    fn navigate(&self, url: &str);
}

/// Full refresh body.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(rename = "chartID")]
    pub chart_id: String,
    pub chart_width: u32,
    pub chart_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec_name: Option<String>,
    #[serde(rename = "__parameters__")]
    pub parameters: Map<String, Value>,
}

impl RefreshRequest {
    pub fn to_http(&self, path: &str) -> Result<HttpRequest> {
        Ok(HttpRequest { method: Method::Post, path: path.to_string(), params: serde_json::to_value(self)? })
    }
}

/// Data-only auto-refresh query.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    #[serde(rename = "chartID")]
    pub chart_id: String,
    pub chart_width: u32,
    pub chart_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl DataRequest {
    pub fn to_http(&self, path: &str) -> Result<HttpRequest> {
        Ok(HttpRequest { method: Method::Get, path: path.to_string(), params: serde_json::to_value(self)? })
    }
}

/// Hyperlink resolution body: declared link parameters plus the identity tuple.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkRequest {
    #[serde(rename = "chartID")]
    pub chart_id: String,
    pub parameters: Map<String, Value>,
    #[serde(flatten)]
    pub identity: IdentityTuple,
}

impl LinkRequest {
    pub fn to_http(&self, path: &str) -> Result<HttpRequest> {
        Ok(HttpRequest { method: Method::Post, path: path.to_string(), params: serde_json::to_value(self)? })
    }
}

/// One `{id, chartAttr}` entry of a refresh or data response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChartEntry {
    pub id: String,
    #[serde(rename = "chartAttr")]
    pub chart_attr: ChartAttr,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntriesBody {
    Many(Vec<ChartEntry>),
    Wrapped { charts: Vec<ChartEntry> },
    One(ChartEntry),
}

/// Accepts a bare array, a `{charts: [...]}` wrapper, or a single entry.
pub fn decode_entries(body: Value) -> Result<Vec<ChartEntry>> {
    Ok(match serde_json::from_value(body)? {
        EntriesBody::Many(entries) | EntriesBody::Wrapped { charts: entries } => entries,
        EntriesBody::One(entry) => vec![entry],
    })
}

/// Entry addressed to `chart_id`: exact id, then same logical id, then the first one.
pub fn pick_entry(entries: Vec<ChartEntry>, chart_id: &str) -> Option<ChartEntry> {
    let logical = parse_composite_id(chart_id).logical_id;
    let exact = entries.iter().position(|e| e.id == chart_id);
    let same_logical = || entries.iter().position(|e| parse_composite_id(&e.id).logical_id == logical);
    let idx = exact.or_else(same_logical).unwrap_or(0);
    entries.into_iter().nth(idx)
}

/// Server-resolved hyperlink action.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinkAction {
    Chart {
        target: String,
        #[serde(default)]
        parameters: Map<String, Value>,
        #[serde(default, rename = "refreshType")]
        refresh_type: Option<LinkTag>,
    },
    Url { url: String },
}

impl LinkAction {
    pub fn tag(&self) -> Option<LinkTag> {
        match self {
            Self::Chart { refresh_type, .. } => *refresh_type,
            Self::Url { .. } => None,
        }
    }
}

pub fn decode_actions(body: Value) -> Result<Vec<LinkAction>> {
    Ok(serde_json::from_value(body)?)
}

/// Export-to-image query.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportQuery<'a> {
    pub session_id: &'a str,
    pub width: u32,
    pub height: u32,
    pub index: usize,
    pub chart_id: &'a str,
    pub sheet_index: Option<u32>,
    pub ec_name: Option<&'a str>,
}

/// Navigation URL for an image export.
pub fn export_url(path: &str, q: &ExportQuery<'_>) -> String {
    let sheet = q.sheet_index.map(|s| s.to_string()).unwrap_or_default();
    format!(
        "{path}?sessionID={}&width={}&height={}&index={}&chartID={}&sheetIndex={}&ecName={}",
        encode_component(q.session_id),
        q.width,
        q.height,
        q.index,
        encode_component(q.chart_id),
        sheet,
        encode_component(q.ec_name.unwrap_or_default()),
    )
}

/// Query component escaping; unreserved marks stay literal.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}
