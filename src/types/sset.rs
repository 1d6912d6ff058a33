use serde::{Deserialize, Serialize};
use serde_json::Value;

/// First element of a key array identifying a diverted emission or query.
pub const SSET_MARKER: &str = "$SSET";

/// Retention discipline for a sorted-set write.
///
/// `AllValues` keeps one entry per distinct encoded value, each at the
/// largest score ever submitted for it. `LastValue` keeps a single entry,
/// the one carrying the globally largest submitted score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
  #[default]
  #[serde(rename = "ALL_VALUES")]
  AllValues,
  #[serde(rename = "LAST_VALUE")]
  LastValue,
}

/// A single write intent against one sorted set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SSetOp {
  pub database: String,
  pub id_path: Vec<String>,
  pub score: f64,
  pub value: Value,
  #[serde(default)]
  pub keep: Keep,
}

impl SSetOp {
  pub fn new(
    database: impl Into<String>,
    id_path: Vec<String>,
    score: f64,
    value: Value,
    keep: Keep,
  ) -> Self {
    Self {
      database: database.into(),
      id_path,
      score,
      value,
      keep,
    }
  }
}

/// Row ordering for range queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
  #[default]
  Asc,
  Desc,
}

/// Paging and shaping options shared by both range operations.
///
/// Index bounds and score bounds are passed separately to `range_by_index`
/// and `range_by_score`; everything else lives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeOptions {
  #[serde(default)]
  pub offset: Option<u64>,
  #[serde(default)]
  pub count: Option<u64>,
  #[serde(default)]
  pub order: Order,
  #[serde(default)]
  pub include_total: bool,
  #[serde(default)]
  pub include_scores: bool,
}

impl RangeOptions {
  /// True when the caller asked for any paging at all.
  pub fn paged(&self) -> bool {
    self.offset.is_some() || self.count.is_some()
  }
}

/// Paging echo attached to every range response.
///
/// `total` is -1 when it was not computed; `count` is -1 when no paging
/// was requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Paging {
  pub offset: i64,
  pub count: i64,
  pub total: i64,
}

/// One element of a range response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SSetRow {
  pub value: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeResponse {
  pub paging: Paging,
  pub rows: Vec<SSetRow>,
}
