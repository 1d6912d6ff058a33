use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters of a `view` call, in CouchDB's query vocabulary.
///
/// Both the underscored and the compact spellings of the key bounds are
/// accepted; unrecognized parameters are preserved in `extra` so that
/// pass-through requests reach the native client unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewParams {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub keys: Option<Vec<Value>>,
  #[serde(default, alias = "startkey", skip_serializing_if = "Option::is_none")]
  pub start_key: Option<Value>,
  #[serde(default, alias = "endkey", skip_serializing_if = "Option::is_none")]
  pub end_key: Option<Value>,
  #[serde(default)]
  pub descending: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skip: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub limit: Option<u64>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, Value>,
}

/// One row of a view response.
///
/// Rows answered from the sorted-set index carry `id = "#SSET"`, a
/// comma-joined string key, and optionally a `score`. Native rows keep
/// whatever the database returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRow {
  pub id: String,
  pub key: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewResponse {
  pub offset: i64,
  pub total_rows: i64,
  pub rows: Vec<ViewRow>,
}
