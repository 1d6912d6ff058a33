use serde_json::Value;

use crate::types::{ViewParams, SSET_MARKER};

/// A parsed `["$SSET", database, …idPath]` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SSetKey {
  pub database: String,
  pub id_path: Vec<String>,
}

impl SSetKey {
  /// Parse the elements of a key array. Needs the marker, a database and
  /// at least one id segment, all strings.
  pub fn from_parts(parts: &[Value]) -> Option<Self> {
    if parts.first().and_then(Value::as_str) != Some(SSET_MARKER) || parts.len() < 3 {
      return None;
    }
    let mut segments = Vec::with_capacity(parts.len() - 1);
    for part in &parts[1..] {
      segments.push(part.as_str()?.to_string());
    }
    let database = segments.remove(0);
    Some(Self {
      database,
      id_path: segments,
    })
  }

  /// The comma-joined form used as the row key in view responses,
  /// e.g. `$SSET,Users,u7`.
  pub fn joined(&self) -> String {
    let mut parts = vec![SSET_MARKER.to_string(), self.database.clone()];
    parts.extend(self.id_path.iter().cloned());
    parts.join(",")
  }
}

/// How a `view` request is answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewQuery {
  /// Point lookups: one sorted-set fetch per key, raw key arrays kept so
  /// a malformed key can be reported instead of silently dropped.
  Keys(Vec<Value>),
  /// A score range over a single sorted set.
  Range { key: SSetKey, min: f64, max: f64 },
  /// Anything else goes to the native view unchanged.
  PassThrough,
}

pub fn classify(params: &ViewParams) -> ViewQuery {
  if let Some(keys) = &params.keys {
    let first_marked = keys
      .first()
      .and_then(Value::as_array)
      .and_then(|parts| parts.first())
      .and_then(Value::as_str)
      == Some(SSET_MARKER);
    if first_marked {
      return ViewQuery::Keys(keys.clone());
    }
  }
  if let (Some(start), Some(end)) = (&params.start_key, &params.end_key) {
    if let Some(range) = classify_range(start, end) {
      return range;
    }
  }
  ViewQuery::PassThrough
}

/// A range query needs equal-length `$SSET` bounds whose last elements are
/// both numbers and whose prefixes are pairwise equal. Anything else is
/// rejected back to pass-through.
fn classify_range(start: &Value, end: &Value) -> Option<ViewQuery> {
  let start = start.as_array()?;
  let end = end.as_array()?;
  if start.len() != end.len() || start.len() < 4 {
    return None;
  }
  let (min, start_prefix) = split_bound(start)?;
  let (max, end_prefix) = split_bound(end)?;
  if start_prefix != end_prefix {
    return None;
  }
  let key = SSetKey::from_parts(start_prefix)?;
  Some(ViewQuery::Range { key, min, max })
}

fn split_bound(parts: &[Value]) -> Option<(f64, &[Value])> {
  let (last, prefix) = parts.split_last()?;
  Some((last.as_f64()?, prefix))
}
