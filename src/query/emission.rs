use anyhow::anyhow;
use serde_json::Value;

use crate::types::{Keep, SSetOp, SSET_MARKER};

/// Normalize an emitted key the way `emit` promises: null stays null,
/// string and number keys become one-element arrays, anything array-like
/// is taken as-is.
pub fn normalize_key(key: Value) -> Value {
  match key {
    Value::Null => Value::Null,
    Value::String(_) | Value::Number(_) => Value::Array(vec![key]),
    other => other,
  }
}

/// Inspect one emission and extract the sorted-set operation it encodes,
/// or `None` when it is a normal view emission.
///
/// The canonical diverted shape is `["$SSET", database, id0, …]` paired
/// with `{score, value, keep?}`; anything that misses it passes through
/// unchanged. The one exception: a marked, op-shaped emission carrying an
/// unrecognized `keep` is an error, because passing it through silently
/// would hide index corruption from the operator.
pub fn divert(key: &Value, value: &Value) -> Result<Option<SSetOp>, anyhow::Error> {
  let Some(parts) = key.as_array() else {
    return Ok(None);
  };
  if parts.first().and_then(Value::as_str) != Some(SSET_MARKER) {
    return Ok(None);
  }
  // Marker, database, and at least one id segment.
  if parts.len() < 3 {
    return Ok(None);
  }
  let mut segments = Vec::with_capacity(parts.len() - 1);
  for part in &parts[1..] {
    match part.as_str() {
      Some(segment) => segments.push(segment.to_string()),
      None => return Ok(None),
    }
  }
  let Some(fields) = value.as_object() else {
    return Ok(None);
  };
  let Some(score) = fields.get("score").and_then(Value::as_f64) else {
    return Ok(None);
  };
  let Some(stored) = fields.get("value") else {
    return Ok(None);
  };
  let keep = match fields.get("keep") {
    None | Some(Value::Null) => Keep::AllValues,
    Some(raw) => serde_json::from_value(raw.clone())
      .map_err(|_| anyhow!("unrecognized keep discipline: {raw}"))?,
  };
  let database = segments.remove(0);
  Ok(Some(SSetOp {
    database,
    id_path: segments,
    score,
    value: stored.clone(),
    keep,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn normalize_wraps_scalars() {
    assert_eq!(normalize_key(json!("a")), json!(["a"]));
    assert_eq!(normalize_key(json!(42)), json!([42]));
    assert_eq!(normalize_key(Value::Null), Value::Null);
    assert_eq!(normalize_key(json!(["a", 1])), json!(["a", 1]));
  }

  #[test]
  fn canonical_emission_is_diverted() {
    let op = divert(
      &json!(["$SSET", "Users", "u7"]),
      &json!({"score": 5, "value": {"n": "x"}, "keep": "LAST_VALUE"}),
    )
    .unwrap()
    .unwrap();
    assert_eq!(op.database, "Users");
    assert_eq!(op.id_path, vec!["u7"]);
    assert_eq!(op.score, 5.0);
    assert_eq!(op.keep, Keep::LastValue);
  }

  #[test]
  fn keep_defaults_to_all_values() {
    let op = divert(
      &json!(["$SSET", "Users", "ByDate"]),
      &json!({"score": 1, "value": "a"}),
    )
    .unwrap()
    .unwrap();
    assert_eq!(op.keep, Keep::AllValues);
  }

  #[test]
  fn unmarked_keys_pass_through() {
    assert!(divert(&json!(["NOTSSET", "x"]), &json!({"score": 1}))
      .unwrap()
      .is_none());
    assert!(divert(&json!("plain"), &json!(1)).unwrap().is_none());
  }

  #[test]
  fn short_or_nonstring_marked_keys_pass_through() {
    // Marker plus database only: no id segment.
    assert!(
      divert(&json!(["$SSET", "Users"]), &json!({"score": 1, "value": 1}))
        .unwrap()
        .is_none()
    );
    assert!(
      divert(&json!(["$SSET", "Users", 42]), &json!({"score": 1, "value": 1}))
        .unwrap()
        .is_none()
    );
  }

  #[test]
  fn non_op_shaped_values_pass_through() {
    assert!(divert(&json!(["$SSET", "Users", "u7"]), &json!({"n": 1}))
      .unwrap()
      .is_none());
    assert!(
      divert(&json!(["$SSET", "Users", "u7"]), &json!({"score": "high", "value": 1}))
        .unwrap()
        .is_none()
    );
  }

  #[test]
  fn unrecognized_keep_is_an_error() {
    let result = divert(
      &json!(["$SSET", "Users", "u7"]),
      &json!({"score": 1, "value": 1, "keep": "SOME_VALUES"}),
    );
    assert!(result.is_err());
  }

  #[test]
  fn deep_id_paths_are_preserved() {
    let op = divert(
      &json!(["$SSET", "Index", "a", "b", "c"]),
      &json!({"score": 2.5, "value": null}),
    )
    .unwrap()
    .unwrap();
    assert_eq!(op.id_path, vec!["a", "b", "c"]);
    assert_eq!(op.value, Value::Null);
  }
}
