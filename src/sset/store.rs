use async_trait::async_trait;

use crate::types::{RangeOptions, RangeResponse, SSetOp};

/// Abstract sorted-set index backend.
///
/// Redis is the production realization; the in-process memory store backs
/// the test suite and single-process deployments. All Redis-specific
/// details (key shaping, hash tags, command shapes) stay behind this trait.
#[async_trait]
pub trait SSetStore: Send + Sync {
  /// Write a batch of operations.
  ///
  /// Operations sharing one `database` commit in a single transaction, in
  /// submitted order; transactions for different databases run in
  /// parallel. The call resolves only when every group has committed; any
  /// failure fails the whole call.
  async fn process(&self, ops: Vec<SSetOp>) -> Result<(), anyhow::Error>;

  /// Range lookup by rank. `min` and `max` are inclusive indices; negative
  /// values count from the end, -1 being the last element.
  async fn range_by_index(
    &self,
    database: &str,
    id_path: &[String],
    min: i64,
    max: i64,
    opts: &RangeOptions,
  ) -> Result<RangeResponse, anyhow::Error>;

  /// Range lookup by score. Both bounds are inclusive.
  async fn range_by_score(
    &self,
    database: &str,
    id_path: &[String],
    min: f64,
    max: f64,
    opts: &RangeOptions,
  ) -> Result<RangeResponse, anyhow::Error>;

  /// Delete every sorted set stored under `database`. Returns the number
  /// of deleted sets. This is the out-of-band lifecycle tool that the
  /// prefix grouping of the keyspace exists for.
  async fn flush_database(&self, database: &str) -> Result<u64, anyhow::Error>;
}

/// Hash-tag prefix shared by every sorted set of one database.
///
/// The braces make the database name a cluster hash tag, so all of its
/// sets land on the same shard and multi-key transactions stay valid.
pub fn database_tag(database: &str) -> String {
  format!("{{SSET:{}}}", database)
}

/// Backend key for one sorted set.
///
/// Id-path segments are percent-encoded so a `:` inside user ids cannot
/// alias the delimiter.
pub fn storage_key(database: &str, id_path: &[String]) -> String {
  let path: Vec<_> = id_path
    .iter()
    .map(|segment| urlencoding::encode(segment).into_owned())
    .collect();
  format!("{}/{}", database_tag(database), path.join(":"))
}

/// Batch-level validation shared by every backend: empty id-paths and
/// non-finite scores fail the whole batch before anything is applied.
pub(crate) fn validate_ops(ops: &[SSetOp]) -> Result<(), anyhow::Error> {
  for op in ops {
    if op.id_path.is_empty() {
      anyhow::bail!("operation on database '{}' has an empty id-path", op.database);
    }
    if !op.score.is_finite() {
      anyhow::bail!(
        "operation on '{}' has a non-finite score",
        storage_key(&op.database, &op.id_path)
      );
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Keep;

  #[test]
  fn storage_key_joins_segments_with_colons() {
    let key = storage_key("Users", &["ByDate".into(), "2024".into()]);
    assert_eq!(key, "{SSET:Users}/ByDate:2024");
  }

  #[test]
  fn storage_key_encodes_separators_in_segments() {
    let key = storage_key("Users", &["a:b".into(), "c/d".into()]);
    assert_eq!(key, "{SSET:Users}/a%3Ab:c%2Fd");
  }

  #[test]
  fn database_tag_is_a_hash_tag() {
    assert_eq!(database_tag("Users"), "{SSET:Users}");
  }

  #[test]
  fn validate_rejects_empty_id_path() {
    let op = SSetOp::new("db", vec![], 1.0, serde_json::json!("x"), Keep::AllValues);
    assert!(validate_ops(&[op]).is_err());
  }

  #[test]
  fn validate_rejects_non_finite_score() {
    let op = SSetOp::new(
      "db",
      vec!["k".into()],
      f64::NAN,
      serde_json::json!("x"),
      Keep::AllValues,
    );
    assert!(validate_ops(&[op]).is_err());
  }
}
