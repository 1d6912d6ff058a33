use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::store::{database_tag, storage_key, validate_ops, SSetStore};
use crate::types::{Keep, Order, Paging, RangeOptions, RangeResponse, SSetOp, SSetRow};

/// In-process `SSetStore` with the same semantics as the Redis backend.
///
/// Members are stored as their exact JSON encoding so that value equality
/// is byte-equality, matching what Redis sees on the wire.
#[derive(Default)]
pub struct MemoryStore {
  sets: Mutex<HashMap<String, HashMap<String, f64>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of elements currently held by one sorted set.
  pub fn cardinality(&self, database: &str, id_path: &[String]) -> usize {
    let key = storage_key(database, id_path);
    self.sets.lock().get(&key).map_or(0, HashMap::len)
  }
}

/// Ascending score, ties broken by byte order of the encoded value.
fn sorted_entries(set: &HashMap<String, f64>) -> Vec<(f64, String)> {
  let mut entries: Vec<_> = set.iter().map(|(m, s)| (*s, m.clone())).collect();
  entries.sort_by(|a, b| {
    a.0
      .partial_cmp(&b.0)
      .unwrap_or(Ordering::Equal)
      .then_with(|| a.1.as_bytes().cmp(b.1.as_bytes()))
  });
  entries
}

fn decode_rows(
  entries: Vec<(f64, String)>,
  include_scores: bool,
) -> Result<Vec<SSetRow>, anyhow::Error> {
  entries
    .into_iter()
    .map(|(score, member)| {
      Ok(SSetRow {
        value: serde_json::from_str(&member)?,
        score: include_scores.then_some(score),
      })
    })
    .collect()
}

/// Resolve an inclusive, possibly negative index window against `len`.
fn resolve_window(min: i64, max: i64, len: usize) -> Option<(usize, usize)> {
  let len = len as i64;
  let lo = if min < 0 { len + min } else { min }.max(0);
  let hi = if max < 0 { len + max } else { max }.min(len - 1);
  if lo > hi || lo >= len {
    return None;
  }
  Some((lo as usize, hi as usize))
}

#[async_trait]
impl SSetStore for MemoryStore {
  async fn process(&self, ops: Vec<SSetOp>) -> Result<(), anyhow::Error> {
    validate_ops(&ops)?;
    let mut sets = self.sets.lock();
    for op in ops {
      let key = storage_key(&op.database, &op.id_path);
      let member = op.value.to_string();
      let set = sets.entry(key).or_default();
      // GT discipline: never downgrade the score of an existing value.
      let current = set.get(&member);
      if current.map_or(true, |existing| op.score > *existing) {
        set.insert(member, op.score);
      }
      if op.keep == Keep::LastValue {
        // Trim all but the top-ranked element.
        if let Some((s, m)) = sorted_entries(set).pop() {
          set.retain(|member, score| *score == s && *member == m);
        }
      }
    }
    Ok(())
  }

  async fn range_by_index(
    &self,
    database: &str,
    id_path: &[String],
    min: i64,
    max: i64,
    opts: &RangeOptions,
  ) -> Result<RangeResponse, anyhow::Error> {
    let key = storage_key(database, id_path);
    let (mut entries, cardinality) = {
      let sets = self.sets.lock();
      let set = sets.get(&key);
      let cardinality = set.map_or(0, HashMap::len);
      let entries = match set.map(sorted_entries).and_then(|sorted| {
        resolve_window(min, max, cardinality).map(|(lo, hi)| sorted[lo..=hi].to_vec())
      }) {
        Some(window) => window,
        None => Vec::new(),
      };
      (entries, cardinality)
    };
    if opts.order == Order::Desc {
      entries.reverse();
    }
    if opts.paged() {
      let offset = opts.offset.unwrap_or(0) as usize;
      entries = entries
        .into_iter()
        .skip(offset)
        .take(opts.count.map_or(usize::MAX, |c| c as usize))
        .collect();
    }
    let rows = decode_rows(entries, opts.include_scores)?;
    Ok(RangeResponse {
      paging: Paging {
        offset: opts.offset.unwrap_or(0) as i64,
        count: if opts.paged() {
          opts.count.map_or(-1, |c| c as i64)
        } else {
          -1
        },
        total: if opts.include_total {
          cardinality as i64
        } else {
          -1
        },
      },
      rows,
    })
  }

  async fn range_by_score(
    &self,
    database: &str,
    id_path: &[String],
    min: f64,
    max: f64,
    opts: &RangeOptions,
  ) -> Result<RangeResponse, anyhow::Error> {
    let key = storage_key(database, id_path);
    let mut entries: Vec<(f64, String)> = {
      let sets = self.sets.lock();
      sets
        .get(&key)
        .map(sorted_entries)
        .unwrap_or_default()
        .into_iter()
        .filter(|(score, _)| *score >= min && *score <= max)
        .collect()
    };
    let matched = entries.len();
    if opts.order == Order::Desc {
      entries.reverse();
    }
    if opts.paged() {
      let offset = opts.offset.unwrap_or(0) as usize;
      entries = entries
        .into_iter()
        .skip(offset)
        .take(opts.count.map_or(usize::MAX, |c| c as usize))
        .collect();
    }
    let rows = decode_rows(entries, opts.include_scores)?;
    Ok(RangeResponse {
      paging: Paging {
        offset: opts.offset.unwrap_or(0) as i64,
        count: if opts.paged() {
          opts.count.map_or(-1, |c| c as i64)
        } else {
          -1
        },
        total: if opts.include_total { matched as i64 } else { -1 },
      },
      rows,
    })
  }

  async fn flush_database(&self, database: &str) -> Result<u64, anyhow::Error> {
    let prefix = format!("{}/", database_tag(database));
    let mut sets = self.sets.lock();
    let before = sets.len();
    sets.retain(|key, _| !key.starts_with(&prefix));
    Ok((before - sets.len()) as u64)
  }
}
