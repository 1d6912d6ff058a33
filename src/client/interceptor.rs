use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::classify::{classify, SSetKey, ViewQuery};
use crate::sset::SSetStore;
use crate::types::{Order, RangeOptions, ViewParams, ViewResponse, ViewRow};

/// The seam to the native database client. The interceptor wraps any
/// implementation and preserves its return and error semantics on
/// pass-through.
#[async_trait]
pub trait ViewDatabase: Send + Sync {
  async fn view(
    &self,
    ddoc: &str,
    view: &str,
    params: &ViewParams,
  ) -> Result<ViewResponse, anyhow::Error>;
}

/// Sorted-set failure surfaced to the application as a 500-class view
/// error. The source error chain is preserved.
#[derive(Debug, Error)]
#[error("{name} ({status}): {reason}")]
pub struct SuperCouchError {
  pub status: u16,
  pub name: &'static str,
  pub reason: &'static str,
  #[source]
  pub source: anyhow::Error,
}

impl SuperCouchError {
  fn keys_query(source: anyhow::Error) -> Self {
    Self {
      status: 500,
      name: "supercouch_error",
      reason: "keys_query_failed",
      source,
    }
  }

  fn range_query(source: anyhow::Error) -> Self {
    Self {
      status: 500,
      name: "supercouch_error",
      reason: "range_query_failed",
      source,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct InterceptorOptions {
  pub include_scores: bool,
  pub include_total_rows: bool,
}

impl Default for InterceptorOptions {
  fn default() -> Self {
    Self {
      include_scores: true,
      include_total_rows: true,
    }
  }
}

/// Wraps a native database handle; `view` calls targeting the `$SSET`
/// marker are answered from the sorted-set service, everything else is
/// delegated unchanged.
pub struct SuperCouch<D> {
  inner: D,
  store: Arc<dyn SSetStore>,
  options: InterceptorOptions,
}

impl<D: ViewDatabase> SuperCouch<D> {
  pub fn new(inner: D, store: Arc<dyn SSetStore>) -> Self {
    Self::with_options(inner, store, InterceptorOptions::default())
  }

  pub fn with_options(inner: D, store: Arc<dyn SSetStore>, options: InterceptorOptions) -> Self {
    Self {
      inner,
      store,
      options,
    }
  }

  pub async fn view(
    &self,
    ddoc: &str,
    view: &str,
    params: &ViewParams,
  ) -> Result<ViewResponse, anyhow::Error> {
    match classify(params) {
      ViewQuery::Keys(keys) => self
        .keys_query(&keys)
        .await
        .map_err(|e| SuperCouchError::keys_query(e).into()),
      ViewQuery::Range { key, min, max } => self
        .range_query(&key, min, max, params)
        .await
        .map_err(|e| SuperCouchError::range_query(e).into()),
      ViewQuery::PassThrough => self.inner.view(ddoc, view, params).await,
    }
  }

  /// One rank fetch per key, fanned out in parallel, answered in input
  /// order. A key with no stored element yields a row without `value`.
  async fn keys_query(&self, raw: &[Value]) -> Result<ViewResponse, anyhow::Error> {
    let keys = raw
      .iter()
      .map(|key| {
        key
          .as_array()
          .and_then(|parts| SSetKey::from_parts(parts))
          .ok_or_else(|| anyhow!("malformed $SSET key: {key}"))
      })
      .collect::<Result<Vec<_>, _>>()?;

    let opts = RangeOptions {
      include_scores: self.options.include_scores,
      include_total: false,
      ..Default::default()
    };
    let fetches = keys
      .iter()
      .map(|key| self.store.range_by_index(&key.database, &key.id_path, -1, -1, &opts));
    let results = futures_util::future::try_join_all(fetches).await?;

    let rows = keys
      .iter()
      .zip(results)
      .map(|(key, result)| {
        let (value, score) = match result.rows.into_iter().next() {
          Some(row) => (Some(row.value), row.score),
          None => (None, None),
        };
        ViewRow {
          id: "#SSET".to_string(),
          key: Value::String(key.joined()),
          value,
          score,
        }
      })
      .collect();
    Ok(ViewResponse {
      offset: 0,
      total_rows: keys.len() as i64,
      rows,
    })
  }

  async fn range_query(
    &self,
    key: &SSetKey,
    min: f64,
    max: f64,
    params: &ViewParams,
  ) -> Result<ViewResponse, anyhow::Error> {
    let opts = RangeOptions {
      offset: params.skip,
      count: params.limit,
      order: if params.descending {
        Order::Desc
      } else {
        Order::Asc
      },
      include_total: self.options.include_total_rows,
      include_scores: self.options.include_scores,
    };
    let result = self
      .store
      .range_by_score(&key.database, &key.id_path, min, max, &opts)
      .await?;

    let joined = key.joined();
    let rows = result
      .rows
      .into_iter()
      .map(|row| ViewRow {
        id: "#SSET".to_string(),
        key: Value::String(joined.clone()),
        value: Some(row.value),
        score: row.score,
      })
      .collect();
    Ok(ViewResponse {
      offset: result.paging.offset,
      total_rows: result.paging.total,
      rows,
    })
  }
}

#[async_trait]
impl<D: ViewDatabase> ViewDatabase for SuperCouch<D> {
  async fn view(
    &self,
    ddoc: &str,
    view: &str,
    params: &ViewParams,
  ) -> Result<ViewResponse, anyhow::Error> {
    SuperCouch::view(self, ddoc, view, params).await
  }
}
