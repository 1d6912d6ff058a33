use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, Pipeline, RedisFuture};

use super::store::{database_tag, storage_key, validate_ops, SSetStore};
use crate::types::{Keep, Order, Paging, RangeOptions, RangeResponse, SSetOp, SSetRow};

/// A parsed `redis-cluster://` URL.
///
/// Shape: `redis-cluster://node1,node2[+addr=from,to]…` where each `+addr=`
/// segment remaps one internal cluster address to the externally reachable
/// one. The remap is applied to the initial node list; redirects use the
/// addresses the cluster itself announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterUrl {
  pub nodes: Vec<String>,
  pub addr_map: HashMap<String, String>,
}

impl ClusterUrl {
  /// Returns `None` when `url` does not carry the cluster scheme; such
  /// URLs are handed to the single-node client untouched.
  pub fn parse(url: &str) -> Option<Self> {
    let rest = url.strip_prefix("redis-cluster://")?;
    let mut segments = rest.split('+');
    let nodes = segments
      .next()
      .unwrap_or_default()
      .split(',')
      .filter(|node| !node.is_empty())
      .map(str::to_string)
      .collect();
    let mut addr_map = HashMap::new();
    for segment in segments {
      if let Some(pair) = segment.strip_prefix("addr=") {
        if let Some((from, to)) = pair.split_once(',') {
          addr_map.insert(from.to_string(), to.to_string());
        }
      }
    }
    Some(Self { nodes, addr_map })
  }

  /// Root node URLs with the address remap applied.
  pub fn root_nodes(&self) -> Vec<String> {
    self
      .nodes
      .iter()
      .map(|node| {
        let node = self.addr_map.get(node).unwrap_or(node);
        format!("redis://{}", node)
      })
      .collect()
  }
}

/// One shared multiplexed connection, standalone or cluster.
#[derive(Clone)]
enum RedisConn {
  Single(ConnectionManager),
  Cluster(ClusterConnection),
}

impl ConnectionLike for RedisConn {
  fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, redis::Value> {
    match self {
      Self::Single(conn) => conn.req_packed_command(cmd),
      Self::Cluster(conn) => conn.req_packed_command(cmd),
    }
  }

  fn req_packed_commands<'a>(
    &'a mut self,
    pipeline: &'a Pipeline,
    offset: usize,
    count: usize,
  ) -> RedisFuture<'a, Vec<redis::Value>> {
    match self {
      Self::Single(conn) => conn.req_packed_commands(pipeline, offset, count),
      Self::Cluster(conn) => conn.req_packed_commands(pipeline, offset, count),
    }
  }

  fn get_db(&self) -> i64 {
    match self {
      Self::Single(conn) => conn.get_db(),
      Self::Cluster(_) => 0,
    }
  }
}

/// Redis-backed `SSetStore`.
pub struct RedisStore {
  conn: RedisConn,
}

impl RedisStore {
  /// Connect to the backend named by `url`. A `redis-cluster://` URL opens
  /// a cluster connection; anything else goes through the single-node
  /// client unchanged.
  pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
    let conn = match ClusterUrl::parse(url) {
      Some(cluster) => {
        let client = ClusterClient::new(cluster.root_nodes())?;
        RedisConn::Cluster(client.get_async_connection().await?)
      }
      None => {
        let client = redis::Client::open(url)?;
        RedisConn::Single(client.get_connection_manager().await?)
      }
    };
    Ok(Self { conn })
  }

  /// Build the transaction for one database group.
  fn group_pipeline(ops: &[&SSetOp]) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in ops {
      let key = storage_key(&op.database, &op.id_path);
      let member = op.value.to_string();
      pipe
        .cmd("ZADD")
        .arg(&key)
        .arg("GT")
        .arg("CH")
        .arg(op.score)
        .arg(member)
        .ignore();
      if op.keep == Keep::LastValue {
        pipe
          .cmd("ZREMRANGEBYRANK")
          .arg(&key)
          .arg(0)
          .arg(-2)
          .ignore();
      }
      // Track the set in the per-database registry so flush_database can
      // enumerate it; same hash tag, same shard, same transaction.
      pipe
        .cmd("ZADD")
        .arg(database_tag(&op.database))
        .arg(0)
        .arg(&key)
        .ignore();
    }
    pipe
  }
}

fn decode_plain(values: Vec<String>) -> Result<Vec<SSetRow>, anyhow::Error> {
  values
    .into_iter()
    .map(|member| {
      Ok(SSetRow {
        value: serde_json::from_str(&member)?,
        score: None,
      })
    })
    .collect()
}

fn decode_scored(pairs: Vec<(String, f64)>) -> Result<Vec<SSetRow>, anyhow::Error> {
  pairs
    .into_iter()
    .map(|(member, score)| {
      Ok(SSetRow {
        value: serde_json::from_str(&member)?,
        score: Some(score),
      })
    })
    .collect()
}

fn response_paging(opts: &RangeOptions, total: i64) -> Paging {
  Paging {
    offset: opts.offset.unwrap_or(0) as i64,
    count: if opts.paged() {
      opts.count.map_or(-1, |c| c as i64)
    } else {
      -1
    },
    total,
  }
}

#[async_trait]
impl SSetStore for RedisStore {
  async fn process(&self, ops: Vec<SSetOp>) -> Result<(), anyhow::Error> {
    validate_ops(&ops)?;
    let mut groups: HashMap<&str, Vec<&SSetOp>> = HashMap::new();
    for op in &ops {
      groups.entry(&op.database).or_default().push(op);
    }
    let commits = groups.values().map(|group| {
      let pipe = Self::group_pipeline(group);
      let mut conn = self.conn.clone();
      async move {
        let _: () = pipe.query_async(&mut conn).await?;
        Ok::<_, anyhow::Error>(())
      }
    });
    futures_util::future::try_join_all(commits).await?;
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

    let fetch = {
      let key = key.clone();
      let mut conn = self.conn.clone();
      let include_scores = opts.include_scores;
      async move {
        let mut cmd = redis::cmd("ZRANGE");
        cmd.arg(&key).arg(min).arg(max);
        if include_scores {
          cmd.arg("WITHSCORES");
          let pairs: Vec<(String, f64)> = cmd.query_async(&mut conn).await?;
          decode_scored(pairs)
        } else {
          let values: Vec<String> = cmd.query_async(&mut conn).await?;
          decode_plain(values)
        }
      }
    };
    let count = {
      let key = key.clone();
      let mut conn = self.conn.clone();
      let include_total = opts.include_total;
      async move {
        if include_total {
          let total: i64 = redis::cmd("ZCARD").arg(&key).query_async(&mut conn).await?;
          Ok::<_, anyhow::Error>(Some(total))
        } else {
          Ok(None)
        }
      }
    };
    let (mut rows, total) = tokio::try_join!(fetch, count)?;

    if opts.order == Order::Desc {
      rows.reverse();
    }
    if opts.paged() {
      let offset = opts.offset.unwrap_or(0) as usize;
      rows = rows
        .into_iter()
        .skip(offset)
        .take(opts.count.map_or(usize::MAX, |c| c as usize))
        .collect();
    }
    Ok(RangeResponse {
      paging: response_paging(opts, total.unwrap_or(-1)),
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

    let fetch = {
      let key = key.clone();
      let mut conn = self.conn.clone();
      let opts = opts.clone();
      async move {
        // Descending swaps the bounds and flips to the REV variant.
        let mut cmd = match opts.order {
          Order::Asc => {
            let mut cmd = redis::cmd("ZRANGEBYSCORE");
            cmd.arg(&key).arg(min).arg(max);
            cmd
          }
          Order::Desc => {
            let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
            cmd.arg(&key).arg(max).arg(min);
            cmd
          }
        };
        if opts.include_scores {
          cmd.arg("WITHSCORES");
        }
        if opts.paged() {
          cmd
            .arg("LIMIT")
            .arg(opts.offset.unwrap_or(0))
            .arg(opts.count.map_or(-1i64, |c| c as i64));
        }
        if opts.include_scores {
          let pairs: Vec<(String, f64)> = cmd.query_async(&mut conn).await?;
          decode_scored(pairs)
        } else {
          let values: Vec<String> = cmd.query_async(&mut conn).await?;
          decode_plain(values)
        }
      }
    };
    let count = {
      let key = key.clone();
      let mut conn = self.conn.clone();
      // Without paging the row count already is the total; skip the
      // extra round-trip.
      let needs_count = opts.include_total && opts.paged();
      async move {
        if needs_count {
          let total: i64 = redis::cmd("ZCOUNT")
            .arg(&key)
            .arg(min)
            .arg(max)
            .query_async(&mut conn)
            .await?;
          Ok::<_, anyhow::Error>(Some(total))
        } else {
          Ok(None)
        }
      }
    };
    let (rows, counted) = tokio::try_join!(fetch, count)?;

    let total = match (opts.include_total, counted) {
      (true, Some(total)) => total,
      (true, None) => rows.len() as i64,
      (false, _) => -1,
    };
    Ok(RangeResponse {
      paging: response_paging(opts, total),
      rows,
    })
  }

  async fn flush_database(&self, database: &str) -> Result<u64, anyhow::Error> {
    let tag = database_tag(database);
    let mut conn = self.conn.clone();
    let keys: Vec<String> = redis::cmd("ZRANGE")
      .arg(&tag)
      .arg(0)
      .arg(-1)
      .query_async(&mut conn)
      .await?;
    let mut pipe = redis::pipe();
    pipe.atomic();
    for key in &keys {
      pipe.cmd("DEL").arg(key).ignore();
    }
    pipe.cmd("DEL").arg(&tag).ignore();
    let _: () = pipe.query_async(&mut conn).await?;
    Ok(keys.len() as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn single_node_urls_are_not_cluster() {
    assert!(ClusterUrl::parse("redis://localhost:6379").is_none());
  }

  #[test]
  fn cluster_url_parses_node_list() {
    let url = ClusterUrl::parse("redis-cluster://10.0.0.1:7000,10.0.0.2:7000").unwrap();
    assert_eq!(url.nodes, vec!["10.0.0.1:7000", "10.0.0.2:7000"]);
    assert!(url.addr_map.is_empty());
    assert_eq!(
      url.root_nodes(),
      vec!["redis://10.0.0.1:7000", "redis://10.0.0.2:7000"]
    );
  }

  #[test]
  fn cluster_url_parses_address_remap() {
    let url = ClusterUrl::parse(
      "redis-cluster://10.0.0.1:7000+addr=10.0.0.1:7000,203.0.113.5:17000",
    )
    .unwrap();
    assert_eq!(
      url.addr_map.get("10.0.0.1:7000"),
      Some(&"203.0.113.5:17000".to_string())
    );
    assert_eq!(url.root_nodes(), vec!["redis://203.0.113.5:17000"]);
  }

  #[test]
  fn group_pipeline_trims_last_value_sets() {
    let op = SSetOp::new(
      "Users",
      vec!["u7".into()],
      5.0,
      json!({"n": "new"}),
      Keep::LastValue,
    );
    let pipe = RedisStore::group_pipeline(&[&op]);
    let packed = String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned();
    assert!(packed.contains("ZADD"));
    assert!(packed.contains("GT"));
    assert!(packed.contains("ZREMRANGEBYRANK"));
    assert!(packed.contains("{SSET:Users}/u7"));
  }

  #[test]
  fn group_pipeline_registers_sets_for_flush() {
    let op = SSetOp::new("Users", vec!["u7".into()], 5.0, json!(1), Keep::AllValues);
    let pipe = RedisStore::group_pipeline(&[&op]);
    let packed = String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned();
    assert!(packed.contains("{SSET:Users}\r\n"));
  }
}
