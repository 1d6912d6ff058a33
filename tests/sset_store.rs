use serde_json::{json, Value};
use supercouch::sset::{MemoryStore, SSetStore};
use supercouch::types::{Keep, Order, RangeOptions, SSetOp};

fn op(db: &str, path: &[&str], score: f64, value: Value, keep: Keep) -> SSetOp {
  SSetOp::new(
    db,
    path.iter().map(|s| s.to_string()).collect(),
    score,
    value,
    keep,
  )
}

fn path(segments: &[&str]) -> Vec<String> {
  segments.iter().map(|s| s.to_string()).collect()
}

// Index of users by sign-up date: ALL_VALUES keeps one entry per value at
// its highest submitted score.
#[tokio::test]
async fn all_values_index_by_date() {
  let store = MemoryStore::new();
  store
    .process(vec![
      op("UsersIndex", &["ByDate"], 100.0, json!("a"), Keep::AllValues),
      op("UsersIndex", &["ByDate"], 200.0, json!("b"), Keep::AllValues),
      op("UsersIndex", &["ByDate"], 150.0, json!("a"), Keep::AllValues),
    ])
    .await
    .unwrap();

  let res = store
    .range_by_score(
      "UsersIndex",
      &path(&["ByDate"]),
      0.0,
      300.0,
      &RangeOptions {
        include_total: true,
        include_scores: true,
        ..Default::default()
      },
    )
    .await
    .unwrap();

  assert_eq!(res.paging.total, 2);
  assert_eq!(res.rows.len(), 2);
  assert_eq!(res.rows[0].value, json!("a"));
  assert_eq!(res.rows[0].score, Some(150.0));
  assert_eq!(res.rows[1].value, json!("b"));
  assert_eq!(res.rows[1].score, Some(200.0));
}

// Keep-last state: the set never holds more than one element, the one
// with the globally largest submitted score.
#[tokio::test]
async fn last_value_keeps_highest_score() {
  let store = MemoryStore::new();
  store
    .process(vec![
      op("Users", &["u7"], 1.0, json!({"n": "old"}), Keep::LastValue),
      op("Users", &["u7"], 5.0, json!({"n": "new"}), Keep::LastValue),
      op("Users", &["u7"], 3.0, json!({"n": "stale"}), Keep::LastValue),
    ])
    .await
    .unwrap();

  let res = store
    .range_by_index(
      "Users",
      &path(&["u7"]),
      0,
      -1,
      &RangeOptions {
        include_scores: true,
        ..Default::default()
      },
    )
    .await
    .unwrap();

  assert_eq!(res.rows.len(), 1);
  assert_eq!(res.rows[0].value, json!({"n": "new"}));
  assert_eq!(res.rows[0].score, Some(5.0));
}

// Two sorted sets with the same id-path but different databases never
// collide.
#[tokio::test]
async fn databases_are_isolated() {
  let store = MemoryStore::new();
  store
    .process(vec![
      op("alpha", &["k"], 1.0, json!("in-alpha"), Keep::AllValues),
      op("beta", &["k"], 2.0, json!("in-beta"), Keep::AllValues),
    ])
    .await
    .unwrap();

  let alpha = store
    .range_by_index("alpha", &path(&["k"]), 0, -1, &RangeOptions::default())
    .await
    .unwrap();
  let beta = store
    .range_by_index("beta", &path(&["k"]), 0, -1, &RangeOptions::default())
    .await
    .unwrap();
  assert_eq!(alpha.rows.len(), 1);
  assert_eq!(alpha.rows[0].value, json!("in-alpha"));
  assert_eq!(beta.rows.len(), 1);
  assert_eq!(beta.rows[0].value, json!("in-beta"));
}

// Writing any JSON-encodable value and reading it back yields an equal
// value.
#[tokio::test]
async fn values_round_trip() {
  let store = MemoryStore::new();
  let values = [
    json!(null),
    json!(true),
    json!(12.5),
    json!("text with : and / separators"),
    json!([1, "two", {"three": 3}]),
    json!({"nested": {"deep": [null, false]}}),
  ];
  for (i, value) in values.iter().enumerate() {
    store
      .process(vec![op(
        "roundtrip",
        &["all"],
        i as f64,
        value.clone(),
        Keep::AllValues,
      )])
      .await
      .unwrap();
  }

  let res = store
    .range_by_index(
      "roundtrip",
      &path(&["all"]),
      0,
      -1,
      &RangeOptions::default(),
    )
    .await
    .unwrap();
  let read: Vec<&Value> = res.rows.iter().map(|r| &r.value).collect();
  assert_eq!(read.len(), values.len());
  for value in &values {
    assert!(read.contains(&value));
  }
}

#[tokio::test]
async fn full_range_of_empty_set_is_empty_with_zero_total() {
  let store = MemoryStore::new();
  let res = store
    .range_by_index(
      "empty",
      &path(&["k"]),
      0,
      -1,
      &RangeOptions {
        include_total: true,
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert!(res.rows.is_empty());
  assert_eq!(res.paging.total, 0);
}

#[tokio::test]
async fn last_element_lookup() {
  let store = MemoryStore::new();
  let res = store
    .range_by_index("empty", &path(&["k"]), -1, -1, &RangeOptions::default())
    .await
    .unwrap();
  assert!(res.rows.is_empty());

  store
    .process(vec![
      op("db", &["k"], 1.0, json!("low"), Keep::AllValues),
      op("db", &["k"], 9.0, json!("high"), Keep::AllValues),
    ])
    .await
    .unwrap();
  let res = store
    .range_by_index("db", &path(&["k"]), -1, -1, &RangeOptions::default())
    .await
    .unwrap();
  assert_eq!(res.rows.len(), 1);
  assert_eq!(res.rows[0].value, json!("high"));
}

#[tokio::test]
async fn inverted_score_bounds_do_not_error() {
  let store = MemoryStore::new();
  store
    .process(vec![op("db", &["k"], 5.0, json!("x"), Keep::AllValues)])
    .await
    .unwrap();
  let res = store
    .range_by_score("db", &path(&["k"]), 10.0, 1.0, &RangeOptions::default())
    .await
    .unwrap();
  assert!(res.rows.is_empty());
}

#[tokio::test]
async fn descending_inverts_rows_but_keeps_paging() {
  let store = MemoryStore::new();
  store
    .process(vec![
      op("db", &["k"], 1.0, json!("a"), Keep::AllValues),
      op("db", &["k"], 2.0, json!("b"), Keep::AllValues),
      op("db", &["k"], 3.0, json!("c"), Keep::AllValues),
    ])
    .await
    .unwrap();

  let opts = RangeOptions {
    offset: Some(0),
    count: Some(2),
    order: Order::Desc,
    include_total: true,
    include_scores: false,
  };
  let res = store
    .range_by_score("db", &path(&["k"]), 0.0, 10.0, &opts)
    .await
    .unwrap();
  assert_eq!(res.rows.len(), 2);
  assert_eq!(res.rows[0].value, json!("c"));
  assert_eq!(res.rows[1].value, json!("b"));
  assert_eq!(res.paging.offset, 0);
  assert_eq!(res.paging.count, 2);
  assert_eq!(res.paging.total, 3);
}

#[tokio::test]
async fn paging_without_total_reports_minus_one() {
  let store = MemoryStore::new();
  store
    .process(vec![op("db", &["k"], 1.0, json!("a"), Keep::AllValues)])
    .await
    .unwrap();
  let res = store
    .range_by_score(
      "db",
      &path(&["k"]),
      0.0,
      10.0,
      &RangeOptions {
        offset: Some(0),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(res.paging.total, -1);
  assert_eq!(res.paging.count, -1);
}

#[tokio::test]
async fn empty_id_path_fails_the_whole_batch() {
  let store = MemoryStore::new();
  let result = store
    .process(vec![
      op("db", &["k"], 1.0, json!("fine"), Keep::AllValues),
      op("db", &[], 2.0, json!("broken"), Keep::AllValues),
    ])
    .await;
  assert!(result.is_err());
  // Nothing from the failed batch is visible.
  let res = store
    .range_by_index("db", &path(&["k"]), 0, -1, &RangeOptions::default())
    .await
    .unwrap();
  assert!(res.rows.is_empty());
}
