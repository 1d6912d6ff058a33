use serde_json::{json, Value};

/// One request line of the view-server protocol: a heterogeneous JSON
/// array whose first element is the command tag.
#[derive(Debug, Clone)]
pub enum Request {
  Reset(Option<Value>),
  AddLib,
  AddFun(String),
  MapDoc(Value),
  Reduce { functions: usize },
  Rereduce { functions: usize },
  Ddoc,
  Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  #[error("invalid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("{0}")]
  Malformed(&'static str),
}

pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
  let value: Value = serde_json::from_str(line)?;
  let Some(items) = value.as_array() else {
    return Err(ProtocolError::Malformed("request is not an array"));
  };
  let Some(command) = items.first().and_then(Value::as_str) else {
    return Err(ProtocolError::Malformed("missing command tag"));
  };
  match command {
    "reset" => Ok(Request::Reset(items.get(1).cloned())),
    "add_lib" => Ok(Request::AddLib),
    "add_fun" => items
      .get(1)
      .and_then(Value::as_str)
      .map(|source| Request::AddFun(source.to_string()))
      .ok_or(ProtocolError::Malformed("add_fun expects source text")),
    "map_doc" => items
      .get(1)
      .cloned()
      .map(Request::MapDoc)
      .ok_or(ProtocolError::Malformed("map_doc expects a document")),
    "reduce" => Ok(Request::Reduce {
      functions: items.get(1).and_then(Value::as_array).map_or(0, Vec::len),
    }),
    "rereduce" => Ok(Request::Rereduce {
      functions: items.get(1).and_then(Value::as_array).map_or(0, Vec::len),
    }),
    "ddoc" => Ok(Request::Ddoc),
    other => Ok(Request::Unknown(other.to_string())),
  }
}

pub fn ok_true() -> Value {
  Value::Bool(true)
}

/// Reduce is unsupported: one null per requested function.
pub fn null_reduce(functions: usize) -> Value {
  json!([true, vec![Value::Null; functions]])
}

pub fn error(name: &str, reason: impl std::fmt::Display) -> Value {
  json!(["error", name, reason.to_string()])
}

pub fn log_line(message: &str) -> Value {
  json!(["log", message])
}

/// Serialize a response to its wire line. A response that itself fails to
/// serialize degrades to a canned `output_error` line rather than killing
/// the process.
pub fn serialize(response: &Value) -> String {
  serde_json::to_string(response).unwrap_or_else(|err| {
    serde_json::to_string(&error("output_error", err))
      .unwrap_or_else(|_| r#"["error","output_error","unserializable response"]"#.to_string())
  })
}
