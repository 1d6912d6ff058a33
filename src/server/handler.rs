use std::sync::Arc;

use serde_json::{json, Value};

use super::config::EngineConfig;
use super::protocol::{self, Request};
use crate::query::{divert, MapEngine};
use crate::sset::SSetStore;
use crate::types::SSetOp;

/// Everything one request line produces: diagnostic `["log", …]` lines
/// from map code, then exactly one response line.
pub struct Reply {
  pub logs: Vec<String>,
  pub response: Value,
}

impl Reply {
  fn response(response: Value) -> Self {
    Self {
      logs: Vec::new(),
      response,
    }
  }
}

/// The view-server protocol state machine: one of these per process.
///
/// Lifecycle matches the host's expectations: `reset` drops registered
/// functions and replaces host state; everything else leaves the engine
/// "ready". The process configuration survives resets.
pub struct QueryServer {
  config: EngineConfig,
  store: Arc<dyn SSetStore>,
  engine: MapEngine,
  state: Option<Value>,
}

impl QueryServer {
  pub fn new(config: EngineConfig, store: Arc<dyn SSetStore>) -> Result<Self, anyhow::Error> {
    Ok(Self {
      config,
      store,
      engine: MapEngine::new()?,
      state: None,
    })
  }

  pub async fn handle_line(&mut self, line: &str) -> Reply {
    match protocol::parse_request(line) {
      Ok(request) => self.handle(request).await,
      Err(err) => Reply::response(protocol::error("parse_error", err)),
    }
  }

  pub async fn handle(&mut self, request: Request) -> Reply {
    match request {
      Request::Reset(state) => {
        self.engine.reset();
        self.state = state;
        tracing::debug!("reset: registered functions dropped");
        Reply::response(protocol::ok_true())
      }
      Request::AddLib => Reply::response(protocol::ok_true()),
      Request::AddFun(source) => match self.engine.add_fun(&source) {
        Ok(()) => Reply::response(protocol::ok_true()),
        Err(err) => Reply::response(protocol::error("processing_failed", format!("{err:#}"))),
      },
      Request::MapDoc(doc) => self.map_doc(doc).await,
      Request::Reduce { functions } | Request::Rereduce { functions } => {
        Reply::response(protocol::null_reduce(functions))
      }
      Request::Ddoc => Reply::response(protocol::ok_true()),
      Request::Unknown(command) => Reply::response(protocol::error(
        "unsupported_command",
        format!("unknown command: {command}"),
      )),
    }
  }

  /// Host state object received with the last `reset`.
  pub fn state(&self) -> Option<&Value> {
    self.state.as_ref()
  }

  async fn map_doc(&mut self, doc: Value) -> Reply {
    let result = match self.engine.map_doc(&doc) {
      Ok(result) => result,
      Err(err) => {
        return Reply::response(protocol::error("processing_failed", format!("{err:#}")))
      }
    };
    let logs = result.logs;

    let mut ops: Vec<SSetOp> = Vec::new();
    let mut output = Vec::with_capacity(result.emissions.len());
    for per_function in result.emissions {
      let mut rows = Vec::new();
      for (key, value) in per_function {
        match divert(&key, &value) {
          Ok(Some(op)) => {
            ops.push(op);
            if self.config.emit_sset {
              rows.push(json!([key, value]));
            }
          }
          Ok(None) => rows.push(json!([key, value])),
          Err(err) => {
            return Reply {
              logs,
              response: protocol::error("processing_failed", format!("{err:#}")),
            }
          }
        }
      }
      output.push(Value::Array(rows));
    }

    // The document's batch commits before its response line is written.
    if !ops.is_empty() {
      if let Err(err) = self.store.process(ops).await {
        tracing::warn!("sorted-set batch failed: {err:#}");
        return Reply {
          logs,
          response: protocol::error("processing_failed", format!("{err:#}")),
        };
      }
    }
    Reply {
      logs,
      response: Value::Array(output),
    }
  }
}
