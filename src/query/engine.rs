use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::anyhow;
use lru::LruCache;
use rquickjs::{CatchResultExt, Context, Function, Persistent, Runtime};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::emission::normalize_key;

/// Globals available to user map code. `emit` and `log` append to scratch
/// buffers that the engine drains after every invocation.
const PRELUDE_JS: &str = r#"
var __emits = [];
var __logs = [];
function emit(key, value) { __emits.push([key, value]); }
function log(msg) { __logs.push(typeof msg === "string" ? msg : JSON.stringify(msg)); }
"#;

const MEMORY_LIMIT: usize = 10 * 1024 * 1024;
const STACK_LIMIT: usize = 1024 * 1024;
const COMPILE_CACHE_SIZE: usize = 256;

/// Evaluator for user-supplied map functions.
///
/// Functions are compiled once per distinct source text (content-addressed
/// by sha256) and held as persistent references into a single long-lived
/// QuickJS context, so the `emit`/`log` bindings installed at startup stay
/// visible to every compiled function.
pub struct MapEngine {
  context: Context,
  registered: Vec<CompiledMap>,
  cache: LruCache<String, Persistent<Function<'static>>>,
  scratch_dir: PathBuf,
}

struct CompiledMap {
  digest: String,
  func: Persistent<Function<'static>>,
}

/// Emissions and log lines produced by one document.
#[derive(Debug)]
pub struct DocResult {
  /// One emission list per registered function, in registration order.
  /// Keys are already normalized.
  pub emissions: Vec<Vec<(Value, Value)>>,
  pub logs: Vec<String>,
}

impl MapEngine {
  pub fn new() -> Result<Self, anyhow::Error> {
    let runtime = Runtime::new()?;
    runtime.set_memory_limit(MEMORY_LIMIT);
    runtime.set_max_stack_size(STACK_LIMIT);
    let context = Context::full(&runtime)?;
    context.with(|ctx| ctx.eval::<(), _>(PRELUDE_JS))?;
    Ok(Self {
      context,
      registered: Vec::new(),
      cache: LruCache::new(NonZeroUsize::new(COMPILE_CACHE_SIZE).unwrap()),
      scratch_dir: std::env::temp_dir(),
    })
  }

  /// Number of currently registered map functions.
  pub fn len(&self) -> usize {
    self.registered.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registered.is_empty()
  }

  /// Drop all registered functions. Compiled artifacts stay cached, keyed
  /// by source digest, so re-registration after a reset is free.
  pub fn reset(&mut self) {
    self.registered.clear();
  }

  /// Register one map function from source text.
  pub fn add_fun(&mut self, source: &str) -> Result<(), anyhow::Error> {
    let digest = source_digest(source);
    if let Some(func) = self.cache.get(&digest) {
      let func = func.clone();
      self.registered.push(CompiledMap { digest, func });
      return Ok(());
    }

    // Wrap the declaration so `function map(doc) { … }` evaluates to a
    // callable expression.
    let transformed = format!("({})", source.trim());
    let scratch = self
      .scratch_dir
      .join(format!("supercouch-{}-{}.js", std::process::id(), digest));
    std::fs::write(&scratch, &transformed)?;

    let func = self.context.with(|ctx| {
      ctx
        .eval::<Function, _>(transformed.as_str())
        .catch(&ctx)
        .map(|f| Persistent::save(&ctx, f))
        .map_err(|e| anyhow!("map function does not compile: {e}"))
    })?;
    tracing::debug!(%digest, "compiled map function");
    self.cache.put(digest.clone(), func.clone());
    self.registered.push(CompiledMap { digest, func });
    Ok(())
  }

  /// Run every registered function against one document.
  ///
  /// An exception in any function fails the whole document; the caller
  /// turns that into a `processing_failed` response.
  pub fn map_doc(&self, doc: &Value) -> Result<DocResult, anyhow::Error> {
    let doc_text = doc.to_string();
    self.context.with(|ctx| {
      let doc_js = ctx.json_parse(doc_text.clone())?;
      let mut emissions = Vec::with_capacity(self.registered.len());
      let mut logs = Vec::new();
      for compiled in &self.registered {
        ctx
          .eval::<(), _>("__emits = []; __logs = [];")
          .map_err(|e| anyhow!("scratch reset failed: {e}"))?;
        let func = compiled.func.clone().restore(&ctx)?;
        func
          .call::<_, ()>((doc_js.clone(),))
          .catch(&ctx)
          .map_err(|e| anyhow!("map function {} failed: {e}", compiled.digest))?;

        let emitted: String = ctx
          .eval("JSON.stringify(__emits)")
          .map_err(|e| anyhow!("draining emissions failed: {e}"))?;
        let raw: Vec<(Value, Value)> = serde_json::from_str(&emitted)?;
        emissions.push(
          raw
            .into_iter()
            .map(|(key, value)| (normalize_key(key), value))
            .collect(),
        );

        let logged: String = ctx
          .eval("JSON.stringify(__logs)")
          .map_err(|e| anyhow!("draining logs failed: {e}"))?;
        logs.extend(serde_json::from_str::<Vec<String>>(&logged)?);
      }
      Ok(DocResult { emissions, logs })
    })
  }
}

fn source_digest(source: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(source.as_bytes());
  format!("{:x}", hasher.finalize())
}
