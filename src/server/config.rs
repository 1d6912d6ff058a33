use std::path::PathBuf;

use clap::Parser;

/// Process configuration, ingested from argv only. The database operator
/// points `COUCHDB_QUERY_SERVER_SUPERCOUCH` at this executable; the engine
/// itself reads no environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
  name = "supercouch-qs",
  about = "CouchDB query server backed by a Redis sorted-set index",
  version
)]
pub struct EngineConfig {
  /// Backend URL: redis://host:port or redis-cluster://node1,node2[+addr=from,to]
  #[arg(long = "redis-url")]
  pub redis_url: String,

  /// Also pass $SSET emissions through as normal view rows (index backup)
  #[arg(long = "emit-sset")]
  pub emit_sset: bool,

  /// Append diagnostics to this file
  #[arg(long = "log-file")]
  pub log_file: Option<PathBuf>,

  /// Send diagnostics over TCP syslog (tcp://host:port; UDP not supported)
  #[arg(long = "syslog-url")]
  pub syslog_url: Option<String>,

  /// Log at info level
  #[arg(long)]
  pub verbose: bool,

  /// Log at debug level
  #[arg(long)]
  pub debug: bool,
}

impl EngineConfig {
  /// Parse argv. Every parse failure, `--help` included, prints usage and
  /// exits 1: the host database treats this process as a query server,
  /// not a CLI, so anything short of a clean start is a usage error.
  pub fn from_args() -> Self {
    match Self::try_parse() {
      Ok(config) => config,
      Err(err) => {
        let _ = err.print();
        std::process::exit(1);
      }
    }
  }

  pub fn log_level(&self) -> &'static str {
    if self.debug {
      "debug"
    } else if self.verbose {
      "info"
    } else {
      "warn"
    }
  }
}
