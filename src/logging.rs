use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Arc;

use anyhow::Context as _;
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::server::EngineConfig;

/// Line-oriented TCP syslog sink. UDP is not supported.
#[derive(Clone)]
struct TcpLogWriter {
  stream: Arc<Mutex<TcpStream>>,
}

impl Write for TcpLogWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.stream.lock().write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.stream.lock().flush()
  }
}

impl<'a> MakeWriter<'a> for TcpLogWriter {
  type Writer = TcpLogWriter;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

/// Install the tracing subscriber. Diagnostics go to stderr (stdout
/// belongs to the wire protocol), plus the optional file and TCP syslog
/// sinks from the configuration.
pub fn init(config: &EngineConfig) -> Result<(), anyhow::Error> {
  let file_layer = match &config.log_file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
      Some(
        tracing_subscriber::fmt::layer()
          .with_ansi(false)
          .with_writer(Arc::new(file)),
      )
    }
    None => None,
  };

  let syslog_layer = match &config.syslog_url {
    Some(url) => {
      let addr = url
        .strip_prefix("tcp://")
        .ok_or_else(|| anyhow::anyhow!("only tcp:// syslog URLs are supported, got {url}"))?;
      let stream =
        TcpStream::connect(addr).with_context(|| format!("connecting to syslog at {addr}"))?;
      Some(
        tracing_subscriber::fmt::layer()
          .with_ansi(false)
          .with_writer(TcpLogWriter {
            stream: Arc::new(Mutex::new(stream)),
          }),
      )
    }
    None => None,
  };

  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level())),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .with(file_layer)
    .with(syslog_layer)
    .init();
  Ok(())
}
