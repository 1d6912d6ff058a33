use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

use super::handler::QueryServer;
use super::protocol;

/// Drive the line loop: one JSON line in, one JSON line out, strictly in
/// order. Map-code `log` lines precede the response of the request that
/// produced them. Returns when stdin closes.
pub async fn run(mut server: QueryServer) -> Result<(), anyhow::Error> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdout = tokio::io::stdout();
  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }
    let reply = server.handle_line(&line).await;
    for message in &reply.logs {
      tracing::info!("map log: {message}");
      write_line(&mut stdout, protocol::serialize(&protocol::log_line(message))).await?;
    }
    write_line(&mut stdout, protocol::serialize(&reply.response)).await?;
  }
  tracing::info!("stdin closed, shutting down");
  Ok(())
}

async fn write_line(stdout: &mut Stdout, mut line: String) -> std::io::Result<()> {
  line.push('\n');
  stdout.write_all(line.as_bytes()).await?;
  stdout.flush().await
}
