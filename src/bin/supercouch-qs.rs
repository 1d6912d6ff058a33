use std::sync::Arc;

use supercouch::server::{self, EngineConfig, QueryServer};
use supercouch::sset::RedisStore;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let config = EngineConfig::from_args();
  supercouch::logging::init(&config)?;

  let store = Arc::new(RedisStore::connect(&config.redis_url).await?);
  tracing::info!("sorted-set backend ready");

  let server = QueryServer::new(config, store)?;
  server::run(server).await
}
