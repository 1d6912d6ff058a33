mod memory;
mod redis;
mod store;

pub use memory::MemoryStore;
pub use redis::{ClusterUrl, RedisStore};
pub use store::{database_tag, storage_key, SSetStore};
