mod config;
mod handler;
pub mod protocol;
mod stdio;

pub use config::EngineConfig;
pub use handler::{QueryServer, Reply};
pub use stdio::run;
