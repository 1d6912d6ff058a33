mod emission;
mod engine;

pub use emission::{divert, normalize_key};
pub use engine::{DocResult, MapEngine};
