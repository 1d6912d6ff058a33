mod classify;
mod interceptor;

pub use classify::{classify, SSetKey, ViewQuery};
pub use interceptor::{InterceptorOptions, SuperCouch, SuperCouchError, ViewDatabase};
