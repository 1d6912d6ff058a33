mod sset;
mod view;

pub use sset::{Keep, Order, Paging, RangeOptions, RangeResponse, SSetOp, SSetRow, SSET_MARKER};
pub use view::{ViewParams, ViewResponse, ViewRow};
