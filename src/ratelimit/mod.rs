//! Rate limiting logic and durable window state.

mod checker;
mod key;
mod store;

pub use checker::FrequencyChecker;
pub use key::{GrantKey, KeyClass};
pub use store::{GrantRecord, WindowStore};
