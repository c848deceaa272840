//! Cart Store and Persistence Bridge.

mod session;
mod store;

pub use session::{CartSession, MergeOutcome};
pub use store::CartStore;
