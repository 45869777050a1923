pub mod config;
pub mod logging;

pub mod checksum;
pub mod clear;
pub mod control;
pub mod error;
pub mod inventory;
pub mod launch;
pub mod ledger;
pub mod locate;
pub mod manifest;
pub mod patcher;
pub mod pipeline;
pub mod planner;
pub mod relpath;
pub mod remote;
pub mod retry;
pub mod storage;

pub use error::{PatchError, PatchResult};
pub use patcher::Patcher;
