//! hostkit-transfer: Copying files between hosts
//!
//! `get` and `put` run a copy command (`scp`, `rsync` or a `tar` pipe) on
//! the acting host, with the far side addressed as `user@host:path`.

pub mod endpoint;
pub mod engine;
pub mod error;
pub mod method;
pub mod strategy;

pub use endpoint::Location;
pub use engine::{Transfer, TransferExt, TransferOptions, TransferPlan};
pub use error::TransferError;
pub use method::TransferMethod;
