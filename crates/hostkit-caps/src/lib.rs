//! hostkit-caps: Host capabilities
//!
//! Path predicates, user and group registry queries, process signaling, file
//! commands and system facts, built only on [`Host::execute`] and the host
//! file primitives so they behave the same on local and remote hosts.
//!
//! [`Host::execute`]: hostkit_exec::Host::execute

pub mod error;
pub mod ext;
pub mod files;
pub mod groups;
pub mod path;
pub mod processes;
mod support;
pub mod system;
pub mod users;

pub use error::CapabilityError;
pub use ext::HostExt;
pub use files::Files;
pub use groups::{GroupRecord, Groups};
pub use path::PathOps;
pub use processes::{Processes, Signal};
pub use system::System;
pub use users::{UserRecord, Users};
