//! Capability accessors for every host

use hostkit_exec::Host;

use crate::files::Files;
use crate::groups::Groups;
use crate::path::PathOps;
use crate::processes::Processes;
use crate::system::System;
use crate::users::Users;

/// Capability surface available on any [`Host`]
///
/// ```no_run
/// # async fn demo() -> Result<(), hostkit_caps::CapabilityError> {
/// use hostkit_caps::HostExt;
/// use hostkit_exec::LocalHost;
///
/// let host = LocalHost::new();
/// if host.path().exists("/etc/hosts").await? {
///     println!("{}", host.path().owner("/etc/hosts").await?);
/// }
/// # Ok(())
/// # }
/// ```
pub trait HostExt: Host {
    /// Path predicates and queries
    fn path(&self) -> PathOps<'_, Self> {
        PathOps::new(self)
    }

    /// User registry
    fn users(&self) -> Users<'_, Self> {
        Users::new(self)
    }

    /// Group registry
    fn groups(&self) -> Groups<'_, Self> {
        Groups::new(self)
    }

    /// Process signaling
    fn processes(&self) -> Processes<'_, Self> {
        Processes::new(self)
    }

    /// File commands
    fn files(&self) -> Files<'_, Self> {
        Files::new(self)
    }

    /// System facts
    fn system(&self) -> System<'_, Self> {
        System::new(self)
    }
}

impl<H: Host + ?Sized> HostExt for H {}
