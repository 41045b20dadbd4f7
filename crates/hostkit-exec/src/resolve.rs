//! Target resolution for remote hosts
//!
//! A connect target is an IPv4 literal, an IPv6 literal or a name. The other
//! two identity fields are derived from it in a fixed order; any single
//! lookup may fail without failing the whole resolution.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ExecError;

/// Forward and reverse name lookups
#[async_trait]
pub trait Resolver: Send + Sync {
    /// All addresses of a name (empty on failure)
    async fn lookup(&self, name: &str) -> Vec<IpAddr>;

    /// Name of an address (`None` on failure)
    async fn reverse(&self, address: IpAddr) -> Option<String>;
}

/// Resolver backed by the system's name service
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, name: &str) -> Vec<IpAddr> {
        match tokio::net::lookup_host((name, 22)).await {
            Ok(addrs) => addrs.map(|addr| addr.ip()).collect(),
            Err(e) => {
                debug!(name = %name, error = %e, "forward lookup failed");
                Vec::new()
            }
        }
    }

    async fn reverse(&self, address: IpAddr) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&address));
        match lookup.await {
            Ok(Ok(name)) => Some(name),
            Ok(Err(e)) => {
                debug!(address = %address, error = %e, "reverse lookup failed");
                None
            }
            Err(e) => {
                debug!(address = %address, error = %e, "reverse lookup task failed");
                None
            }
        }
    }
}

/// Network identity of a remote host, resolved once at connect time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkIdentity {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub fqdn: Option<String>,
}

impl NetworkIdentity {
    /// Resolve the identity of `target`
    pub async fn resolve<R>(resolver: &R, target: &str) -> Self
    where
        R: Resolver + ?Sized,
    {
        let trimmed = target.trim_start_matches('[').trim_end_matches(']');
        let identity = match trimmed.parse::<IpAddr>() {
            Ok(IpAddr::V4(ipv4)) => {
                let fqdn = resolver.reverse(IpAddr::V4(ipv4)).await;
                let ipv6 = match &fqdn {
                    Some(name) => first_v6(&resolver.lookup(name).await),
                    None => None,
                };
                Self {
                    ipv4: Some(ipv4),
                    ipv6,
                    fqdn,
                }
            }
            Ok(IpAddr::V6(ipv6)) => {
                let fqdn = resolver.reverse(IpAddr::V6(ipv6)).await;
                let ipv4 = match &fqdn {
                    Some(name) => first_v4(&resolver.lookup(name).await),
                    None => None,
                };
                Self {
                    ipv4,
                    ipv6: Some(ipv6),
                    fqdn,
                }
            }
            Err(_) => {
                let addresses = resolver.lookup(trimmed).await;
                let ipv4 = first_v4(&addresses);
                let ipv6 = first_v6(&addresses);
                let canonical = ipv4.map(IpAddr::V4).or(ipv6.map(IpAddr::V6));
                let fqdn = match canonical {
                    Some(address) => resolver.reverse(address).await,
                    None => None,
                };
                Self { ipv4, ipv6, fqdn }
            }
        };

        if identity.ipv4.is_none() {
            warn!(host = %target, "unable to resolve an IPv4 address");
        }
        if identity.ipv6.is_none() {
            debug!(host = %target, "unable to resolve an IPv6 address");
        }
        if identity.fqdn.is_none() {
            warn!(host = %target, "unable to resolve a host name");
        }
        identity
    }

    /// Address to connect to
    ///
    /// IPv6 is used only when it resolved and was asked for; otherwise IPv4,
    /// falling back to IPv6 when it is all there is.
    ///
    /// # Errors
    /// Returns `ExecError::Unreachable` when neither address resolved
    pub fn connect_address(&self, target: &str, prefer_ipv6: bool) -> Result<IpAddr, ExecError> {
        match (self.ipv4, self.ipv6) {
            (_, Some(v6)) if prefer_ipv6 => Ok(IpAddr::V6(v6)),
            (Some(v4), _) => Ok(IpAddr::V4(v4)),
            (None, Some(v6)) => Ok(IpAddr::V6(v6)),
            (None, None) => Err(ExecError::Unreachable(target.to_string())),
        }
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} ({}, {})",
            show(self.fqdn.clone()),
            show(self.ipv4.map(|a| a.to_string())),
            show(self.ipv6.map(|a| a.to_string()))
        )
    }
}

fn first_v4(addresses: &[IpAddr]) -> Option<Ipv4Addr> {
    addresses.iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })
}

fn first_v6(addresses: &[IpAddr]) -> Option<Ipv6Addr> {
    addresses.iter().find_map(|addr| match addr {
        IpAddr::V6(v6) => Some(*v6),
        IpAddr::V4(_) => None,
    })
}
