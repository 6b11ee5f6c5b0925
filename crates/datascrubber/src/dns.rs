//! Hostname to canonical RDS endpoint resolution

use crate::error::{Result, ScrubError};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::proto::rr::{Name, RecordType};
use tracing::debug;

/// Name-resolution capability used to find the RDS endpoint behind a hostname
#[allow(async_fn_in_trait)]
pub trait NameResolver: Send + Sync {
    /// Canonical DNS name of `hostname`, after following any CNAME chain
    async fn canonical_name(&self, hostname: &str) -> Result<String>;
}

/// System-configured DNS resolver
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform equivalent)
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| ScrubError::Dns {
            hostname: "(system configuration)".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { resolver })
    }
}

impl NameResolver for SystemResolver {
    async fn canonical_name(&self, hostname: &str) -> Result<String> {
        let lookup = self
            .resolver
            .lookup_ip(hostname)
            .await
            .map_err(|e| ScrubError::Dns {
                hostname: hostname.to_string(),
                message: e.to_string(),
            })?;

        // The owner of the address records is the end of the CNAME chain.
        let canonical = lookup
            .as_lookup()
            .records()
            .iter()
            .find(|r| matches!(r.record_type(), RecordType::A | RecordType::AAAA))
            .map(|r| r.name().to_utf8())
            .ok_or_else(|| ScrubError::Dns {
                hostname: hostname.to_string(),
                message: "no address records".to_string(),
            })?;

        debug!(hostname = %hostname, canonical = %canonical, "Resolved canonical name");
        Ok(canonical)
    }
}

/// Whether `name` is `domain` or lives under it (case-insensitive).
pub fn is_subdomain(name: &str, domain: &str) -> bool {
    match (Name::from_utf8(name), Name::from_utf8(domain)) {
        (Ok(name), Ok(domain)) => domain.zone_of(&name),
        _ => false,
    }
}
