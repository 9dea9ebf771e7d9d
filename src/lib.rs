//! SPF (Sender Policy Framework) validation: resolve a domain's published
//! sending policy from DNS TXT records and test whether a sender IP is
//! authorized by it.
//!
//! DNS access goes through the [`DnsResolver`] trait — implement it to
//! bring your own resolver, or use the bundled [`HickoryResolver`].
//! Resolved policies are cached in memory per domain, for the life of the
//! checker, until [`SpfChecker::dump_cache`] is called.
//!
//! The crate-level [`validate`] and [`dump_cache`] functions operate on a
//! process-wide default checker over the system DNS configuration:
//!
//! ```no_run
//! # async fn run() -> Result<(), spfcheck::SpfError> {
//! let domain = spfcheck::domain_from_email("Cathal <cathal@garvey.me>")?;
//! let allowed = spfcheck::validate("93.95.224.70", &domain).await?;
//! # Ok(()) }
//! ```
//!
//! Only the allow-listing side of SPF is implemented: positive `ip4`,
//! `ip6`, `include`, `a`, and `mx` mechanisms expand into network ranges
//! and the sender IP is tested for membership. Qualifiers are parsed but
//! not enforced, and `exists`, `redirect`, `ptr`, and macro expansion are
//! out of scope.

mod address;
mod cache;
mod checker;
mod cidr;
mod dns;
mod expand;
mod record;

use std::sync::OnceLock;

use thiserror::Error;

pub use address::domain_from_email;
pub use checker::SpfChecker;
pub use cidr::{contains, NetworkSpec};
pub use dns::{DnsError, DnsResolver, HickoryResolver, MockResolver};
pub use record::{extract_policy, tokenize, Directive, Mechanism, Qualifier};

/// Errors surfaced by SPF validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpfError {
    /// The input could not be parsed as an email address.
    #[error("invalid email address: {0:?}")]
    InvalidAddress(String),
    /// No `v=spf1` TXT record is published for the domain. Never surfaced
    /// by [`validate`]: a missing top-level policy validates as allowed.
    #[error("no SPF policy found")]
    NoPolicy,
    /// More than one `v=spf1` TXT record is published; the policy is
    /// ambiguous and is rejected rather than merged.
    #[error("multiple SPF policies found")]
    AmbiguousPolicy,
    /// The underlying DNS lookup failed.
    #[error("dns lookup failed: {0}")]
    Dns(#[from] DnsError),
    /// A network spec collected during expansion does not parse as an IP
    /// address or CIDR block.
    #[error("malformed network spec: {0:?}")]
    MalformedNetworkSpec(String),
    /// The candidate sender IP does not parse.
    #[error("invalid sender ip: {0:?}")]
    InvalidIp(String),
    /// Expansion exceeded the DNS lookup budget.
    #[error("spf resolution exceeded {0} DNS lookups")]
    TooManyLookups(usize),
    /// An include chain revisited a domain it is already expanding.
    #[error("cyclic spf include of {0:?}")]
    CyclicInclude(String),
}

static DEFAULT_CHECKER: OnceLock<SpfChecker<HickoryResolver>> = OnceLock::new();

fn default_checker() -> &'static SpfChecker<HickoryResolver> {
    DEFAULT_CHECKER.get_or_init(|| SpfChecker::new(HickoryResolver::default()))
}

/// Whether `ip` is authorized to send mail on behalf of `domain`,
/// validated against the process-wide default checker.
///
/// Policies are cached in memory per domain; heavy use across many unique
/// domains grows the cache until [`dump_cache`] is called. Construct an
/// [`SpfChecker`] directly for an isolated cache or a custom resolver.
pub async fn validate(ip: &str, domain: &str) -> Result<bool, SpfError> {
    default_checker().validate(ip, domain).await
}

/// Reset the default checker's policy cache to empty.
pub fn dump_cache() {
    if let Some(checker) = DEFAULT_CHECKER.get() {
        checker.dump_cache();
    }
}
