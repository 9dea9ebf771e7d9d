//! Validation orchestration: cache, policy extraction, expansion,
//! membership.

use tracing::debug;

use crate::cache::PolicyCache;
use crate::cidr;
use crate::dns::{DnsError, DnsResolver};
use crate::expand::{resolve_mechanisms, MAX_DNS_LOOKUPS};
use crate::record::extract_policy;
use crate::SpfError;

/// SPF checker with a per-instance policy cache.
///
/// One instance can be shared across tasks; the cache locks internally.
/// Tests should construct their own instances over a mock resolver rather
/// than going through the process-wide default checker.
pub struct SpfChecker<R: DnsResolver> {
    resolver: R,
    cache: PolicyCache,
    max_lookups: usize,
}

impl<R: DnsResolver> SpfChecker<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            cache: PolicyCache::new(),
            max_lookups: MAX_DNS_LOOKUPS,
        }
    }

    /// Override the per-evaluation DNS lookup budget (RFC 7208 says 10).
    pub fn max_lookups(mut self, n: usize) -> Self {
        self.max_lookups = n;
        self
    }

    /// Whether `ip` is authorized to send mail on behalf of `domain`.
    ///
    /// A domain that publishes no SPF policy validates as allowed — there
    /// is nothing to enforce. Every other lookup or parse failure returns
    /// an error with no partial result.
    pub async fn validate(&self, ip: &str, domain: &str) -> Result<bool, SpfError> {
        let domain = normalize(domain);

        let policy = match self.cache.get(&domain) {
            Some(policy) => {
                debug!(%domain, "spf policy cache hit");
                policy
            }
            None => match self.fetch_policy(&domain).await {
                Ok(policy) => {
                    self.cache.put(&domain, policy.clone());
                    policy
                }
                // No published policy means nothing to enforce. This maps
                // only the top-level extraction; a missing policy inside
                // an include expansion stays an error.
                Err(SpfError::NoPolicy) | Err(SpfError::Dns(DnsError::NoRecords)) => {
                    debug!(%domain, "no spf policy published, sender allowed");
                    return Ok(true);
                }
                Err(e) => return Err(e),
            },
        };

        let specs =
            resolve_mechanisms(&self.resolver, &domain, &policy, self.max_lookups).await?;
        debug!(%domain, specs = specs.len(), "resolved spf policy");
        cidr::contains(ip, &specs)
    }

    async fn fetch_policy(&self, domain: &str) -> Result<String, SpfError> {
        let txt = self.resolver.query_txt(domain).await?;
        extract_policy(&txt)
    }

    /// Drop every cached policy; the next validation per domain performs
    /// a fresh TXT lookup.
    pub fn dump_cache(&self) {
        self.cache.clear();
    }
}

/// Normalize a domain: lowercase + strip trailing dot.
fn normalize(domain: &str) -> String {
    let d = domain.to_ascii_lowercase();
    d.strip_suffix('.').unwrap_or(&d).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::MockResolver;

    fn checker_with(setup: impl FnOnce(&MockResolver)) -> SpfChecker<MockResolver> {
        let resolver = MockResolver::new();
        setup(&resolver);
        SpfChecker::new(resolver)
    }

    // ---- policy presence ----

    #[tokio::test]
    async fn no_policy_allows() {
        let checker = checker_with(|r| {
            r.add_txt("example.com", vec!["google-site-verification=abc".to_string()]);
        });
        assert!(checker.validate("1.2.3.4", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn no_txt_records_at_all_allows() {
        let checker = checker_with(|_| {});
        assert!(checker.validate("1.2.3.4", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn ambiguous_policy_rejects() {
        let checker = checker_with(|r| {
            r.add_txt(
                "example.com",
                vec!["v=spf1 +all".to_string(), "v=spf1 -all".to_string()],
            );
        });
        let err = checker.validate("1.2.3.4", "example.com").await.unwrap_err();
        assert_eq!(err, SpfError::AmbiguousPolicy);
    }

    #[tokio::test]
    async fn dns_failure_is_an_error() {
        let checker = checker_with(|r| r.set_nxdomain("example.com"));
        let err = checker.validate("1.2.3.4", "example.com").await.unwrap_err();
        assert_eq!(err, SpfError::Dns(DnsError::NxDomain));
    }

    // ---- membership ----

    #[tokio::test]
    async fn cidr_mechanism_present_allows_member() {
        let checker = checker_with(|r| {
            r.add_txt(
                "example.com",
                vec!["v=spf1 ip4:93.95.224.0/24 -all".to_string()],
            );
        });
        assert!(checker.validate("93.95.224.70", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn cidr_mechanism_absent_denies() {
        let checker = checker_with(|r| {
            r.add_txt("example.com", vec!["v=spf1 ip4:10.0.0.0/8 -all".to_string()]);
        });
        assert!(!checker.validate("93.95.224.70", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn bare_ip_mechanism_is_host_network() {
        let checker = checker_with(|r| {
            r.add_txt("example.com", vec!["v=spf1 ip4:93.95.224.70 -all".to_string()]);
        });
        assert!(checker.validate("93.95.224.70", "example.com").await.unwrap());
        // Same /24, different host: denied.
        assert!(!checker.validate("93.95.224.71", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn ip6_mechanism() {
        let checker = checker_with(|r| {
            r.add_txt("example.com", vec!["v=spf1 ip6:2001:db8::/32 -all".to_string()]);
        });
        assert!(checker.validate("2001:db8::1", "example.com").await.unwrap());
        assert!(!checker.validate("2001:db9::1", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn include_recursion_allows_nested_network() {
        let checker = checker_with(|r| {
            r.add_txt(
                "example.com",
                vec!["v=spf1 include:other.example -all".to_string()],
            );
            r.add_txt("other.example", vec!["v=spf1 ip4:10.0.0.0/8".to_string()]);
        });
        assert!(checker.validate("10.20.30.40", "example.com").await.unwrap());
        assert!(!checker.validate("11.0.0.1", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn include_target_without_policy_is_an_error() {
        let checker = checker_with(|r| {
            r.add_txt(
                "example.com",
                vec!["v=spf1 include:empty.example -all".to_string()],
            );
        });
        let err = checker.validate("1.2.3.4", "example.com").await.unwrap_err();
        assert_eq!(err, SpfError::NoPolicy);
    }

    #[tokio::test]
    async fn a_and_mx_mechanisms() {
        let checker = checker_with(|r| {
            r.add_txt("example.com", vec!["v=spf1 a mx -all".to_string()]);
            r.add_ip("example.com", vec!["198.51.100.1".parse().unwrap()]);
            r.add_mx("example.com", vec![(10, "mail.example.com".to_string())]);
            r.add_ip("mail.example.com", vec!["198.51.100.2".parse().unwrap()]);
        });
        assert!(checker.validate("198.51.100.1", "example.com").await.unwrap());
        assert!(checker.validate("198.51.100.2", "example.com").await.unwrap());
        assert!(!checker.validate("198.51.100.3", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn malformed_mechanism_value_is_an_error() {
        let checker = checker_with(|r| {
            r.add_txt("example.com", vec!["v=spf1 ip4:bogus -all".to_string()]);
        });
        let err = checker.validate("1.2.3.4", "example.com").await.unwrap_err();
        assert_eq!(err, SpfError::MalformedNetworkSpec("bogus".to_string()));
    }

    // ---- cache behavior ----

    #[tokio::test]
    async fn cache_skips_repeat_txt_lookups() {
        let resolver = MockResolver::new();
        resolver.add_txt("example.com", vec!["v=spf1 ip4:10.0.0.0/8".to_string()]);
        let checker = SpfChecker::new(resolver.clone());

        let first = checker.validate("10.0.0.1", "example.com").await.unwrap();
        let second = checker.validate("10.0.0.1", "example.com").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.txt_queries(), 1);
    }

    #[tokio::test]
    async fn dump_cache_forces_fresh_lookup() {
        let resolver = MockResolver::new();
        resolver.add_txt("example.com", vec!["v=spf1 ip4:10.0.0.0/8".to_string()]);
        let checker = SpfChecker::new(resolver.clone());

        checker.validate("10.0.0.1", "example.com").await.unwrap();
        checker.dump_cache();
        checker.validate("10.0.0.1", "example.com").await.unwrap();
        assert_eq!(resolver.txt_queries(), 2);
    }

    #[tokio::test]
    async fn no_policy_outcome_is_not_cached() {
        // A domain may publish a policy later; only extracted policies
        // are memoized.
        let resolver = MockResolver::new();
        let checker = SpfChecker::new(resolver.clone());

        assert!(checker.validate("1.2.3.4", "example.com").await.unwrap());
        resolver.add_txt("example.com", vec!["v=spf1 -all".to_string()]);
        assert!(!checker.validate("1.2.3.4", "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn domain_lookup_is_case_insensitive() {
        let resolver = MockResolver::new();
        resolver.add_txt("example.com", vec!["v=spf1 ip4:10.0.0.0/8".to_string()]);
        let checker = SpfChecker::new(resolver.clone());

        assert!(checker.validate("10.0.0.1", "Example.COM").await.unwrap());
        // Same cache entry as the lowercase form.
        checker.validate("10.0.0.1", "example.com.").await.unwrap();
        assert_eq!(resolver.txt_queries(), 1);
    }

    #[tokio::test]
    async fn lookup_budget_override() {
        let resolver = MockResolver::new();
        resolver.add_txt("example.com", vec!["v=spf1 a a a".to_string()]);
        let checker = SpfChecker::new(resolver).max_lookups(2);

        let err = checker.validate("1.2.3.4", "example.com").await.unwrap_err();
        assert_eq!(err, SpfError::TooManyLookups(2));
    }
}
