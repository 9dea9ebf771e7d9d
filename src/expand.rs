//! Recursive expansion of SPF mechanisms into network specs.

use tracing::trace;

use crate::cidr::NetworkSpec;
use crate::dns::DnsResolver;
use crate::record::{extract_policy, tokenize, Mechanism};
use crate::SpfError;

/// RFC 7208 limit on DNS-querying mechanisms per evaluation.
pub(crate) const MAX_DNS_LOOKUPS: usize = 10;

/// Expand `policy` for `domain` into the flat, ordered list of network
/// specs it authorizes. Include expansions are inlined depth-first at the
/// point of the `include` token.
///
/// Any lookup or extraction failure aborts the whole resolution; there
/// are no partial results. Every DNS-querying mechanism draws on
/// `max_lookups`, and an include chain that revisits a domain fails
/// instead of looping.
pub(crate) async fn resolve_mechanisms<R: DnsResolver>(
    resolver: &R,
    domain: &str,
    policy: &str,
    max_lookups: usize,
) -> Result<Vec<NetworkSpec>, SpfError> {
    let mut walk = Expansion {
        resolver,
        budget: max_lookups,
        lookups: 0,
        chain: vec![domain.to_ascii_lowercase()],
    };
    let mut specs = Vec::new();
    walk.expand(domain, policy, &mut specs).await?;
    Ok(specs)
}

/// State carried across the include recursion: the lookup budget and the
/// chain of domains currently being expanded, for cycle detection.
struct Expansion<'r, R> {
    resolver: &'r R,
    budget: usize,
    lookups: usize,
    chain: Vec<String>,
}

impl<R: DnsResolver> Expansion<'_, R> {
    async fn expand(
        &mut self,
        domain: &str,
        policy: &str,
        specs: &mut Vec<NetworkSpec>,
    ) -> Result<(), SpfError> {
        for directive in tokenize(policy) {
            match directive.mechanism {
                Mechanism::Ip4(spec) | Mechanism::Ip6(spec) => specs.push(spec),

                Mechanism::Include(target) => {
                    self.count_lookup()?;
                    // tokenize lowercases mechanism values, so the chain
                    // comparison is already case-normalized.
                    if self.chain.contains(&target) {
                        return Err(SpfError::CyclicInclude(target));
                    }
                    trace!(domain = %target, "expanding include");
                    let txt = self.resolver.query_txt(&target).await?;
                    let nested = extract_policy(&txt)?;
                    self.chain.push(target.clone());
                    Box::pin(self.expand(&target, &nested, specs)).await?;
                    self.chain.pop();
                }

                Mechanism::A => {
                    self.count_lookup()?;
                    self.push_host_addresses(domain, specs).await?;
                }

                Mechanism::Mx => {
                    self.count_lookup()?;
                    let hosts = self.resolver.query_mx(domain).await?;
                    for (_, host) in hosts {
                        self.count_lookup()?;
                        self.push_host_addresses(&host, specs).await?;
                    }
                }

                Mechanism::All | Mechanism::Unknown(_) => {}
            }
        }
        Ok(())
    }

    async fn push_host_addresses(
        &self,
        host: &str,
        specs: &mut Vec<NetworkSpec>,
    ) -> Result<(), SpfError> {
        let addrs = self.resolver.query_ip(host).await?;
        for addr in addrs {
            specs.push(addr.to_string());
        }
        Ok(())
    }

    fn count_lookup(&mut self) -> Result<(), SpfError> {
        self.lookups += 1;
        if self.lookups > self.budget {
            return Err(SpfError::TooManyLookups(self.budget));
        }
        Ok(())
    }
}
