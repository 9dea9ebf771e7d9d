//! SPF policy extraction and directive parsing.

use std::fmt;

use crate::SpfError;

/// Qualifier prefix on a directive. Defaults to Pass when omitted.
///
/// Qualifiers are parsed and carried on every directive but not honored
/// during expansion: resolution allow-lists positive mechanisms only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Pass,     // +
    Fail,     // -
    SoftFail, // ~
    Neutral,  // ?
}

impl Qualifier {
    /// Parse a single-char qualifier prefix. Returns (Qualifier, remaining str).
    fn parse_prefix(s: &str) -> (Qualifier, &str) {
        match s.as_bytes().first() {
            Some(b'+') => (Qualifier::Pass, &s[1..]),
            Some(b'-') => (Qualifier::Fail, &s[1..]),
            Some(b'~') => (Qualifier::SoftFail, &s[1..]),
            Some(b'?') => (Qualifier::Neutral, &s[1..]),
            _ => (Qualifier::Pass, s),
        }
    }
}

/// One whitespace-delimited SPF mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    /// `ip4:<addr[/prefix]>` — the value is carried verbatim as a network spec.
    Ip4(String),
    /// `ip6:<addr[/prefix]>`
    Ip6(String),
    /// `include:<domain>`
    Include(String),
    /// `a` — addresses of the current evaluation domain.
    A,
    /// `mx` — addresses of the current domain's MX hosts.
    Mx,
    /// `all`
    All,
    /// Any other token (unknown mechanisms, modifiers). Carried so
    /// expansion can skip it explicitly.
    Unknown(String),
}

/// A directive = qualifier + mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub qualifier: Qualifier,
    pub mechanism: Mechanism,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::Ip4(spec) => write!(f, "ip4:{spec}"),
            Mechanism::Ip6(spec) => write!(f, "ip6:{spec}"),
            Mechanism::Include(domain) => write!(f, "include:{domain}"),
            Mechanism::A => write!(f, "a"),
            Mechanism::Mx => write!(f, "mx"),
            Mechanism::All => write!(f, "all"),
            Mechanism::Unknown(token) => write!(f, "{token}"),
        }
    }
}

/// Pick the single SPF policy out of a domain's TXT record set.
///
/// Exactly one `v=spf1` record may exist: zero is [`SpfError::NoPolicy`],
/// more than one is [`SpfError::AmbiguousPolicy`] (ambiguous records are
/// rejected, never merged).
pub fn extract_policy(txt_records: &[String]) -> Result<String, SpfError> {
    let mut matches = txt_records.iter().filter(|r| is_spf_record(r));
    match (matches.next(), matches.next()) {
        (Some(policy), None) => Ok(policy.clone()),
        (Some(_), Some(_)) => Err(SpfError::AmbiguousPolicy),
        (None, _) => Err(SpfError::NoPolicy),
    }
}

/// A TXT record is an SPF policy when it is exactly `v=spf1` or starts
/// with `v=spf1 ` (case-insensitive).
fn is_spf_record(txt: &str) -> bool {
    let lower = txt.to_ascii_lowercase();
    lower == "v=spf1" || lower.starts_with("v=spf1 ")
}

/// Tokenize a policy string into directives, in record order.
///
/// Splits on whitespace, dropping empty tokens and the `v=spf1` version
/// tag. Tokenization never fails: tokens that match no known mechanism
/// come back as [`Mechanism::Unknown`].
pub fn tokenize(policy: &str) -> Vec<Directive> {
    policy
        .split_whitespace()
        .filter(|token| !token.eq_ignore_ascii_case("v=spf1"))
        .map(|token| {
            let (qualifier, term) = Qualifier::parse_prefix(token);
            Directive {
                qualifier,
                mechanism: parse_mechanism(term),
            }
        })
        .collect()
}

fn parse_mechanism(term: &str) -> Mechanism {
    let lower = term.to_ascii_lowercase();
    match lower.as_str() {
        "all" => return Mechanism::All,
        "a" => return Mechanism::A,
        "mx" => return Mechanism::Mx,
        _ => {}
    }
    if let Some(spec) = lower.strip_prefix("ip4:") {
        return Mechanism::Ip4(spec.to_string());
    }
    if let Some(spec) = lower.strip_prefix("ip6:") {
        return Mechanism::Ip6(spec.to_string());
    }
    if let Some(domain) = lower.strip_prefix("include:") {
        return Mechanism::Include(domain.to_string());
    }
    Mechanism::Unknown(term.to_string())
}
