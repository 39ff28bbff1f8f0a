use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::entities::school_entity as schools;

/// A school's email domain policy, used to collapse the many spellings of one
/// mailbox into a single deduplication key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPolicy {
    /// The canonical domain every alias rewrites to.
    pub primary_domain: String,
    /// Alternate domains that deliver to the same mailboxes.
    pub alias_domains: Vec<String>,
    /// Sub-address separator; the local part is truncated at its first
    /// occurrence. `None` disables tag stripping.
    pub tag: Option<String>,
    /// Whether dots in the local part are ignored (gmail-style).
    pub strip_dots: bool,
    /// Whether subdomains of the primary/alias domains count as matches.
    pub allow_subdomains: bool,
}

impl From<&schools::Model> for EmailPolicy {
    fn from(school: &schools::Model) -> Self {
        let domains: Vec<String> =
            serde_json::from_value(school.mail_domains.clone()).unwrap_or_default();
        let primary_domain = domains.first().cloned().unwrap_or_default();
        let alias_domains = domains.into_iter().skip(1).collect();
        EmailPolicy {
            primary_domain,
            alias_domains,
            tag: school.mail_tag.clone(),
            strip_dots: school.mail_dots,
            allow_subdomains: school.allow_subdomains,
        }
    }
}

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex is valid"))
}

/// Minimal syntactic check. Quoted strings, comments, and other exotic but
/// technically valid forms are rejected; that is fine for this system.
pub fn is_plausible_address(address: &str) -> bool {
    address_regex().is_match(address.trim())
}

fn domain_matches(domain: &str, candidate: &str, allow_subdomains: bool) -> bool {
    if domain == candidate {
        return true;
    }
    allow_subdomains && domain.ends_with(&format!(".{candidate}"))
}

/// Normalize an email address under a school's domain policy.
///
/// - Remove leading and trailing whitespace
/// - Convert the address to lowercase
/// - If the policy has a tag, remove it and everything after it
/// - If requested, remove dots (.) from the local part
/// - Replace the domain with the primary domain if it is an alias
///   (or a subdomain of one, when the policy allows subdomains)
///
/// The address must have been syntax-checked first; see
/// [`is_plausible_address`].
///
/// Non-ASCII characters are force-stripped from both parts before hashing
/// (yes, this merges distinct internationalized addresses; it is the
/// long-standing behavior and changing it would re-key every student).
pub fn normalize_email(address: &str, policy: &EmailPolicy) -> String {
    let address = address.trim().to_lowercase();
    let (local, domain) = match address.split_once('@') {
        Some((local, domain)) => (local.to_string(), domain.to_string()),
        None => (address, String::new()),
    };

    let mut local = local;
    if let Some(tag) = &policy.tag
        && !tag.is_empty()
        && let Some(idx) = local.find(tag.as_str())
    {
        local.truncate(idx);
    }
    if policy.strip_dots {
        local = local.replace('.', "");
    }

    let mut domain = domain;
    let is_alias = policy
        .alias_domains
        .iter()
        .any(|alias| domain_matches(&domain, alias, policy.allow_subdomains))
        || (policy.allow_subdomains
            && domain_matches(&domain, &policy.primary_domain, policy.allow_subdomains));
    if is_alias && !policy.primary_domain.is_empty() {
        domain = policy.primary_domain.clone();
    }

    let local: String = local.chars().filter(char::is_ascii).collect();
    let domain: String = domain.chars().filter(char::is_ascii).collect();
    format!("{local}@{domain}")
}

/// SHA-256 of the normalized address, hex encoded.
///
/// Internal deduplication key only. Never expose it: the input space is
/// small enough to brute-force back to an address.
pub fn hash_email(address: &str, policy: &EmailPolicy) -> String {
    hex::encode(Sha256::digest(normalize_email(address, policy).as_bytes()))
}

/// Whether an address belongs to the school after normalization.
pub fn is_valid_for_school(address: &str, policy: &EmailPolicy) -> bool {
    let normalized = normalize_email(address, policy);
    match normalized.split_once('@') {
        Some((_, domain)) => domain == policy.primary_domain,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> EmailPolicy {
        EmailPolicy {
            primary_domain: "example.com".to_string(),
            alias_domains: vec!["alias.example.com".to_string()],
            tag: Some("+".to_string()),
            strip_dots: true,
            allow_subdomains: false,
        }
    }

    #[test]
    fn test_equivalent_spellings_hash_identically() {
        let policy = test_policy();
        let emails = [
            "test@example.com",
            "test+tag@example.com",
            "te.st@example.com",
            "test@alias.example.com",
            "te.st+tag@alias.example.com",
        ];
        let hashes: std::collections::HashSet<String> =
            emails.iter().map(|e| hash_email(e, &policy)).collect();
        assert_eq!(hashes.len(), 1);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let policy = test_policy();
        let hash = hash_email("test@example.com", &policy);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let policy = test_policy();
        for address in [
            "Te.St+tag@Alias.Example.Com",
            "  test@example.com  ",
            "plain@other.org",
        ] {
            let once = normalize_email(address, &policy);
            assert_eq!(normalize_email(&once, &policy), once);
        }
    }

    #[test]
    fn test_no_tag_stripping_when_policy_has_none() {
        let mut policy = test_policy();
        policy.tag = None;
        policy.strip_dots = true;
        assert_eq!(
            normalize_email("test+tag@example.com", &policy),
            "test+tag@example.com"
        );
    }

    #[test]
    fn test_no_dot_stripping_when_disabled() {
        let mut policy = test_policy();
        policy.strip_dots = false;
        assert_eq!(
            normalize_email("test.test@example.com", &policy),
            "test.test@example.com"
        );
    }

    #[test]
    fn test_subdomain_rewrites_only_when_allowed() {
        let mut policy = test_policy();
        assert_eq!(
            normalize_email("test@cs.example.com", &policy),
            "test@cs.example.com"
        );
        policy.allow_subdomains = true;
        assert_eq!(
            normalize_email("test@cs.example.com", &policy),
            "test@example.com"
        );
        assert_eq!(
            normalize_email("test@cs.alias.example.com", &policy),
            "test@example.com"
        );
    }

    #[test]
    fn test_non_ascii_is_force_stripped() {
        let policy = test_policy();
        assert_eq!(
            normalize_email("tëst@exämple.com", &policy),
            "tst@exmple.com"
        );
    }

    #[test]
    fn test_is_valid_for_school() {
        let policy = test_policy();
        assert!(is_valid_for_school("test@example.com", &policy));
        assert!(is_valid_for_school("test@alias.example.com", &policy));
        assert!(!is_valid_for_school("test@nope.com", &policy));
    }

    #[test]
    fn test_is_plausible_address() {
        assert!(is_plausible_address("alice@test.edu"));
        assert!(!is_plausible_address("not-an-address"));
        assert!(!is_plausible_address("two@at@signs"));
        assert!(!is_plausible_address("missing@tld"));
    }
}
