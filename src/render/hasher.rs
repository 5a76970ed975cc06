// src/render/hasher.rs

//! Dependency hash for build strings
//!
//! The hash identifies the finalized dependency set of a package so that
//! two variants built against different host environments never share a
//! build string. Input is canonical JSON of ordered maps and sorted lists;
//! nothing about evaluation order, time or environment leaks in.

use crate::error::Result;
use crate::hash::{hash_canonical, HashAlgorithm};
use crate::recipe::PinDepends;
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of hex digits kept in the hash token
pub const HASH_DIGITS: usize = 7;

#[derive(Serialize)]
struct HashInput<'a> {
    requirements: BTreeMap<&'a str, Vec<String>>,
    pin_depends: Option<&'a str>,
}

/// Computes the `h<7 hex>` token from finalized requirements
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyHasher {
    include_build: bool,
}

impl DependencyHasher {
    /// Create a hasher; `include_build` adds build-phase requirements to
    /// the input
    pub fn new(include_build: bool) -> Self {
        Self { include_build }
    }

    fn normalize(requirements: &[String]) -> Vec<String> {
        let mut normalized: Vec<String> = requirements
            .iter()
            .map(|r| r.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|r| !r.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        normalized
    }

    /// Hash finalized requirements
    pub fn hash(
        &self,
        build: &[String],
        host: &[String],
        run: &[String],
        pin_depends: Option<PinDepends>,
    ) -> Result<String> {
        let mut requirements = BTreeMap::new();
        if self.include_build {
            requirements.insert("build", Self::normalize(build));
        }
        requirements.insert("host", Self::normalize(host));
        requirements.insert("run", Self::normalize(run));

        let input = HashInput {
            requirements,
            pin_depends: pin_depends.map(|p| p.as_str()),
        };

        let hash = hash_canonical(HashAlgorithm::Sha256, &input)?;
        Ok(format!("h{}", hash.prefix(HASH_DIGITS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reqs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hash_shape() {
        let token = DependencyHasher::default()
            .hash(&[], &reqs(&["python 3.6.5 0"]), &reqs(&["python >=3.6,<3.7.0a0"]), None)
            .unwrap();
        assert_eq!(token.len(), 1 + HASH_DIGITS);
        assert!(token.starts_with('h'));
        assert!(token[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_is_order_and_whitespace_independent() {
        let hasher = DependencyHasher::default();
        let a = hasher
            .hash(&[], &reqs(&["zlib 1.2.8 0", "python 3.6.5 0"]), &reqs(&["zlib"]), None)
            .unwrap();
        let b = hasher
            .hash(&[], &reqs(&["python  3.6.5 0", "zlib 1.2.8 0"]), &reqs(&["zlib"]), None)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_changes_with_host_env() {
        let hasher = DependencyHasher::default();
        let py27 = hasher.hash(&[], &reqs(&["python 2.7.15 0"]), &[], None).unwrap();
        let py36 = hasher.hash(&[], &reqs(&["python 3.6.5 0"]), &[], None).unwrap();
        assert_ne!(py27, py36);
    }

    #[test]
    fn test_build_requirements_only_count_when_enabled() {
        let host = reqs(&["zlib 1.2.8 0"]);
        let make3 = reqs(&["make 3.82 0"]);
        let make4 = reqs(&["make 4.2 0"]);

        let default = DependencyHasher::default();
        assert_eq!(
            default.hash(&make3, &host, &[], None).unwrap(),
            default.hash(&make4, &host, &[], None).unwrap()
        );

        let with_build = DependencyHasher::new(true);
        assert_ne!(
            with_build.hash(&make3, &host, &[], None).unwrap(),
            with_build.hash(&make4, &host, &[], None).unwrap()
        );
    }

    #[test]
    fn test_pin_depends_changes_hash() {
        let hasher = DependencyHasher::default();
        let run = reqs(&["python 3.6.5 0"]);
        let none = hasher.hash(&[], &[], &run, None).unwrap();
        let strict = hasher.hash(&[], &[], &run, Some(PinDepends::Strict)).unwrap();
        assert_ne!(none, strict);
    }
}
