// src/resolver/index.rs

//! Index-backed package resolver
//!
//! Selection is greedy and deterministic: specs are grouped by package
//! name, every group picks the highest version (then highest build string)
//! satisfying all of its specs, and the picked record's `depends` are fed
//! back into the queue. A name is never selected twice; later specs for an
//! already selected name must be satisfied by that record.

use super::{PackageRecord, PackageResolver, Resolution};
use crate::error::{Error, Result};
use crate::version::{MatchSpec, PackageVersion};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use tracing::debug;

/// Resolver over a flat list of package records
#[derive(Debug, Clone, Default)]
pub struct IndexResolver {
    records: Vec<PackageRecord>,
}

impl IndexResolver {
    /// Create a resolver over the given records
    pub fn new(records: Vec<PackageRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON file containing an array of records
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read package index {}: {}", path.display(), e))
        })?;
        let records: Vec<PackageRecord> = serde_json::from_str(&content).map_err(|e| {
            Error::ParseError(format!("Invalid package index {}: {}", path.display(), e))
        })?;
        Ok(Self::new(records))
    }

    /// Add more records to the index
    pub fn extend(&mut self, records: impl IntoIterator<Item = PackageRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn satisfies_all(record: &PackageRecord, specs: &[MatchSpec]) -> Result<bool> {
        let version = match PackageVersion::parse(&record.version) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };
        for spec in specs {
            if !spec.matches(&version, &record.build)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn best_candidate(
        &self,
        name: &str,
        specs: &[MatchSpec],
        subdir: &str,
    ) -> Result<Option<&PackageRecord>> {
        let mut best: Option<(&PackageRecord, PackageVersion)> = None;

        for record in self
            .records
            .iter()
            .filter(|r| r.name == name && r.available_on(subdir))
        {
            if !Self::satisfies_all(record, specs)? {
                continue;
            }
            let version = PackageVersion::parse(&record.version)?;
            let better = match &best {
                None => true,
                Some((current, current_version)) => {
                    (&version, &record.build) > (current_version, &current.build)
                }
            };
            if better {
                best = Some((record, version));
            }
        }

        Ok(best.map(|(record, _)| record))
    }
}

impl PackageResolver for IndexResolver {
    fn resolve(&self, specs: &[MatchSpec], subdir: &str) -> Result<Resolution> {
        let mut selected: BTreeMap<String, PackageRecord> = BTreeMap::new();
        let mut unsatisfied = Vec::new();

        // Group the explicit specs so that all constraints on one name are
        // honoured together
        let mut pending: BTreeMap<String, Vec<MatchSpec>> = BTreeMap::new();
        for spec in specs {
            pending.entry(spec.name.clone()).or_default().push(spec.clone());
        }
        let mut queue: VecDeque<(String, Vec<MatchSpec>)> = pending.into_iter().collect();

        while let Some((name, group)) = queue.pop_front() {
            if let Some(existing) = selected.get(&name) {
                if !Self::satisfies_all(existing, &group)? {
                    unsatisfied.extend(group);
                }
                continue;
            }

            match self.best_candidate(&name, &group, subdir)? {
                Some(record) => {
                    debug!("Selected {} for {}", record, name);
                    let mut deps: BTreeMap<String, Vec<MatchSpec>> = BTreeMap::new();
                    for dep in &record.depends {
                        let spec = MatchSpec::parse(dep)?;
                        deps.entry(spec.name.clone()).or_default().push(spec);
                    }
                    selected.insert(name, record.clone());
                    queue.extend(deps);
                }
                None => unsatisfied.extend(group),
            }
        }

        Ok(Resolution {
            packages: selected.into_values().collect(),
            unsatisfied,
        })
    }
}
