//! Keyword-domain routing
//!
//! Both domain strategies share a [`DomainIndex`] built once from a
//! mapping of expert id to descriptor keywords. A descriptor claimed by
//! more than one expert is ambiguous: it is dropped from the lookup map
//! and never routes.

use std::collections::{HashMap, HashSet};

use crate::domain_types::ExpertId;

use super::{Router, RouterBuildError, validate_experts};

/// Expert id to descriptor keywords, as loaded from configuration
pub type DescriptorMapping = HashMap<ExpertId, Vec<String>>;

/// Descriptor lookup with ambiguity exclusion
#[derive(Debug, Clone)]
pub struct DomainIndex {
    domains: HashMap<String, ExpertId>,
    ambiguous: HashSet<String>,
}

impl DomainIndex {
    /// Builds the index, demoting any descriptor claimed twice
    #[must_use]
    pub fn build(mapping: &DescriptorMapping) -> Self {
        let mut domains: HashMap<String, ExpertId> = HashMap::new();
        let mut ambiguous: HashSet<String> = HashSet::new();
        for (expert, descriptors) in mapping {
            for descriptor in descriptors {
                if ambiguous.contains(descriptor) {
                    continue;
                }
                let owned_by_self = domains.get(descriptor).map(|owner| owner == expert);
                match owned_by_self {
                    Some(false) => {
                        domains.remove(descriptor);
                        ambiguous.insert(descriptor.clone());
                    }
                    Some(true) => {}
                    None => {
                        domains.insert(descriptor.clone(), expert.clone());
                    }
                }
            }
        }
        Self { domains, ambiguous }
    }

    /// The expert owning an unambiguous descriptor, if any
    #[must_use]
    pub fn lookup(&self, descriptor: &str) -> Option<&ExpertId> {
        self.domains.get(descriptor)
    }

    /// True iff the descriptor was claimed by more than one expert
    #[must_use]
    pub fn is_ambiguous(&self, descriptor: &str) -> bool {
        self.ambiguous.contains(descriptor)
    }
}

/// Tallies descriptor hits per expert; the highest tally wins
///
/// Ties break by registration order. All-zero tallies fall back to the
/// first registered expert.
#[derive(Debug)]
pub struct DomainRouter {
    experts: Vec<ExpertId>,
    index: DomainIndex,
}

impl DomainRouter {
    /// Creates a tally router over the experts and their descriptors
    pub fn new(
        experts: Vec<ExpertId>,
        mapping: &DescriptorMapping,
    ) -> Result<Self, RouterBuildError> {
        validate_experts(&experts)?;
        Ok(Self {
            experts,
            index: DomainIndex::build(mapping),
        })
    }
}

impl Router for DomainRouter {
    fn experts(&self) -> &[ExpertId] {
        &self.experts
    }

    fn route(&mut self, query: &str) -> ExpertId {
        let mut tallies: HashMap<&ExpertId, u32> = HashMap::new();
        for token in query.split_whitespace() {
            if let Some(expert) = self.index.lookup(token) {
                *tallies.entry(expert).or_insert(0) += 1;
            }
        }

        let mut best: Option<(usize, u32)> = None;
        for (position, expert) in self.experts.iter().enumerate() {
            let tally = tallies.get(expert).copied().unwrap_or(0);
            if best.is_none_or(|(_, top)| tally > top) {
                best = Some((position, tally));
            }
        }

        match best {
            Some((position, tally)) if tally > 0 => self.experts[position].clone(),
            _ => self.fallback(),
        }
    }
}

/// Returns the expert of the first unambiguous descriptor in the query
///
/// Tokens are scanned left to right; no hit falls back to the first
/// registered expert.
#[derive(Debug)]
pub struct FirstMatchDomainRouter {
    experts: Vec<ExpertId>,
    index: DomainIndex,
}

impl FirstMatchDomainRouter {
    /// Creates a first-match router over the experts and their descriptors
    pub fn new(
        experts: Vec<ExpertId>,
        mapping: &DescriptorMapping,
    ) -> Result<Self, RouterBuildError> {
        validate_experts(&experts)?;
        Ok(Self {
            experts,
            index: DomainIndex::build(mapping),
        })
    }
}

impl Router for FirstMatchDomainRouter {
    fn experts(&self) -> &[ExpertId] {
        &self.experts
    }

    fn route(&mut self, query: &str) -> ExpertId {
        for token in query.split_whitespace() {
            if let Some(expert) = self.index.lookup(token) {
                return expert.clone();
            }
        }
        self.fallback()
    }
}
