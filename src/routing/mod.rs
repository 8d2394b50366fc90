//! Routing strategies
//!
//! Every strategy implements the single-method [`Router`] contract:
//! `route(query) -> expert_id`, always returning a registered expert.
//! Strategies are pure apart from their own internal state (round-robin
//! cursor, MRU queue) and are hot-swappable through the dispatcher.

mod domain;
mod embedding;
mod load_aware;
mod round_robin;

pub use domain::{DescriptorMapping, DomainIndex, DomainRouter, FirstMatchDomainRouter};
pub use embedding::{EmbeddingRouter, Encoder, cosine_similarity};
pub use load_aware::LoadAwareRouter;
pub use round_robin::RoundRobinRouter;

use thiserror::Error;

use crate::domain_types::ExpertId;

/// Errors raised while constructing a router
#[derive(Debug, Error)]
pub enum RouterBuildError {
    /// Routers need at least one expert to ever return one
    #[error("router requires at least one expert")]
    NoExperts,

    /// The same id appeared twice in the expert list
    #[error("duplicate expert id: {expert_id}")]
    DuplicateExpert {
        /// The repeated id
        expert_id: ExpertId,
    },
}

/// A routing policy: produces a registered expert id for any query
///
/// Implementations are not required to be thread-safe; the dispatcher
/// serializes access to the active router.
pub trait Router: Send {
    /// The registered experts, in registration order
    fn experts(&self) -> &[ExpertId];

    /// Picks an expert for the query
    ///
    /// Must return a registered expert for every input, including the
    /// empty string.
    fn route(&mut self, query: &str) -> ExpertId;

    /// Degenerate-input escape hatch: the first registered expert
    fn fallback(&mut self) -> ExpertId {
        self.experts()
            .first()
            .cloned()
            .expect("router constructed with at least one expert")
    }
}

/// Rejects empty or duplicated expert lists
pub(crate) fn validate_experts(experts: &[ExpertId]) -> Result<(), RouterBuildError> {
    if experts.is_empty() {
        return Err(RouterBuildError::NoExperts);
    }
    let mut seen = std::collections::HashSet::new();
    for expert in experts {
        if !seen.insert(expert) {
            return Err(RouterBuildError::DuplicateExpert {
                expert_id: expert.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ExpertId {
        ExpertId::try_new(s.to_string()).unwrap()
    }

    #[test]
    fn empty_expert_list_is_rejected() {
        assert!(matches!(
            validate_experts(&[]),
            Err(RouterBuildError::NoExperts)
        ));
    }

    #[test]
    fn duplicate_expert_is_rejected() {
        let err = validate_experts(&[id("a"), id("b"), id("a")]).unwrap_err();
        assert!(matches!(err, RouterBuildError::DuplicateExpert { expert_id } if expert_id == id("a")));
    }

    #[test]
    fn unique_experts_pass() {
        assert!(validate_experts(&[id("a"), id("b")]).is_ok());
    }
}
