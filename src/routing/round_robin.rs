//! Naive round-robin routing

use crate::domain_types::ExpertId;

use super::{Router, RouterBuildError, validate_experts};

/// Cycles through the experts in registration order, wrapping
#[derive(Debug)]
pub struct RoundRobinRouter {
    experts: Vec<ExpertId>,
    cursor: usize,
}

impl RoundRobinRouter {
    /// Creates a round-robin router over the given experts
    pub fn new(experts: Vec<ExpertId>) -> Result<Self, RouterBuildError> {
        validate_experts(&experts)?;
        Ok(Self { experts, cursor: 0 })
    }
}

impl Router for RoundRobinRouter {
    fn experts(&self) -> &[ExpertId] {
        &self.experts
    }

    fn route(&mut self, _query: &str) -> ExpertId {
        let expert = self.experts[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.experts.len();
        expert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ExpertId> {
        names
            .iter()
            .map(|n| ExpertId::try_new((*n).to_string()).unwrap())
            .collect()
    }

    #[test]
    fn cycles_in_registration_order() {
        let mut router = RoundRobinRouter::new(ids(&["a", "b", "c"])).unwrap();
        let picks: Vec<String> = (0..7).map(|_| router.route("q").to_string()).collect();
        assert_eq!(picks, ["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn single_expert_always_wins() {
        let mut router = RoundRobinRouter::new(ids(&["only"])).unwrap();
        assert_eq!(router.route("x").to_string(), "only");
        assert_eq!(router.route("").to_string(), "only");
    }
}
