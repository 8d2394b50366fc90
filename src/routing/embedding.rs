//! Embedding-similarity routing
//!
//! Routes by cosine similarity between the query embedding and per-expert
//! anchor embeddings computed once from the expert labels. The router only
//! depends on the [`Encoder`] seam; what produces the vectors is not its
//! concern. An MRU queue of experts doubles as the tie-breaker and as a
//! round-robin for empty queries.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::domain_types::ExpertId;

use super::{Router, RouterBuildError, validate_experts};

/// Text to unit-norm vector of a fixed dimension
pub trait Encoder: Send + Sync {
    /// Encodes the text; the returned vector must be unit-norm
    fn encode(&self, text: &str) -> Vec<f32>;
}

/// Dot product of two unit vectors
///
/// Vectors are assumed normalized; extra components on either side are
/// ignored.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Anchor-based cosine router with an MRU tie-breaker
#[derive(Debug)]
pub struct EmbeddingRouter {
    experts: Vec<ExpertId>,
    encoder: Arc<dyn Encoder>,
    anchors: HashMap<ExpertId, Vec<f32>>,
    mru: VecDeque<ExpertId>,
}

impl std::fmt::Debug for dyn Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Encoder")
    }
}

impl EmbeddingRouter {
    /// Creates the router, computing one anchor per expert label
    pub fn new(
        experts: Vec<ExpertId>,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self, RouterBuildError> {
        validate_experts(&experts)?;
        let anchors = experts
            .iter()
            .map(|expert| (expert.clone(), encoder.encode(expert.as_str())))
            .collect();
        let mru = experts.iter().cloned().collect();
        Ok(Self {
            experts,
            encoder,
            anchors,
            mru,
        })
    }

    /// The current MRU order, most recent first
    #[must_use]
    pub fn mru_order(&self) -> Vec<ExpertId> {
        self.mru.iter().cloned().collect()
    }

    /// Moves the expert to the MRU head
    fn touch(&mut self, expert: &ExpertId) {
        if let Some(position) = self.mru.iter().position(|e| e == expert) {
            if let Some(found) = self.mru.remove(position) {
                self.mru.push_front(found);
            }
        }
    }
}

impl Router for EmbeddingRouter {
    fn experts(&self) -> &[ExpertId] {
        &self.experts
    }

    fn route(&mut self, query: &str) -> ExpertId {
        if query.is_empty() {
            // Rotate: the head goes to the tail and the next expert in
            // MRU order is served.
            if let Some(head) = self.mru.pop_front() {
                self.mru.push_back(head);
            }
            if let Some(next) = self.mru.front() {
                return next.clone();
            }
            return self.fallback();
        }

        let query_vec = self.encoder.encode(query);
        let mut best: Option<(ExpertId, f32)> = None;
        for expert in &self.mru {
            let Some(anchor) = self.anchors.get(expert) else {
                continue;
            };
            let score = cosine_similarity(&query_vec, anchor);
            // Strict comparison keeps the leftmost (most recently used)
            // expert on ties.
            if best.as_ref().is_none_or(|(_, top)| score > *top) {
                best = Some((expert.clone(), score));
            }
        }

        match best {
            Some((winner, _)) => {
                self.touch(&winner);
                winner
            }
            None => self.fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ExpertId {
        ExpertId::try_new(s.to_string()).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<ExpertId> {
        names.iter().map(|n| id(n)).collect()
    }

    /// Dictionary-backed encoder: known words map to fixed unit vectors,
    /// anything else to the zero vector.
    struct FakeEncoder(HashMap<String, Vec<f32>>);

    impl FakeEncoder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Arc<Self> {
            Arc::new(Self(
                entries
                    .iter()
                    .map(|(word, vec)| ((*word).to_string(), vec.clone()))
                    .collect(),
            ))
        }
    }

    impl Encoder for FakeEncoder {
        fn encode(&self, text: &str) -> Vec<f32> {
            self.0.get(text).cloned().unwrap_or_else(|| vec![0.0; 3])
        }
    }

    fn axis_encoder() -> Arc<FakeEncoder> {
        FakeEncoder::new(&[
            ("A", vec![1.0, 0.0, 0.0]),
            ("B", vec![0.0, 1.0, 0.0]),
            ("C", vec![0.0, 0.0, 1.0]),
            ("query-a", vec![1.0, 0.0, 0.0]),
            ("query-b", vec![0.0, 1.0, 0.0]),
        ])
    }

    #[test]
    fn cosine_of_unit_vectors_is_their_dot() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn routes_to_closest_anchor_and_updates_mru() {
        let mut router = EmbeddingRouter::new(ids(&["A", "B", "C"]), axis_encoder()).unwrap();
        assert_eq!(router.route("query-a").to_string(), "A");
        assert_eq!(router.mru_order(), ids(&["A", "B", "C"]));

        assert_eq!(router.route("query-b").to_string(), "B");
        assert_eq!(router.mru_order(), ids(&["B", "A", "C"]));
    }

    #[test]
    fn empty_query_round_robins_through_the_mru() {
        let mut router = EmbeddingRouter::new(ids(&["A", "B", "C"]), axis_encoder()).unwrap();
        assert_eq!(router.route("query-a").to_string(), "A");
        // Rotation serves the remaining experts in MRU order.
        assert_eq!(router.route("").to_string(), "B");
        assert_eq!(router.route("").to_string(), "C");
        assert_eq!(router.route("").to_string(), "A");
    }

    #[test]
    fn zero_vector_query_ties_break_by_mru_order() {
        let mut router = EmbeddingRouter::new(ids(&["A", "B", "C"]), axis_encoder()).unwrap();
        // Unknown text encodes to the zero vector: every anchor scores 0,
        // so the MRU head wins.
        assert_eq!(router.route("unknown words").to_string(), "A");
        assert_eq!(router.route("query-b").to_string(), "B");
        assert_eq!(router.route("more unknown words").to_string(), "B");
    }

    #[test]
    fn anchors_are_computed_once_per_label() {
        let router = EmbeddingRouter::new(ids(&["A", "B"]), axis_encoder()).unwrap();
        assert_eq!(router.anchors.len(), 2);
        assert_eq!(router.anchors[&id("A")], vec![1.0, 0.0, 0.0]);
    }
}
