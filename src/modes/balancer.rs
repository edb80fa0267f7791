/// Candidate ordering strategies for endpoint selection
use crate::core::Endpoint;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Produces the traversal order the dispatcher walks for one selection
pub trait CandidateStrategy: Send + Sync {
    /// Order the endpoints of a role-set into a candidate list
    fn candidates<'a>(&self, endpoints: &[&'a Endpoint]) -> Vec<&'a Endpoint>;

    fn name(&self) -> &'static str;
}

/// Weight-expanded uniform shuffle.
///
/// Every endpoint of weight `w` is repeated `w` times before the list is
/// shuffled, so the first candidate is endpoint `e` with probability
/// `w_e / total weight`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedShuffle;

impl WeightedShuffle {
    pub fn new() -> Self {
        Self
    }

    /// Shuffle with a caller-provided random source
    pub fn candidates_with<'a, R: Rng + ?Sized>(
        &self,
        endpoints: &[&'a Endpoint],
        rng: &mut R,
    ) -> Vec<&'a Endpoint> {
        let mut expanded = expand(endpoints);
        expanded.shuffle(rng);
        expanded
    }
}

impl CandidateStrategy for WeightedShuffle {
    fn candidates<'a>(&self, endpoints: &[&'a Endpoint]) -> Vec<&'a Endpoint> {
        self.candidates_with(endpoints, &mut rand::thread_rng())
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

/// Configuration order, each endpoint once, weight ignored
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityOrder;

impl PriorityOrder {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateStrategy for PriorityOrder {
    fn candidates<'a>(&self, endpoints: &[&'a Endpoint]) -> Vec<&'a Endpoint> {
        endpoints.to_vec()
    }

    fn name(&self) -> &'static str {
        "ordered"
    }
}

/// Repeat each endpoint as many times as its weight, keeping order
pub fn expand<'a>(endpoints: &[&'a Endpoint]) -> Vec<&'a Endpoint> {
    let total_weight: usize = endpoints.iter().map(|e| e.weight as usize).sum();
    let mut expanded = Vec::with_capacity(total_weight);

    for endpoint in endpoints {
        for _ in 0..endpoint.weight {
            expanded.push(*endpoint);
        }
    }

    expanded
}

/// Strategy selector used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Weighted,
    Ordered,
}

impl Selection {
    pub fn strategy(self) -> Box<dyn CandidateStrategy> {
        match self {
            Selection::Weighted => Box::new(WeightedShuffle::new()),
            Selection::Ordered => Box::new(PriorityOrder::new()),
        }
    }
}
