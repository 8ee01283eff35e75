//! Per-subscriber predicates (§4.4/§4.5) compiled by `cid-retriever` into SQL
//! and applied directly against in-memory payloads by `screener-server`.
//!
//! Design Notes §9 recommends a tagged-variant predicate over an "off"
//! boolean scattered across every field. We model each category as
//! [`CategoryFilter`], `Off` or `On(fields)`; within an enabled category the
//! individual subset fields still follow the "empty list means all" rule
//! from §4.4/§8, since that is the boundary behavior the spec fixes.

use serde::{Deserialize, Serialize};

use crate::entities::{Address, HexHash};

/// A category's predicate is either entirely disabled, or enabled with its
/// own subset fields (where an empty subset means "all").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter<T> {
    Off,
    On(T),
}

impl<T> CategoryFilter<T> {
    pub fn is_off(&self) -> bool {
        matches!(self, CategoryFilter::Off)
    }

    pub fn enabled(&self) -> Option<&T> {
        match self {
            CategoryFilter::Off => None,
            CategoryFilter::On(t) => Some(t),
        }
    }
}

/// Header category fields. `final_only = true` suppresses uncle CIDs (§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderFields {
    pub final_only: bool,
}

/// Transaction category fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxFields {
    pub src: Vec<Address>,
    pub dst: Vec<Address>,
}

/// Receipt category fields. The composite predicate
/// `(topic0 ∩ topic0s ≠ ∅ ∧ contract ∈ contracts) ∨ tx ∈ selected_txs`
/// is compiled in `cid-retriever` and evaluated in-memory in
/// `screener-server`; this struct only carries the subset values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptFields {
    pub topic0s: Vec<HexHash>,
    pub contracts: Vec<Address>,
}

/// State-node category fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFields {
    pub addresses: Vec<Address>,
    pub intermediate_nodes: bool,
}

/// Storage-node category fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageFields {
    pub addresses: Vec<Address>,
    pub storage_keys: Vec<HexHash>,
    pub intermediate_nodes: bool,
}

/// The full predicate set a subscriber (or a single RET call) supplies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionFilters {
    pub header: CategoryFilter<HeaderFields>,
    pub tx: CategoryFilter<TxFields>,
    pub receipt: CategoryFilter<ReceiptFields>,
    pub state: CategoryFilter<StateFields>,
    pub storage: CategoryFilter<StorageFields>,
}

impl SubscriptionFilters {
    /// Every category off. Useful as a base to toggle categories on from.
    pub fn none() -> Self {
        Self {
            header: CategoryFilter::Off,
            tx: CategoryFilter::Off,
            receipt: CategoryFilter::Off,
            state: CategoryFilter::Off,
            storage: CategoryFilter::Off,
        }
    }

    /// Every category on with empty subsets ("all" in every category, §8).
    pub fn all() -> Self {
        Self {
            header: CategoryFilter::On(HeaderFields::default()),
            tx: CategoryFilter::On(TxFields::default()),
            receipt: CategoryFilter::On(ReceiptFields::default()),
            state: CategoryFilter::On(StateFields::default()),
            storage: CategoryFilter::On(StorageFields::default()),
        }
    }

    /// Component-wise subset test used by the `RET(P1, n) ⊆ RET(P2, n)`
    /// monotonicity law (§8). `self` is `P1`, `other` is `P2`.
    pub fn is_subset_of(&self, other: &Self) -> bool {
        fn subset_vec<T: PartialEq>(a: &[T], b: &[T]) -> bool {
            // empty means "all": a narrower (non-empty) list is a subset of
            // "all" (empty), but "all" is never a subset of a narrower list.
            if b.is_empty() {
                return true;
            }
            !a.is_empty() && a.iter().all(|x| b.contains(x))
        }

        fn category_subset<T>(
            a: &CategoryFilter<T>,
            b: &CategoryFilter<T>,
            fields_subset: impl FnOnce(&T, &T) -> bool,
        ) -> bool {
            match (a, b) {
                (CategoryFilter::Off, _) => true,
                (CategoryFilter::On(_), CategoryFilter::Off) => false,
                (CategoryFilter::On(a), CategoryFilter::On(b)) => fields_subset(a, b),
            }
        }

        category_subset(&self.header, &other.header, |a, b| {
            // final_only=true is narrower (excludes uncles) than final_only=false.
            a.final_only || !b.final_only
        }) && category_subset(&self.tx, &other.tx, |a, b| {
            subset_vec(&a.src, &b.src) && subset_vec(&a.dst, &b.dst)
        }) && category_subset(&self.receipt, &other.receipt, |a, b| {
            subset_vec(&a.topic0s, &b.topic0s) && subset_vec(&a.contracts, &b.contracts)
        }) && category_subset(&self.state, &other.state, |a, b| {
            subset_vec(&a.addresses, &b.addresses) && (!a.intermediate_nodes || b.intermediate_nodes)
        }) && category_subset(&self.storage, &other.storage, |a, b| {
            subset_vec(&a.addresses, &b.addresses)
                && subset_vec(&a.storage_keys, &b.storage_keys)
                && (!a.intermediate_nodes || b.intermediate_nodes)
        })
    }
}
