//! Flat inner-product index over signal embeddings.
//!
//! The index is a derived projection of the embedded signals: entries are
//! kept in insertion order and searched exhaustively. There is no in-place
//! update or removal; the owner rebuilds it whenever records are replaced
//! or deleted.

use std::cmp::Ordering;

use crate::domain::errors::{DomainError, DomainResult};

/// Exhaustive inner-product index keyed by signal id.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<(String, Vec<f32>)>,
    dimension: Option<usize>,
}

impl VectorIndex {
    /// Empty index with no dimension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no vector.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension fixed by the first vector, if any has been added.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Check a vector against the index dimension without inserting it.
    pub fn check_dimension(&self, vector: &[f32]) -> DomainResult<()> {
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(DomainError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Append a vector without disturbing existing entries.
    pub fn add(&mut self, id: impl Into<String>, vector: Vec<f32>) -> DomainResult<()> {
        if vector.is_empty() {
            return Err(DomainError::ValidationFailed(
                "Cannot index an empty vector".to_string(),
            ));
        }
        self.check_dimension(&vector)?;
        self.dimension.get_or_insert(vector.len());
        self.entries.push((id.into(), vector));
        Ok(())
    }

    /// Replace the whole index with the given entries, in order.
    ///
    /// On error the index is left empty.
    pub fn rebuild<I>(&mut self, entries: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        self.clear();
        for (id, vector) in entries {
            if let Err(err) = self.add(id, vector) {
                self.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Drop every entry and unlock the dimension.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dimension = None;
    }

    /// Up to `k` `(id, similarity)` pairs by descending inner product.
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> DomainResult<Vec<(String, f32)>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, (_, vector))| (pos, inner_product(query, vector)))
            .collect();

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| (self.entries[pos].0.clone(), score))
            .collect())
    }
}

/// Dot product over the shorter of the two slices.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
