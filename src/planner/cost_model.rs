use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{analyzer::ComplexityTier, parser::ast::{Collection, ParsedQuery}};

/// One factor per complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierMultipliers {
    pub simple: f64,
    pub moderate: f64,
    pub complex: f64,
    pub very_complex: f64,
}

impl TierMultipliers {
    pub fn get(&self, tier: ComplexityTier) -> f64 {
        match tier {
            ComplexityTier::Simple => self.simple,
            ComplexityTier::Moderate => self.moderate,
            ComplexityTier::Complex => self.complex,
            ComplexityTier::VeryComplex => self.very_complex,
        }
    }
}

/// Point-in-time cost inputs supplied by configuration.
///
/// Memory is `rows * row size * tier multiplier`; runtime is
/// `rows * micros per row * tier multiplier`, rounded up to whole
/// milliseconds. Rows sum over every table a statement reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub default_row_count: u64,
    pub default_row_size_bytes: u64,
    /// Keyed by lower-cased table name.
    pub table_row_counts: IndexMap<String, u64>,
    pub table_row_size_bytes: IndexMap<String, u64>,
    pub runtime_micros_per_row: f64,
    pub memory_multiplier: TierMultipliers,
    pub runtime_multiplier: TierMultipliers,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            default_row_count: 100_000,
            default_row_size_bytes: 256,
            table_row_counts: IndexMap::new(),
            table_row_size_bytes: IndexMap::new(),
            runtime_micros_per_row: 2.0,
            memory_multiplier: TierMultipliers { simple: 1.0, moderate: 1.5, complex: 2.5, very_complex: 4.0 },
            runtime_multiplier: TierMultipliers { simple: 1.0, moderate: 2.0, complex: 4.0, very_complex: 8.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEstimate {
    pub memory_bytes: u64,
    pub runtime_millis: u64,
}

impl CostModel {
    fn lookup(map: &IndexMap<String, u64>, table: &str) -> Option<u64> {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, value)| *value)
    }

    pub fn row_count(&self, table: &str) -> u64 {
        Self::lookup(&self.table_row_counts, table).unwrap_or(self.default_row_count)
    }

    pub fn row_size(&self, table: &str) -> u64 {
        Self::lookup(&self.table_row_size_bytes, table).unwrap_or(self.default_row_size_bytes)
    }

    pub fn estimate(&self, tables: &[String], tier: ComplexityTier) -> CostEstimate {
        let rows: u64 = tables.iter().map(|table| self.row_count(table)).sum();
        let bytes: u64 = tables.iter().map(|table| self.row_count(table).saturating_mul(self.row_size(table))).sum();

        let memory = bytes as f64 * self.memory_multiplier.get(tier);
        let runtime = rows as f64 * self.runtime_micros_per_row * self.runtime_multiplier.get(tier) / 1000.0;

        CostEstimate {
            memory_bytes: memory.ceil() as u64,
            runtime_millis: runtime.ceil() as u64,
        }
    }

    /// Named tables a statement reads: its source plus every plain join target.
    pub fn tables_of(query: &ParsedQuery) -> Vec<String> {
        let mut tables = vec![query.source_table.clone()];
        for join in query.joins.iter() {
            if let Collection::Table { name, .. } = &join.target {
                tables.push(name.clone());
            }
        }
        tables
    }
}
