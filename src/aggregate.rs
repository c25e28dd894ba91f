//! Merging page results into one logical aggregate.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::{ArxivError, Result};
use crate::types::{AggregateResult, Metadata, PageResult, Paper};

/// Merge one or more page results for the same logical query.
///
/// Pure function over its inputs: merging the same list twice yields equal
/// aggregates. Papers are deduplicated by id — the record with the strictly
/// later `updated` wins, the first occurrence wins ties — and emitted in the
/// order their ids were first seen.
pub fn merge(results: &[PageResult]) -> Result<AggregateResult> {
    let first = results.first().ok_or(ArxivError::EmptyInput)?;

    let mut order: Vec<String> = Vec::new();
    let mut chosen: HashMap<String, Paper> = HashMap::new();
    for result in results {
        for paper in &result.papers {
            match chosen.entry(paper.id.clone()) {
                Entry::Occupied(mut slot) => {
                    if paper.updated > slot.get().updated {
                        slot.insert(paper.clone());
                    }
                }
                Entry::Vacant(slot) => {
                    order.push(paper.id.clone());
                    slot.insert(paper.clone());
                }
            }
        }
    }
    let papers: Vec<Paper> = order.iter().filter_map(|id| chosen.remove(id)).collect();

    let metadata = Metadata {
        start_time: results
            .iter()
            .map(|r| r.metadata.start_time)
            .min()
            .unwrap_or(first.metadata.start_time),
        end_time: results.iter().filter_map(|r| r.metadata.end_time).max(),
        missing_results: results.iter().map(|r| r.metadata.missing_results).sum(),
        pagesize: results.iter().map(|r| r.metadata.pagesize).sum(),
        source: first.metadata.source.clone(),
    };

    Ok(AggregateResult {
        papers,
        total_result: results.iter().map(|r| r.total_result).max().unwrap_or(0),
        page: results.iter().map(|r| r.page).max().unwrap_or(1),
        has_more: results.iter().any(|r| r.has_more),
        query: first.query.clone(),
        metadata,
    })
}
