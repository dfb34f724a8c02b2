//! Item difficulty: structural, empirical, and BLIM-based measures,
//! combined by averaging whichever are available.
//!
//! Each measure is normalised to `[0,1]` independently; `estimate_item_difficulty`
//! averages across whichever of `{structural, empirical, blim}` the caller
//! supplies for a given item, so a caller with only a prerequisite graph (no
//! response data, no fitted model) still gets a meaningful score.

use std::collections::HashMap;

use crate::assessment::{BLIMParameters, ResponsePattern};
use crate::domain::Domain;
use crate::prerequisite::{PrerequisiteError, SurmiseRelation};

/// Errors raised while estimating item difficulty.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DifficultyError {
    /// An id was referenced that is not in the domain.
    #[error("unknown item id: {0}")]
    UnknownItem(String),
    /// None of `structural`, `empirical`, or `blim` was supplied.
    #[error("at least one difficulty measure must be supplied")]
    NoMeasuresAvailable,
}

impl From<PrerequisiteError> for DifficultyError {
    fn from(e: PrerequisiteError) -> Self {
        match e {
            PrerequisiteError::UnknownItem(id) => DifficultyError::UnknownItem(id),
            other => DifficultyError::UnknownItem(other.to_string()),
        }
    }
}

/// Structural difficulty: `|prerequisites_of(q) \ {q}|`, normalised by the
/// maximum across all items. An item with no prerequisites scores 0; the
/// item(s) with the deepest prerequisite chain score 1.
pub fn structural_difficulty(domain: &Domain, relation: &SurmiseRelation) -> Result<HashMap<String, f64>, DifficultyError> {
    let mut raw = HashMap::with_capacity(domain.len());
    let mut max = 0usize;
    for item in domain.items() {
        let count = relation.prerequisites_of(item.id())?.len().saturating_sub(1);
        max = max.max(count);
        raw.insert(item.id().to_string(), count as f64);
    }
    if max == 0 {
        return Ok(raw.into_iter().map(|(id, _)| (id, 0.0)).collect());
    }
    Ok(raw.into_iter().map(|(id, count)| (id, count / max as f64)).collect())
}

/// Empirical difficulty: fraction of incorrect responses to each item across
/// `data`.
pub fn empirical_difficulty(domain: &Domain, data: &[ResponsePattern]) -> Result<HashMap<String, f64>, DifficultyError> {
    let mut out = HashMap::with_capacity(domain.len());
    for item in domain.items() {
        let mut total = 0usize;
        let mut incorrect = 0usize;
        for pattern in data {
            if let Some(&correct) = pattern.get(item.id()) {
                total += 1;
                if !correct {
                    incorrect += 1;
                }
            }
        }
        let frac = if total > 0 { incorrect as f64 / total as f64 } else { 0.0 };
        out.insert(item.id().to_string(), frac);
    }
    Ok(out)
}

/// BLIM-based difficulty: `β_q + (1-η_q)`, clamped to `[0,1]`.
pub fn blim_difficulty(domain: &Domain, params: &BLIMParameters) -> Result<HashMap<String, f64>, DifficultyError> {
    let mut out = HashMap::with_capacity(domain.len());
    for item in domain.items() {
        let beta = params.beta(item.id()).map_err(|_| DifficultyError::UnknownItem(item.id().to_string()))?;
        let eta = params.eta(item.id()).map_err(|_| DifficultyError::UnknownItem(item.id().to_string()))?;
        out.insert(item.id().to_string(), (beta + (1.0 - eta)).clamp(0.0, 1.0));
    }
    Ok(out)
}

/// Whichever difficulty measures a caller has on hand; `estimate_item_difficulty`
/// averages across exactly the ones provided.
#[derive(Default)]
pub struct DifficultyInputs<'a> {
    /// A prerequisite relation, if a DAG is available.
    pub structural: Option<&'a SurmiseRelation>,
    /// Observed response data, if any has been collected.
    pub empirical: Option<&'a [ResponsePattern]>,
    /// Fitted BLIM parameters, if a model has been calibrated.
    pub blim: Option<&'a BLIMParameters>,
}

/// Per-item difficulty in `[0,1]`, averaging whichever of `inputs`'s three
/// measures are present.
///
/// # Errors
/// [`DifficultyError::NoMeasuresAvailable`] if all three fields of `inputs`
/// are `None`.
pub fn estimate_item_difficulty(domain: &Domain, inputs: DifficultyInputs) -> Result<HashMap<String, f64>, DifficultyError> {
    let mut measures: Vec<HashMap<String, f64>> = Vec::new();
    if let Some(rel) = inputs.structural {
        measures.push(structural_difficulty(domain, rel)?);
    }
    if let Some(data) = inputs.empirical {
        measures.push(empirical_difficulty(domain, data)?);
    }
    if let Some(params) = inputs.blim {
        measures.push(blim_difficulty(domain, params)?);
    }
    if measures.is_empty() {
        return Err(DifficultyError::NoMeasuresAvailable);
    }

    let mut out = HashMap::with_capacity(domain.len());
    for item in domain.items() {
        let sum: f64 = measures.iter().map(|m| m[item.id()]).sum();
        out.insert(item.id().to_string(), sum / measures.len() as f64);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;
    use crate::prerequisite::PrerequisiteGraph;

    fn chain_domain_and_relation() -> (Domain, SurmiseRelation) {
        let d = Domain::new(vec!["a", "b", "c"].into_iter().map(|id| Item::new(id).unwrap()).collect()).unwrap();
        let edges: Vec<(String, String)> = vec![("a", "b"), ("b", "c")].into_iter().map(|(a, b)| (a.to_string(), b.to_string())).collect();
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        (d.clone(), g.transitive_closure())
    }

    #[test]
    fn structural_difficulty_increases_along_the_chain() {
        let (d, rel) = chain_domain_and_relation();
        let diff = structural_difficulty(&d, &rel).unwrap();
        assert_eq!(diff["a"], 0.0);
        assert!(diff["b"] > diff["a"]);
        assert_eq!(diff["c"], 1.0);
    }

    #[test]
    fn empirical_difficulty_is_incorrect_fraction() {
        let (d, _rel) = chain_domain_and_relation();
        let mut p1 = ResponsePattern::new();
        p1.insert("a".into(), true);
        p1.insert("b".into(), false);
        p1.insert("c".into(), false);
        let mut p2 = ResponsePattern::new();
        p2.insert("a".into(), true);
        p2.insert("b".into(), true);
        p2.insert("c".into(), false);
        let diff = empirical_difficulty(&d, &[p1, p2]).unwrap();
        assert_eq!(diff["a"], 0.0);
        assert_eq!(diff["b"], 0.5);
        assert_eq!(diff["c"], 1.0);
    }

    #[test]
    fn blim_difficulty_is_clamped() {
        let (d, _rel) = chain_domain_and_relation();
        let params = BLIMParameters::uniform(&d, 0.4, 0.0).unwrap();
        let diff = blim_difficulty(&d, &params).unwrap();
        assert!((diff["a"] - 1.4f64.min(1.0)).abs() < 1e-12);
    }

    #[test]
    fn combined_average_requires_at_least_one_measure() {
        let (d, _rel) = chain_domain_and_relation();
        let err = estimate_item_difficulty(&d, DifficultyInputs::default()).unwrap_err();
        assert_eq!(err, DifficultyError::NoMeasuresAvailable);
    }

    #[test]
    fn combined_average_matches_manual_mean_of_supplied_measures() {
        let (d, rel) = chain_domain_and_relation();
        let params = BLIMParameters::uniform(&d, 0.1, 0.1).unwrap();
        let combined = estimate_item_difficulty(&d, DifficultyInputs { structural: Some(&rel), empirical: None, blim: Some(&params) }).unwrap();
        let structural = structural_difficulty(&d, &rel).unwrap();
        let blim = blim_difficulty(&d, &params).unwrap();
        for item in d.items() {
            let expected = (structural[item.id()] + blim[item.id()]) / 2.0;
            assert!((combined[item.id()] - expected).abs() < 1e-12);
        }
    }
}
