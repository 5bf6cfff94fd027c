//! Functional-dependency hints and checks.
//!
//! Hints are caller-declared (`determinant -> dependents`) and only used to
//! skip combinations that restate a pattern through a dependent attribute.
//! [`check_functional_dependency`] lets callers verify a hint against data
//! before declaring it; the engine never infers hints itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sift_core::{AttributeValue, Dataset, SiftError};

use crate::combination::{AttributeId, Combination, Vocabulary};

/// Caller-supplied hints keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionalDependencies(BTreeMap<String, BTreeSet<String>>);

impl FunctionalDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, determinant: impl Into<String>, dependents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(determinant.into())
            .or_default()
            .extend(dependents.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    /// Intern against a vocabulary. Hints naming unknown attributes are dropped.
    pub fn index(&self, vocabulary: &Vocabulary) -> FdIndex {
        let mut dependents: BTreeMap<AttributeId, Vec<AttributeId>> = BTreeMap::new();
        for (determinant, deps) in &self.0 {
            let Some(det) = vocabulary.attribute_id(determinant) else {
                continue;
            };
            let ids: Vec<AttributeId> = deps
                .iter()
                .filter_map(|d| vocabulary.attribute_id(d))
                .filter(|id| *id != det)
                .collect();
            if !ids.is_empty() {
                dependents.entry(det).or_default().extend(ids);
            }
        }
        FdIndex { dependents }
    }
}

impl<S: Into<String>, D: Into<String>> FromIterator<(S, Vec<D>)> for FunctionalDependencies {
    fn from_iter<T: IntoIterator<Item = (S, Vec<D>)>>(iter: T) -> Self {
        let mut fds = Self::new();
        for (determinant, dependents) in iter {
            fds.insert(determinant, dependents);
        }
        fds
    }
}

/// Interned hints for one prepared dataset.
#[derive(Debug, Clone, Default)]
pub struct FdIndex {
    dependents: BTreeMap<AttributeId, Vec<AttributeId>>,
}

impl FdIndex {
    /// True when the combination holds a determinant together with any of
    /// its dependents.
    pub fn is_redundant(&self, combination: &Combination) -> bool {
        combination.attributes().any(|attr| {
            self.dependents
                .get(&attr)
                .is_some_and(|deps| deps.iter().any(|d| combination.contains_attribute(*d)))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// Tuple of attribute values; `None` marks a null (or non-finite) cell.
pub type ValueTuple = Vec<Option<AttributeValue>>;

/// Outcome of a functional dependency check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionalDependencyResult {
    pub determinants: Vec<String>,
    pub dependents: Vec<String>,
    pub total_rows: usize,
    pub violating_rows: usize,
    /// Determinant key -> every dependent tuple observed with it.
    pub conflicts: BTreeMap<ValueTuple, Vec<ValueTuple>>,
}

impl FunctionalDependencyResult {
    pub fn holds(&self) -> bool {
        self.violating_rows == 0
    }

    pub fn violation_ratio(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.violating_rows as f64 / self.total_rows as f64
        }
    }

    /// Human-readable `a, b -> c` label.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.determinants.join(", "), self.dependents.join(", "))
    }
}

/// Check whether `determinants` functionally determine `dependents` in `dataset`.
///
/// A row violates the dependency when its determinant key was already seen
/// with a different dependent tuple; every row sharing that key is then
/// counted as violating. With `ignore_nulls`, rows holding a null in any
/// participating column are skipped.
pub fn check_functional_dependency(
    dataset: &Dataset,
    determinants: &[&str],
    dependents: &[&str],
    ignore_nulls: bool,
) -> Result<FunctionalDependencyResult, SiftError> {
    let resolve = |names: &[&str]| -> Result<Vec<usize>, SiftError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| dataset.column_index(n).is_none())
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SiftError::MissingAttributes(missing));
        }
        Ok(names.iter().filter_map(|n| dataset.column_index(n)).collect())
    };
    let det_idx = resolve(determinants)?;
    let dep_idx = resolve(dependents)?;
    dataset.check_row_widths()?;

    let mut key_to_value: HashMap<ValueTuple, ValueTuple> = HashMap::new();
    let mut key_to_rows: HashMap<ValueTuple, Vec<usize>> = HashMap::new();
    let mut conflicts: BTreeMap<ValueTuple, BTreeSet<ValueTuple>> = BTreeMap::new();
    let mut violating: BTreeSet<usize> = BTreeSet::new();
    let mut total_rows = 0usize;

    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let key: ValueTuple = det_idx.iter().map(|&i| row[i].to_attribute_value()).collect();
        let value: ValueTuple = dep_idx.iter().map(|&i| row[i].to_attribute_value()).collect();

        if ignore_nulls && (key.iter().any(Option::is_none) || value.iter().any(Option::is_none)) {
            continue;
        }
        total_rows += 1;

        match key_to_value.get(&key) {
            None => {
                key_to_value.insert(key.clone(), value);
                key_to_rows.insert(key, vec![row_idx]);
            }
            Some(existing) if *existing == value => {
                key_to_rows.entry(key).or_default().push(row_idx);
            }
            Some(existing) => {
                let entry = conflicts.entry(key.clone()).or_default();
                entry.insert(existing.clone());
                entry.insert(value.clone());
                let rows = key_to_rows.entry(key.clone()).or_default();
                rows.push(row_idx);
                violating.extend(rows.iter().copied());
                key_to_value.insert(key, value);
            }
        }
    }

    Ok(FunctionalDependencyResult {
        determinants: determinants.iter().map(|s| s.to_string()).collect(),
        dependents: dependents.iter().map(|s| s.to_string()).collect(),
        total_rows,
        violating_rows: violating.len(),
        conflicts: conflicts
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect(),
    })
}

/// Map each dependency label to whether it satisfies the given tolerances.
pub fn dependency_summary<'a>(
    results: impl IntoIterator<Item = &'a FunctionalDependencyResult>,
    max_ratio: Option<f64>,
    max_violations: Option<usize>,
) -> BTreeMap<String, bool> {
    results
        .into_iter()
        .map(|result| {
            let mut satisfies = result.holds();
            if max_ratio.is_some_and(|max| result.violation_ratio() > max) {
                satisfies = false;
            }
            if max_violations.is_some_and(|max| result.violating_rows > max) {
                satisfies = false;
            }
            (result.label(), satisfies)
        })
        .collect()
}
