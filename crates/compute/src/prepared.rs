use std::collections::BTreeSet;

use sift_core::{Dataset, SiftError};
use tracing::debug;

use crate::combination::{AttributeId, Combination, ValueId, Vocabulary};
use crate::explanation::ExplanationMetrics;
use crate::metrics::{BinaryGroup, ContingencyTable};

/// Validated, interned view of a dataset for one explanation run.
///
/// Built at the start of each run and dropped at the end; strategies only
/// read from it.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    vocabulary: Vocabulary,
    /// Per attribute id, the value id of every row.
    columns: Vec<Vec<ValueId>>,
    outlier_mask: Vec<bool>,
    n_outliers: usize,
    n_inliers: usize,
}

impl PreparedDataset {
    /// Validate `dataset` and intern the attribute columns.
    ///
    /// `attributes` defaults to every column except `outlier_column`.
    /// Fails on a ragged row, a missing outlier or attribute column, a null
    /// or non-finite attribute value, an uninterpretable outlier flag, or a
    /// dataset without both outliers and inliers.
    pub fn build(
        dataset: &Dataset,
        outlier_column: &str,
        attributes: Option<&[String]>,
    ) -> Result<Self, SiftError> {
        dataset.check_row_widths()?;
        let outlier_idx = dataset
            .column_index(outlier_column)
            .ok_or_else(|| SiftError::MissingOutlierColumn(outlier_column.to_string()))?;

        let attributes: Vec<String> = match attributes {
            Some(requested) => {
                let missing: Vec<String> = requested
                    .iter()
                    .filter(|name| dataset.column_index(name).is_none())
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(SiftError::MissingAttributes(missing));
                }
                let mut seen = BTreeSet::new();
                requested
                    .iter()
                    .filter(|name| seen.insert(name.as_str()))
                    .cloned()
                    .collect()
            }
            None => dataset
                .columns()
                .iter()
                .filter(|name| name.as_str() != outlier_column)
                .cloned()
                .collect(),
        };
        if attributes.len() > AttributeId::MAX as usize {
            return Err(SiftError::InvalidConfig {
                field: "attributes",
                reason: format!("at most {} attributes are supported", AttributeId::MAX),
            });
        }

        // Convert each attribute column to value keys, rejecting nulls.
        let mut raw_columns = Vec::with_capacity(attributes.len());
        for name in &attributes {
            let idx = dataset
                .column_index(name)
                .ok_or_else(|| SiftError::MissingAttributes(vec![name.clone()]))?;
            let mut values = Vec::with_capacity(dataset.len());
            for (row, cells) in dataset.rows().iter().enumerate() {
                let cell = &cells[idx];
                if cell.is_null() {
                    return Err(SiftError::NullAttribute {
                        attribute: name.clone(),
                        row,
                    });
                }
                let value = cell.to_attribute_value().ok_or_else(|| SiftError::NonFiniteAttribute {
                    attribute: name.clone(),
                    row,
                })?;
                values.push(value);
            }
            raw_columns.push((name.clone(), values));
        }

        let mut outlier_mask = Vec::with_capacity(dataset.len());
        for (row, cells) in dataset.rows().iter().enumerate() {
            let flag = cells[outlier_idx].as_flag().ok_or_else(|| SiftError::InvalidOutlierFlag {
                column: outlier_column.to_string(),
                row,
            })?;
            outlier_mask.push(flag);
        }
        let n_outliers = outlier_mask.iter().filter(|&&f| f).count();
        let n_inliers = outlier_mask.len() - n_outliers;
        if n_outliers == 0 {
            return Err(SiftError::NoOutliers);
        }
        if n_inliers == 0 {
            return Err(SiftError::NoInliers);
        }

        let vocabulary = Vocabulary::new(raw_columns.iter().map(|(name, values)| {
            let distinct: BTreeSet<_> = values.iter().cloned().collect();
            (name.clone(), distinct.into_iter().collect())
        }));

        let mut columns = vec![Vec::new(); vocabulary.attribute_count()];
        for (name, values) in &raw_columns {
            let Some(attr) = vocabulary.attribute_id(name) else {
                continue;
            };
            columns[attr as usize] = values
                .iter()
                .filter_map(|v| vocabulary.value_id(attr, v))
                .collect();
        }

        debug!(
            rows = outlier_mask.len(),
            n_outliers,
            n_inliers,
            attributes = vocabulary.attribute_count(),
            "Prepared dataset"
        );

        Ok(Self {
            vocabulary,
            columns,
            outlier_mask,
            n_outliers,
            n_inliers,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn n_outliers(&self) -> usize {
        self.n_outliers
    }

    pub fn n_inliers(&self) -> usize {
        self.n_inliers
    }

    pub fn total_rows(&self) -> usize {
        self.outlier_mask.len()
    }

    /// Outlier and inlier rows matching every item of `combination`.
    pub fn count(&self, combination: &Combination) -> (usize, usize) {
        let items = combination.items();
        let mut outliers = 0usize;
        let mut inliers = 0usize;
        for (row, &is_outlier) in self.outlier_mask.iter().enumerate() {
            let matches = items
                .iter()
                .all(|item| self.columns[item.attribute as usize][row] == item.value);
            if matches {
                if is_outlier {
                    outliers += 1;
                } else {
                    inliers += 1;
                }
            }
        }
        (outliers, inliers)
    }

    /// Exposed = rows matching the combination, against the global totals.
    pub fn contingency_table(&self, combination: &Combination) -> ContingencyTable {
        let (outliers, inliers) = self.count(combination);
        ContingencyTable::from_groups(
            BinaryGroup::from_counts(outliers, inliers),
            BinaryGroup::from_counts(self.n_outliers - outliers, self.n_inliers - inliers),
        )
    }

    pub fn score(&self, combination: &Combination) -> ExplanationMetrics {
        ExplanationMetrics::from_table(&self.contingency_table(combination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::FieldValue;

    fn small() -> Dataset {
        Dataset::from_records(
            [("US", "A", 1), ("US", "B", 1), ("US", "A", 0), ("EU", "A", 0), ("EU", "B", 0)]
                .iter()
                .map(|(region, segment, flag)| {
                    vec![
                        ("region", FieldValue::from(*region)),
                        ("segment", FieldValue::from(*segment)),
                        ("is_outlier", FieldValue::Integer(*flag)),
                    ]
                }),
        )
    }

    #[test]
    fn default_attributes_exclude_the_outlier_column() {
        let prepared = PreparedDataset::build(&small(), "is_outlier", None).unwrap();
        assert_eq!(prepared.vocabulary().attribute_names(), ["region", "segment"]);
        assert_eq!(prepared.n_outliers(), 2);
        assert_eq!(prepared.n_inliers(), 3);
        assert_eq!(prepared.total_rows(), 5);
    }

    #[test]
    fn counts_split_by_outlier_flag() {
        let prepared = PreparedDataset::build(&small(), "is_outlier", None).unwrap();
        let vocab = prepared.vocabulary();
        let us_a = Combination::normalize([
            vocab.item("region", &"US".into()).unwrap(),
            vocab.item("segment", &"A".into()).unwrap(),
        ])
        .unwrap();
        assert_eq!(prepared.count(&us_a), (1, 1));

        let table = prepared.contingency_table(&us_a);
        assert_eq!(table.total_outliers(), 2.0);
        assert_eq!(table.total_inliers(), 3.0);
        assert_eq!(table.unexposed().inliers(), 2.0);
    }

    #[test]
    fn explicit_attributes_are_deduplicated() {
        let attrs = vec!["segment".to_string(), "segment".to_string()];
        let prepared = PreparedDataset::build(&small(), "is_outlier", Some(&attrs)).unwrap();
        assert_eq!(prepared.vocabulary().attribute_names(), ["segment"]);
    }

    #[test]
    fn validation_errors_name_the_offending_column() {
        let err = PreparedDataset::build(&small(), "flag", None).unwrap_err();
        assert_eq!(err, SiftError::MissingOutlierColumn("flag".to_string()));

        let attrs = vec!["region".to_string(), "zip".to_string()];
        let err = PreparedDataset::build(&small(), "is_outlier", Some(&attrs)).unwrap_err();
        assert_eq!(err, SiftError::MissingAttributes(vec!["zip".to_string()]));

        let mut ds = small();
        ds.push_row(vec![FieldValue::Null, FieldValue::from("A"), FieldValue::Integer(0)])
            .unwrap();
        let err = PreparedDataset::build(&ds, "is_outlier", None).unwrap_err();
        assert_eq!(
            err,
            SiftError::NullAttribute {
                attribute: "region".to_string(),
                row: 5
            }
        );
    }

    #[test]
    fn non_finite_attribute_names_column_and_row() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut ds = small();
            ds.push_row(vec![FieldValue::Float(bad), FieldValue::from("A"), FieldValue::Integer(1)])
                .unwrap();
            let err = PreparedDataset::build(&ds, "is_outlier", None).unwrap_err();
            assert_eq!(
                err,
                SiftError::NonFiniteAttribute {
                    attribute: "region".to_string(),
                    row: 5
                }
            );
            assert!(err.is_data_error());
        }
    }

    #[test]
    fn ragged_deserialized_dataset_is_rejected() {
        let ds: Dataset = serde_json::from_str(
            r#"{"columns":["region","is_outlier"],"rows":[[{"Text":"US"},{"Integer":1}],[{"Text":"EU"}]]}"#,
        )
        .unwrap();
        let err = PreparedDataset::build(&ds, "is_outlier", None).unwrap_err();
        assert_eq!(err, SiftError::RowWidth { expected: 2, actual: 1 });
        assert!(err.is_data_error());
    }

    #[test]
    fn one_sided_partitions_are_rejected() {
        let mut ds = small();
        ds.fill_column("is_outlier", FieldValue::Boolean(true));
        assert_eq!(
            PreparedDataset::build(&ds, "is_outlier", None).unwrap_err(),
            SiftError::NoInliers
        );
        ds.fill_column("is_outlier", FieldValue::Boolean(false));
        assert_eq!(
            PreparedDataset::build(&ds, "is_outlier", None).unwrap_err(),
            SiftError::NoOutliers
        );
    }

    #[test]
    fn unparsable_outlier_flag_is_a_data_error() {
        let mut ds = small();
        ds.push_row(vec![FieldValue::from("EU"), FieldValue::from("A"), FieldValue::from("yes")])
            .unwrap();
        let err = PreparedDataset::build(&ds, "is_outlier", None).unwrap_err();
        assert!(err.is_data_error());
    }
}
