//! Canonical attribute-value combinations.
//!
//! Attribute names and values are interned into small integers by a
//! [`Vocabulary`]. Attribute ids follow sorted attribute-name order and value
//! ids follow sorted value order within each attribute, so the derived
//! ordering of [`Combination`] is the same as ordering by
//! `(attribute name, value)` pairs.

use std::collections::BTreeMap;

use sift_core::AttributeValue;

use crate::fd::FdIndex;

pub type AttributeId = u16;
pub type ValueId = u32;

/// A single `attribute = value` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub attribute: AttributeId,
    pub value: ValueId,
}

impl Item {
    pub fn new(attribute: AttributeId, value: ValueId) -> Self {
        Self { attribute, value }
    }
}

/// Sorted, duplicate-free set of items with at most one value per attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(Box<[Item]>);

impl Combination {
    /// Canonical form of `items`: deduplicated and sorted by attribute.
    ///
    /// Returns None if an attribute appears with two different values.
    pub fn normalize<I: IntoIterator<Item = Item>>(items: I) -> Option<Self> {
        let mut items: Vec<Item> = items.into_iter().collect();
        items.sort_unstable();
        items.dedup();
        if items.windows(2).any(|w| w[0].attribute == w[1].attribute) {
            return None;
        }
        Some(Self(items.into_boxed_slice()))
    }

    pub fn singleton(item: Item) -> Self {
        Self(vec![item].into_boxed_slice())
    }

    /// This combination plus one more item, normalized.
    pub fn extended(&self, item: Item) -> Option<Self> {
        Self::normalize(self.0.iter().copied().chain(std::iter::once(item)))
    }

    pub fn items(&self) -> &[Item] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<Item> {
        self.0.last().copied()
    }

    pub fn contains_attribute(&self, attribute: AttributeId) -> bool {
        self.0.iter().any(|item| item.attribute == attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = AttributeId> + '_ {
        self.0.iter().map(|item| item.attribute)
    }

    /// True when both combinations agree on everything but their last item.
    pub fn shares_prefix(&self, other: &Combination) -> bool {
        let n = self.len();
        n == other.len() && n > 0 && self.0[..n - 1] == other.0[..n - 1]
    }

    /// Every sub-combination with exactly one item removed.
    pub fn subsets(&self) -> impl Iterator<Item = Combination> + '_ {
        (0..self.len()).map(move |skip| {
            let items: Vec<Item> = self
                .0
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, item)| *item)
                .collect();
            Combination(items.into_boxed_slice())
        })
    }
}

/// Reject combinations larger than `max_order` and, when FD hints are
/// given, combinations pairing a determinant with one of its dependents.
pub fn is_valid(combination: &Combination, max_order: usize, fd: Option<&FdIndex>) -> bool {
    if combination.len() > max_order {
        return false;
    }
    match fd {
        Some(index) => !index.is_redundant(combination),
        None => true,
    }
}

/// Interning tables for one prepared dataset.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    attributes: Vec<String>,
    values: Vec<Vec<AttributeValue>>,
}

impl Vocabulary {
    /// Build from `(attribute, distinct values)` pairs. Attributes and values
    /// are sorted here; the id order relies on it.
    pub fn new(entries: impl IntoIterator<Item = (String, Vec<AttributeValue>)>) -> Self {
        let mut entries: Vec<(String, Vec<AttributeValue>)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);

        let mut attributes = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (name, mut vals) in entries {
            vals.sort();
            vals.dedup();
            attributes.push(name);
            values.push(vals);
        }
        Self { attributes, values }
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_ids(&self) -> impl Iterator<Item = AttributeId> {
        0..self.attributes.len() as AttributeId
    }

    pub fn attribute_id(&self, name: &str) -> Option<AttributeId> {
        self.attributes
            .binary_search_by(|a| a.as_str().cmp(name))
            .ok()
            .map(|idx| idx as AttributeId)
    }

    pub fn attribute_name(&self, id: AttributeId) -> &str {
        &self.attributes[id as usize]
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attributes
    }

    /// Distinct observed values of an attribute, sorted.
    pub fn values(&self, attribute: AttributeId) -> &[AttributeValue] {
        &self.values[attribute as usize]
    }

    pub fn value_ids(&self, attribute: AttributeId) -> impl Iterator<Item = ValueId> {
        0..self.values[attribute as usize].len() as ValueId
    }

    pub fn value_id(&self, attribute: AttributeId, value: &AttributeValue) -> Option<ValueId> {
        self.values[attribute as usize]
            .binary_search(value)
            .ok()
            .map(|idx| idx as ValueId)
    }

    pub fn value(&self, item: Item) -> &AttributeValue {
        &self.values[item.attribute as usize][item.value as usize]
    }

    /// Item for a named attribute and value, if both were observed.
    pub fn item(&self, attribute: &str, value: &AttributeValue) -> Option<Item> {
        let attribute = self.attribute_id(attribute)?;
        let value = self.value_id(attribute, value)?;
        Some(Item::new(attribute, value))
    }

    /// Attribute-name keyed view of a combination.
    pub fn resolve(&self, combination: &Combination) -> BTreeMap<String, AttributeValue> {
        combination
            .items()
            .iter()
            .map(|item| (self.attribute_name(item.attribute).to_string(), self.value(*item).clone()))
            .collect()
    }
}
