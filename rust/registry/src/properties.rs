// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! By-value property signatures for structural-equality merges.
//!
//! Two materials with different names but identical Young's modulus, density
//! and yield curve are the same material as far as an analysis is concerned.
//! [`PropertyValue`] is the value such a comparison is made on: it compares
//! and hashes nested sequences element by element, and floats by bit pattern,
//! so it can key a hash map.

use std::hash::{Hash, Hasher};

/// A typed value making up (part of) an entity's property signature.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Builds a list of floats, the common shape of section dimensions and
    /// material curves.
    pub fn floats(values: &[f64]) -> Self {
        PropertyValue::List(values.iter().copied().map(PropertyValue::Float).collect())
    }

    /// `-0.0` and `0.0` share one bit pattern; every NaN shares another.
    fn float_bits(v: f64) -> u64 {
        if v == 0.0 {
            0
        } else if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyValue::Int(a), PropertyValue::Int(b)) => a == b,
            (PropertyValue::Float(a), PropertyValue::Float(b)) => {
                Self::float_bits(*a) == Self::float_bits(*b)
            }
            (PropertyValue::Text(a), PropertyValue::Text(b)) => a == b,
            (PropertyValue::List(a), PropertyValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PropertyValue::Int(v) => v.hash(state),
            PropertyValue::Float(v) => Self::float_bits(*v).hash(state),
            PropertyValue::Text(v) => v.hash(state),
            PropertyValue::List(items) => {
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        PropertyValue::List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn nested_lists_compare_by_value() {
        let a = PropertyValue::List(vec![
            PropertyValue::from("IPE300"),
            PropertyValue::floats(&[0.3, 0.15, 0.0107]),
        ]);
        let b = PropertyValue::List(vec![
            PropertyValue::from("IPE300"),
            PropertyValue::floats(&[0.3, 0.15, 0.0107]),
        ]);
        let c = PropertyValue::List(vec![
            PropertyValue::from("IPE300"),
            PropertyValue::floats(&[0.3, 0.15, 0.0108]),
        ]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: FxHashSet<PropertyValue> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn signed_zero_is_one_value() {
        assert_eq!(PropertyValue::Float(0.0), PropertyValue::Float(-0.0));
        let set: FxHashSet<PropertyValue> =
            [PropertyValue::Float(0.0), PropertyValue::Float(-0.0)]
                .into_iter()
                .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn variants_never_collide() {
        assert_ne!(PropertyValue::Int(1), PropertyValue::Float(1.0));
        assert_ne!(
            PropertyValue::List(vec![PropertyValue::Int(1)]),
            PropertyValue::Int(1)
        );
    }
}
