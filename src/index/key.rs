//! Index key tuples. Ordering is lexicographic over the column values in
//! declaration order, which defines cursor iteration order.

use crate::types::Value;

/// An ordered tuple of column values keying one index entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// True when `prefix` matches the leading values of this key. An empty
    /// prefix matches every key (full scan).
    pub fn starts_with(&self, prefix: &[Value]) -> bool {
        prefix.len() <= self.0.len() && self.0[..prefix.len()] == *prefix
    }
}

impl From<Vec<Value>> for IndexKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        let a = IndexKey::new(vec![Value::String("zhu1".into()), Value::Int(30)]);
        let b = IndexKey::new(vec![Value::String("zhu1".into()), Value::Int(31)]);
        let c = IndexKey::new(vec![Value::String("zhu2".into()), Value::Int(0)]);

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn a_prefix_sorts_before_its_extensions() {
        let prefix = IndexKey::new(vec![Value::String("zhu4".into())]);
        let full = IndexKey::new(vec![Value::String("zhu4".into()), Value::Int(0)]);
        assert!(prefix < full);
    }

    #[test]
    fn starts_with_matches_leading_values() {
        let key = IndexKey::new(vec![Value::String("zhu4".into()), Value::Int(30)]);

        assert!(key.starts_with(&[]));
        assert!(key.starts_with(&[Value::String("zhu4".into())]));
        assert!(key.starts_with(&[Value::String("zhu4".into()), Value::Int(30)]));
        assert!(!key.starts_with(&[Value::String("zhu5".into())]));
        assert!(!key.starts_with(&[
            Value::String("zhu4".into()),
            Value::Int(30),
            Value::Int(1)
        ]));
    }
}
