//! Core types for the state cell.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Maximum number of digits in a generated version id.
pub const VERSION_ID_MAX_LEN: usize = 15;

/// Opaque identifier of one committed state.
///
/// Ids are the decimal digits of a random fraction, so they are short,
/// printable and digit-only. They are lookup keys only: not ordered, not
/// parsed. Uniqueness is probabilistic.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(String);

impl VersionId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        loop {
            let fraction: f64 = rand::random();
            // Display never uses exponent notation, so this is "0.<digits>".
            let digits: String = fraction
                .to_string()
                .chars()
                .skip(2)
                .take(VERSION_ID_MAX_LEN)
                .collect();
            if !digits.is_empty() {
                return VersionId(digits);
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for VersionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VersionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        VersionId(s.to_string())
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        VersionId(s)
    }
}

impl PartialEq<str> for VersionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for VersionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Result of a committed mutation, as resolved by `set` and delivered to
/// subscribers.
///
/// `id` is present only when the mutation was indexed.
#[derive(Debug)]
pub struct Update<S> {
    pub state: Arc<S>,
    pub id: Option<VersionId>,
}

impl<S> Clone for Update<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            id: self.id.clone(),
        }
    }
}

impl<S> Update<S> {
    pub fn is_indexed(&self) -> bool {
        self.id.is_some()
    }
}

/// A state together with the id it was current (or recorded) under.
#[derive(Debug)]
pub struct Snapshot<S> {
    pub state: Arc<S>,
    pub id: VersionId,
}

impl<S> Clone for Snapshot<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            id: self.id.clone(),
        }
    }
}

/// How far an unsubscribe cascades up the parent chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Cascade {
    /// Remove only this handle's callback.
    #[default]
    Own,
    /// Remove this handle's callback and every ancestor's, up to the root.
    All,
    /// Remove this handle's callback and `n` ancestors' callbacks.
    Levels(usize),
}

impl Cascade {
    /// The cascade to apply to the parent, or `None` when the walk stops here.
    pub fn next(self) -> Option<Cascade> {
        match self {
            Cascade::Own | Cascade::Levels(0) => None,
            Cascade::All => Some(Cascade::All),
            Cascade::Levels(n) => Some(Cascade::Levels(n - 1)),
        }
    }

    /// Parse a dynamically typed level: `null`/booleans/non-negative integers.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Cascade::Own),
            serde_json::Value::Bool(b) => Ok(Cascade::from(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cascade::try_from(i)
                } else if let Some(u) = n.as_u64() {
                    Ok(Cascade::Levels(usize::try_from(u).unwrap_or(usize::MAX)))
                } else {
                    Cascade::try_from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            other => Err(StoreError::InvalidArgument(format!(
                "unsubscribe level must be a boolean or a number, got {}",
                other
            ))),
        }
    }
}

impl From<bool> for Cascade {
    fn from(all: bool) -> Self {
        if all {
            Cascade::All
        } else {
            Cascade::Own
        }
    }
}

impl From<usize> for Cascade {
    fn from(n: usize) -> Self {
        Cascade::Levels(n)
    }
}

impl From<u32> for Cascade {
    fn from(n: u32) -> Self {
        Cascade::Levels(n as usize)
    }
}

impl TryFrom<i64> for Cascade {
    type Error = StoreError;

    fn try_from(n: i64) -> Result<Self> {
        if n < 0 {
            return Err(StoreError::OutOfRange(n));
        }
        Ok(Cascade::Levels(usize::try_from(n).unwrap_or(usize::MAX)))
    }
}

impl TryFrom<i32> for Cascade {
    type Error = StoreError;

    fn try_from(n: i32) -> Result<Self> {
        Cascade::try_from(i64::from(n))
    }
}

impl TryFrom<f64> for Cascade {
    type Error = StoreError;

    fn try_from(n: f64) -> Result<Self> {
        if n.is_nan() {
            return Err(StoreError::InvalidArgument(
                "unsubscribe level must not be NaN".to_string(),
            ));
        }
        if n.fract() != 0.0 {
            return Err(StoreError::InvalidArgument(format!(
                "unsubscribe level must be an integer, got {}",
                n
            )));
        }
        if n < 0.0 {
            return Err(StoreError::OutOfRange(n as i64));
        }
        // Infinity saturates, which cascades to the root.
        Ok(Cascade::Levels(n as usize))
    }
}

/// Store statistics.
#[derive(Clone, Debug)]
pub struct StoreStats {
    pub version: VersionId,
    pub indexed_versions: usize,
    pub subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_version_id_shape() {
        for _ in 0..1000 {
            let id = VersionId::generate();
            assert!(!id.as_str().is_empty());
            assert!(id.as_str().len() <= VERSION_ID_MAX_LEN);
            assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_version_ids_almost_always_distinct() {
        let ids: HashSet<VersionId> = (0..1000).map(|_| VersionId::generate()).collect();
        assert!(ids.len() >= 999);
    }

    #[test]
    fn test_version_id_borrows_as_str() {
        let mut set = HashSet::new();
        set.insert(VersionId::from("12345"));
        assert!(set.contains("12345"));
        assert_eq!(VersionId::from("12345"), "12345");
    }

    #[test]
    fn test_cascade_walk() {
        assert_eq!(Cascade::Own.next(), None);
        assert_eq!(Cascade::Levels(0).next(), None);
        assert_eq!(Cascade::Levels(2).next(), Some(Cascade::Levels(1)));
        assert_eq!(Cascade::All.next(), Some(Cascade::All));
    }

    #[test]
    fn test_cascade_conversions() {
        assert_eq!(Cascade::from(false), Cascade::Own);
        assert_eq!(Cascade::from(true), Cascade::All);
        assert_eq!(Cascade::from(3usize), Cascade::Levels(3));
        assert_eq!(Cascade::try_from(2i64).unwrap(), Cascade::Levels(2));
        assert!(matches!(
            Cascade::try_from(-1i64),
            Err(StoreError::OutOfRange(-1))
        ));
        assert!(matches!(
            Cascade::try_from(f64::NAN),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            Cascade::try_from(1.5f64),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            Cascade::try_from(-2.0f64),
            Err(StoreError::OutOfRange(-2))
        ));
    }

    #[test]
    fn test_version_id_serializes_as_plain_string() {
        let id = VersionId::from("0123456789");
        let value = serde_json::to_value(&id).unwrap();
        assert_eq!(value, json!("0123456789"));

        let back: VersionId = serde_json::from_value(value).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<VersionId>(json!(12)).is_err());
    }

    #[test]
    fn test_cascade_from_json() {
        assert_eq!(Cascade::from_json(&json!(null)).unwrap(), Cascade::Own);
        assert_eq!(Cascade::from_json(&json!(true)).unwrap(), Cascade::All);
        assert_eq!(Cascade::from_json(&json!(4)).unwrap(), Cascade::Levels(4));
        assert_eq!(Cascade::from_json(&json!(2.0)).unwrap(), Cascade::Levels(2));
        assert!(matches!(
            Cascade::from_json(&json!(-3)),
            Err(StoreError::OutOfRange(-3))
        ));
        assert!(matches!(
            Cascade::from_json(&json!("1")),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            Cascade::from_json(&json!(0.5)),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
