//! The substructure relation between an expected and an actual document.
//!
//! `substructure(expected, actual)` treats `expected` as a pattern. Mappings
//! match when every expected key is present and its value matches, sequences
//! match as a prefix, sets match as a subset of a set, of a mapping's keys or
//! of a sequence's elements. Everything else falls back to structural
//! equality, except that [`Value::Any`] matches anything.

use crate::value::{Scalar, Value};
use im::{HashMap, HashSet};
use std::fmt;

/// Returns true iff `expected` is contained in `actual`.
///
/// # Examples
///
/// ```rust
/// use pmdcheck::substructure::substructure;
/// use pmdcheck::value::{Role, Value};
/// let expected = Value::parse_yaml("{a: {x: ~}, b: !set [1, 2]}", Role::Expected).unwrap();
/// let actual = Value::parse_yaml("{a: {x: 5, y: 6}, b: [1, 2, 3], c: extra}", Role::Actual).unwrap();
/// assert!(substructure(&expected, &actual));
/// ```
pub fn substructure(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Set(want), Value::Set(have)) => want.is_subset(have),
        (Value::Set(want), Value::Map(have)) => want.iter().all(|m| have.contains_key(m)),
        (Value::Set(want), Value::List(have)) => set_in_list(want, have),
        (Value::Map(want), Value::Map(have)) => map_substructure(want, have),
        (Value::List(want), Value::List(have)) => list_substructure(want, have),
        (Value::Any, _) => true,
        _ => expected == actual,
    }
}

fn set_in_list(want: &HashSet<Scalar>, have: &[Value]) -> bool {
    let members: std::collections::HashSet<&Scalar> =
        have.iter().filter_map(Value::as_scalar).collect();
    want.iter().all(|m| members.contains(m))
}

fn map_substructure(want: &HashMap<Scalar, Value>, have: &HashMap<Scalar, Value>) -> bool {
    want.iter().all(|(key, value)| match have.get(key) {
        Some(other) => substructure(value, other),
        None => false,
    })
}

fn list_substructure(want: &[Value], have: &[Value]) -> bool {
    have.len() >= want.len() && want.iter().zip(have).all(|(a, b)| substructure(a, b))
}

// =============================================================================
// MISMATCH LOCATION
// =============================================================================

/// One step from a document root towards a nested value.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(Scalar),
    Index(usize),
}

/// Why the comparison at a location failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    MissingKey,
    TooShort { expected: usize, actual: usize },
    MissingMember(Scalar),
    Differs { expected: Value, actual: Value },
}

/// The first location where `expected` is not contained in `actual`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub path: Vec<Segment>,
    pub reason: Reason,
}

/// Locates the first failing comparison, or `None` when `expected` is a
/// substructure of `actual`.
///
/// Mapping keys are visited in the order of their rendering so the reported
/// location does not depend on hash order.
pub fn find_mismatch(expected: &Value, actual: &Value) -> Option<Mismatch> {
    let mut path = Vec::new();
    locate(expected, actual, &mut path).map(|reason| Mismatch { path, reason })
}

/// On failure `path` is left pointing at the failing location.
fn locate(expected: &Value, actual: &Value, path: &mut Vec<Segment>) -> Option<Reason> {
    match (expected, actual) {
        (Value::Set(want), Value::Set(have)) => first_absent(want, |m| have.contains(m)),
        (Value::Set(want), Value::Map(have)) => first_absent(want, |m| have.contains_key(m)),
        (Value::Set(want), Value::List(have)) => {
            let members: std::collections::HashSet<&Scalar> =
                have.iter().filter_map(Value::as_scalar).collect();
            first_absent(want, |m| members.contains(m))
        }
        (Value::Map(want), Value::Map(have)) => {
            let mut entries: Vec<(&Scalar, &Value)> = want.iter().collect();
            entries.sort_by_cached_key(|(key, _)| key.to_string());
            for (key, value) in entries {
                path.push(Segment::Key(key.clone()));
                let Some(other) = have.get(key) else {
                    return Some(Reason::MissingKey);
                };
                if let Some(reason) = locate(value, other, path) {
                    return Some(reason);
                }
                path.pop();
            }
            None
        }
        (Value::List(want), Value::List(have)) => {
            if have.len() < want.len() {
                return Some(Reason::TooShort {
                    expected: want.len(),
                    actual: have.len(),
                });
            }
            for (i, (a, b)) in want.iter().zip(have).enumerate() {
                path.push(Segment::Index(i));
                if let Some(reason) = locate(a, b, path) {
                    return Some(reason);
                }
                path.pop();
            }
            None
        }
        (Value::Any, _) => None,
        _ if expected == actual => None,
        _ => Some(Reason::Differs {
            expected: expected.clone(),
            actual: actual.clone(),
        }),
    }
}

fn first_absent(want: &HashSet<Scalar>, present: impl Fn(&Scalar) -> bool) -> Option<Reason> {
    let mut missing: Vec<&Scalar> = want.iter().filter(|m| !present(m)).collect();
    missing.sort_by_cached_key(|m| m.to_string());
    missing
        .first()
        .map(|m| Reason::MissingMember((*m).clone()))
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(Scalar::String(s)) => write!(f, ".{}", s),
            Segment::Key(other) => write!(f, "[{}]", other),
            Segment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::MissingKey => write!(f, "key is missing"),
            Reason::TooShort { expected, actual } => write!(
                f,
                "sequence has {} element(s), expected at least {}",
                actual, expected
            ),
            Reason::MissingMember(m) => write!(f, "{} is not present", m),
            Reason::Differs { expected, actual } => {
                write!(f, "expected {}, found {}", expected, actual)
            }
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at $")?;
        for segment in &self.path {
            write!(f, "{}", segment)?;
        }
        write!(f, ": {}", self.reason)
    }
}
