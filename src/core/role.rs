//! Positional role of an emitted item.
//!
//! Consumers use the role to react to the edges of a run: snap a view on the
//! first item, finalize state on the last one.
//!
//! # Single item
//!
//! A run with exactly one item emits it as [`Role::First`]. Index 0 is tested
//! before `len - 1`, so the lone item never reaches the `Last` branch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an item within the current run, derived from its index only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Index 0.
    First,
    /// Anything strictly between the first and the last item.
    Middle,
    /// Index `len - 1` when `len > 1`.
    Last,
}

impl Role {
    /// Classify index `idx` of a sequence holding `len` items.
    pub fn classify(idx: usize, len: usize) -> Self {
        debug_assert!(idx < len, "index {} out of range for {} items", idx, len);
        if idx == 0 {
            Role::First
        } else if idx + 1 == len {
            Role::Last
        } else {
            Role::Middle
        }
    }

    pub fn is_first(self) -> bool {
        self == Role::First
    }

    pub fn is_last(self) -> bool {
        self == Role::Last
    }

    /// Lowercase name, as used by the CLI output and serde.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::First => "first",
            Role::Middle => "middle",
            Role::Last => "last",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(len: usize) -> Vec<Role> {
        (0..len).map(|i| Role::classify(i, len)).collect()
    }

    #[test]
    fn test_single_item_is_first() {
        assert_eq!(roles(1), vec![Role::First]);
    }

    #[test]
    fn test_two_items_have_no_middle() {
        assert_eq!(roles(2), vec![Role::First, Role::Last]);
    }

    #[test]
    fn test_middle_fills_between_edges() {
        let r = roles(5);
        assert_eq!(r[0], Role::First);
        assert!(r[1..4].iter().all(|&role| role == Role::Middle));
        assert_eq!(r[4], Role::Last);
    }

    #[test]
    fn test_edge_helpers() {
        assert!(Role::First.is_first() && !Role::First.is_last());
        assert!(Role::Last.is_last() && !Role::Last.is_first());
        assert!(!Role::Middle.is_first() && !Role::Middle.is_last());
        assert!(Role::classify(0, 1).is_first());
        assert!(Role::classify(2, 3).is_last());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Role::Middle).unwrap();
        assert_eq!(json, "\"middle\"");
        let back: Role = serde_json::from_str("\"last\"").unwrap();
        assert_eq!(back, Role::Last);
        assert_eq!(Role::Last.to_string(), "last");
    }
}
