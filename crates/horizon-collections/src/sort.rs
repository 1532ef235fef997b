//! Sort descriptors and the default column comparator.
//!
//! The default sort is a stable comparison sort over column values pulled
//! out of each item by a [`ColumnAccessor`]. Values of different kinds are
//! ordered by kind (`None < Bool < numbers < Text`) so the ordering is total,
//! which keeps repeated sorts with the same descriptor idempotent.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Applies the direction to an ascending ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "ascending"),
            Self::Descending => write!(f, "descending"),
        }
    }
}

/// The column and direction to sort by.
///
/// Both fields are optional: a descriptor without a column does not reorder
/// anything, and a missing direction means ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// The key of the column to sort by.
    pub column: Option<Key>,
    /// The direction to sort by.
    pub direction: Option<SortDirection>,
}

impl SortDescriptor {
    /// Creates a descriptor for a column and direction.
    pub fn new(column: impl Into<Key>, direction: SortDirection) -> Self {
        Self {
            column: Some(column.into()),
            direction: Some(direction),
        }
    }

    /// Ascending by a column.
    pub fn ascending(column: impl Into<Key>) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    /// Descending by a column.
    pub fn descending(column: impl Into<Key>) -> Self {
        Self::new(column, SortDirection::Descending)
    }

    /// The direction, defaulting to ascending.
    pub fn effective_direction(&self) -> SortDirection {
        self.direction.unwrap_or_default()
    }

    /// The same column in the opposite direction.
    pub fn toggled(&self) -> Self {
        Self {
            column: self.column.clone(),
            direction: Some(self.effective_direction().reversed()),
        }
    }
}

/// A column value used by the default comparator.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SortValue {
    /// Missing value; sorts first.
    #[default]
    None,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value; compared case-insensitively, then exactly.
    Text(String),
}

impl SortValue {
    /// Converts a JSON value.
    ///
    /// Arrays and objects compare by their serialized text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::None),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Text(_) => 3,
        }
    }

    /// Total ordering used by the default sort.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Text(a), Self::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for SortValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SortValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SortValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SortValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for SortValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Extracts the value of a column from an item.
pub type ColumnAccessor<T> = Arc<dyn Fn(&T, &Key) -> SortValue + Send + Sync>;

/// A column accessor reading the field named by the column key from the
/// serialized item.
pub fn json_column_accessor<T: Serialize + 'static>() -> ColumnAccessor<T> {
    Arc::new(|item: &T, column: &Key| {
        let field = column.to_string();
        serde_json::to_value(item)
            .ok()
            .and_then(|json| json.get(&field).map(SortValue::from_json))
            .unwrap_or_default()
    })
}

/// Stable-sorts items by the descriptor's column and direction.
///
/// A descriptor without a column leaves the order untouched.
pub fn sort_items<T>(items: &mut [T], descriptor: &SortDescriptor, accessor: &ColumnAccessor<T>) {
    let Some(column) = &descriptor.column else {
        return;
    };
    let direction = descriptor.effective_direction();

    // Extract once per item rather than once per comparison.
    let mut keyed: Vec<(SortValue, usize)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (accessor(item, column), i))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| direction.apply(a.compare(b)));

    let order: Vec<usize> = keyed.into_iter().map(|(_, i)| i).collect();
    apply_permutation(items, order);
}

fn apply_permutation<T>(items: &mut [T], mut order: Vec<usize>) {
    // order[target] = source; follow cycles with swaps.
    for start in 0..order.len() {
        let mut current = start;
        while order[current] != start {
            let next = order[current];
            items.swap(current, next);
            order[current] = current;
            current = next;
        }
        order[current] = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Row {
        name: &'static str,
        size: i64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "cherry", size: 2 },
            Row { name: "Apple", size: 3 },
            Row { name: "banana", size: 2 },
            Row { name: "apple", size: 1 },
        ]
    }

    fn names(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_sort_by_text_column() {
        let mut items = rows();
        sort_items(&mut items, &SortDescriptor::ascending("name"), &json_column_accessor());
        assert_eq!(names(&items), vec!["Apple", "apple", "banana", "cherry"]);

        sort_items(&mut items, &SortDescriptor::descending("name"), &json_column_accessor());
        assert_eq!(names(&items), vec!["cherry", "banana", "apple", "Apple"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = rows();
        sort_items(&mut items, &SortDescriptor::ascending("size"), &json_column_accessor());
        assert_eq!(names(&items), vec!["apple", "cherry", "banana", "Apple"]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let descriptor = SortDescriptor::descending("size");
        let mut once = rows();
        sort_items(&mut once, &descriptor, &json_column_accessor());
        let mut twice = once.clone();
        sort_items(&mut twice, &descriptor, &json_column_accessor());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sort_without_column_is_noop() {
        let mut items = rows();
        sort_items(&mut items, &SortDescriptor::default(), &json_column_accessor());
        assert_eq!(items, rows());
    }

    #[test]
    fn test_mixed_value_ordering() {
        let mut values = vec![
            SortValue::Text("b".into()),
            SortValue::Float(1.5),
            SortValue::None,
            SortValue::Int(1),
            SortValue::Bool(true),
        ];
        values.sort_by(SortValue::compare);
        assert_eq!(
            values,
            vec![
                SortValue::None,
                SortValue::Bool(true),
                SortValue::Int(1),
                SortValue::Float(1.5),
                SortValue::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_descriptor_toggle() {
        let descriptor = SortDescriptor {
            column: Some(Key::from("name")),
            direction: None,
        };
        assert_eq!(descriptor.effective_direction(), SortDirection::Ascending);
        assert_eq!(descriptor.toggled().direction, Some(SortDirection::Descending));
    }

    #[test]
    fn test_apply_permutation() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        apply_permutation(&mut items, vec![2, 0, 3, 1]);
        assert_eq!(items, vec!['c', 'a', 'd', 'b']);
    }
}
