//! Sorting and windowing options for collection fetches.
//!
//! Filters are native [`bson::Document`] predicates produced by the
//! [`FilterNormalizer`](crate::filter::FilterNormalizer); this module only describes how the
//! matching documents are ordered and which slice of them is returned.
//!
//! ```ignore
//! use notifydb_core::query::{Sort, SortDirection};
//!
//! let sort = Sort::parse("createdAt", "desc");
//! assert_eq!(sort.unwrap().direction, SortDirection::Desc);
//! assert!(Sort::parse("", "desc").is_none());
//! ```

use std::fmt;

use crate::page::PageWindow;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    #[default]
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Parses a caller-supplied direction. `"DESC"` in any case is descending, anything else
    /// is ascending.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    /// The numeric form used by the store (`1` or `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

impl From<&str> for SortDirection {
    fn from(value: &str) -> Self {
        SortDirection::parse(value)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Builds a sort from raw caller input. An empty field means natural order.
    pub fn parse(field: &str, direction: &str) -> Option<Self> {
        let field = field.trim();
        if field.is_empty() {
            return None;
        }

        Some(Self::new(field, SortDirection::parse(direction)))
    }
}

/// How a fetch orders and slices the matching documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return. `None` returns everything.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Options for one page of results.
    pub fn page(window: &PageWindow, sort: Option<Sort>) -> Self {
        Self {
            sort,
            skip: window.offset(),
            limit: Some(window.limit()),
        }
    }

    /// Options for an unbounded fetch in natural order.
    pub fn all() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_case_insensitive() {
        assert_eq!(SortDirection::parse("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("Desc"), SortDirection::Desc);
        assert_eq!(SortDirection::from("ASC"), SortDirection::Asc);
    }

    #[test]
    fn unknown_direction_is_ascending() {
        for raw in ["", "up", "descending", "-1"] {
            assert_eq!(SortDirection::parse(raw), SortDirection::Asc, "{raw:?}");
        }
    }

    #[test]
    fn empty_field_means_natural_order() {
        assert_eq!(Sort::parse("", "desc"), None);
        assert_eq!(Sort::parse("   ", "asc"), None);
        assert_eq!(
            Sort::parse("createdAt", "DESC"),
            Some(Sort::new("createdAt", SortDirection::Desc))
        );
    }

    #[test]
    fn page_options_follow_window() {
        let window = PageWindow::new(3, 20).unwrap();

        let options = FindOptions::page(&window, Sort::parse("seenAt", "asc"));

        assert_eq!(options.skip, 40);
        assert_eq!(options.limit, Some(20));
        assert_eq!(options.sort.map(|s| s.direction.as_i32()), Some(1));
        assert_eq!(FindOptions::all().limit, None);
    }
}
