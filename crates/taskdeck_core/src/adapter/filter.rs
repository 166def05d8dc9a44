//! Ordered in-memory filter pipeline shared by saved views and templates.
//!
//! Stages run as type → category → visibility → text → sort. Every stage is
//! optional and the pipeline stops as soon as a stage leaves nothing.

use std::cmp::Ordering;

/// Sort key accepted by [`ListQuery`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Name,
    CreatedAt,
    UpdatedAt,
    /// Usage counter for templates, item count for collections.
    Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Query options for filtered listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Exact `type` match.
    pub kind: Option<String>,
    /// Exact `category` match.
    pub category: Option<String>,
    /// Hidden records are dropped unless set.
    pub include_hidden: bool,
    /// Case-insensitive substring over name/description/tags.
    pub search: Option<String>,
    pub sort: Option<(SortBy, SortDirection)>,
}

impl ListQuery {
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn in_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn sorted(mut self, by: SortBy, direction: SortDirection) -> Self {
        self.sort = Some((by, direction));
        self
    }
}

/// Record shape the pipeline understands.
pub trait Filterable {
    fn kind(&self) -> &str;
    fn category(&self) -> Option<&str>;
    fn is_hidden(&self) -> bool;
    fn name(&self) -> &str;
    /// `needle` is already lower-cased.
    fn matches_text(&self, needle: &str) -> bool;
    fn created_at(&self) -> Option<i64>;
    fn updated_at(&self) -> Option<i64>;
    fn usage(&self) -> u64;
}

/// Applies `query` to `records`, preserving input order unless sorting.
pub fn apply<T: Filterable>(mut records: Vec<T>, query: &ListQuery) -> Vec<T> {
    if let Some(kind) = query.kind.as_deref() {
        records.retain(|record| record.kind() == kind);
        if records.is_empty() {
            return records;
        }
    }

    if let Some(category) = query.category.as_deref() {
        records.retain(|record| record.category() == Some(category));
        if records.is_empty() {
            return records;
        }
    }

    if !query.include_hidden {
        records.retain(|record| !record.is_hidden());
        if records.is_empty() {
            return records;
        }
    }

    if let Some(needle) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|needle| !needle.is_empty())
    {
        let needle = needle.to_lowercase();
        records.retain(|record| record.matches_text(&needle));
        if records.is_empty() {
            return records;
        }
    }

    if let Some((by, direction)) = query.sort {
        records.sort_by(|left, right| {
            let ordering = compare(left, right, by);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    records
}

fn compare<T: Filterable>(left: &T, right: &T, by: SortBy) -> Ordering {
    match by {
        SortBy::Name => left
            .name()
            .to_lowercase()
            .cmp(&right.name().to_lowercase()),
        SortBy::CreatedAt => left.created_at().cmp(&right.created_at()),
        SortBy::UpdatedAt => left.updated_at().cmp(&right.updated_at()),
        SortBy::Usage => left.usage().cmp(&right.usage()),
    }
}
