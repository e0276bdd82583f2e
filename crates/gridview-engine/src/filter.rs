//! Row filtering and highlighting
//!
//! Filters are applied cumulatively: each predicate narrows the rows that
//! survived the previous ones. Excluded rows stay in the store so a filter can
//! be removed again by re-evaluating the remaining predicates from scratch.

use std::collections::HashSet;
use std::sync::Arc;

use gridview_core::{FunctionRegistry, GridError, Predicate, Result, RowId, RowRecord, TypeConverter};
use regex::{Regex, RegexBuilder};

/// What a filter predicate matches against
#[derive(Clone)]
pub enum FilterPattern {
    /// Substring match
    Text(String),
    /// Regular expression, compiled once with and once without case folding
    Regex {
        source: String,
        flags: String,
        regex: Regex,
        folded: Regex,
    },
    /// Predicate looked up by name in the [`FunctionRegistry`]
    Function(String),
    /// Predicate supplied directly by the caller
    Predicate(Predicate),
}

impl FilterPattern {
    pub fn text(pattern: impl Into<String>) -> Self {
        Self::Text(pattern.into())
    }

    /// Compile a regular expression. Supported flags: `i`, `m`, `s`, `x`;
    /// `g` is accepted and ignored.
    pub fn regex(source: &str, flags: &str) -> Result<Self> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                'g' => {}
                other => {
                    return Err(GridError::InvalidPattern(format!(
                        "unsupported regex flag '{}' in /{}/{}",
                        other, source, flags
                    )));
                }
            }
        }
        let regex = builder
            .build()
            .map_err(|e| GridError::InvalidPattern(e.to_string()))?;
        let folded = builder
            .case_insensitive(true)
            .build()
            .map_err(|e| GridError::InvalidPattern(e.to_string()))?;
        Ok(Self::Regex {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
            folded,
        })
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::Function(name.into())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Parse textual input: `/source/flags` is a regex, anything else is text
    pub fn parse(input: &str) -> Result<Self> {
        if let Some(rest) = input.strip_prefix('/') {
            if let Some(end) = rest.rfind('/') {
                let (source, flags) = (&rest[..end], &rest[end + 1..]);
                if flags.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Self::regex(source, flags);
                }
            }
        }
        Ok(Self::Text(input.to_string()))
    }

    fn matches(&self, text: &str, case_insensitive: bool, registry: &FunctionRegistry) -> bool {
        match self {
            Self::Text(pattern) => {
                if case_insensitive {
                    text.to_lowercase().contains(&pattern.to_lowercase())
                } else {
                    text.contains(pattern.as_str())
                }
            }
            Self::Regex { regex, folded, .. } => {
                if case_insensitive {
                    folded.is_match(text)
                } else {
                    regex.is_match(text)
                }
            }
            Self::Function(name) => match registry.predicate(name) {
                Some(predicate) => call_predicate(&predicate, text, case_insensitive),
                None => false,
            },
            Self::Predicate(predicate) => call_predicate(predicate, text, case_insensitive),
        }
    }
}

fn call_predicate(predicate: &Predicate, text: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        predicate(&text.to_lowercase())
    } else {
        predicate(text)
    }
}

impl PartialEq for FilterPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (
                Self::Regex {
                    source: a, flags: af, ..
                },
                Self::Regex {
                    source: b, flags: bf, ..
                },
            ) => a == b && af == bf,
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for FilterPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Regex { source, flags, .. } => write!(f, "Regex(/{}/{})", source, flags),
            Self::Function(name) => f.debug_tuple("Function").field(name).finish(),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// A single filter: pattern plus matching options.
///
/// Also used as the descriptor when removing a filter: a predicate is removed
/// when all four fields are equal.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterPredicate {
    pub pattern: FilterPattern,
    pub case_insensitive: bool,
    /// Match one column instead of the whole row's text
    pub column: Option<usize>,
    /// Keep the rows that do *not* match
    pub inverse: bool,
}

impl FilterPredicate {
    pub fn new(pattern: FilterPattern) -> Self {
        Self {
            pattern,
            case_insensitive: false,
            column: None,
            inverse: false,
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Self::new(FilterPattern::text(pattern))
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Whether `row` passes this predicate (inversion applied)
    pub fn accepts(&self, row: &RowRecord, registry: &FunctionRegistry) -> bool {
        let text = match self.column {
            Some(column) => row
                .cell(column)
                .map(TypeConverter::text_content)
                .unwrap_or_default(),
            None => row
                .cells
                .iter()
                .map(|c| TypeConverter::text_content(c))
                .collect::<String>(),
        };
        let matched = self.pattern.matches(&text, self.case_insensitive, registry);
        matched != self.inverse
    }
}

/// Result of applying filters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOutcome {
    /// Rows newly excluded by this call, in row order
    pub filtered_rows: Vec<RowId>,
    /// Rows surviving all active filters, in row order
    pub remaining_rows: Vec<RowId>,
}

/// Result of removing filters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterRemoval {
    /// Rows that were excluded before and survive now, in row order
    pub restored_rows: Vec<RowId>,
    pub remaining_rows: Vec<RowId>,
}

/// Active filters, the excluded set and highlight state
#[derive(Debug, Default)]
pub struct FilterEngine {
    predicates: Vec<FilterPredicate>,
    excluded: HashSet<RowId>,
    highlights: Vec<FilterPredicate>,
    highlighted: Vec<RowId>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }

    pub fn has_filters(&self) -> bool {
        !self.predicates.is_empty()
    }

    pub fn is_excluded(&self, id: RowId) -> bool {
        self.excluded.contains(&id)
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    /// Surviving ids of `order`, keeping its order
    pub fn surviving(&self, order: &[RowId]) -> Vec<RowId> {
        order
            .iter()
            .copied()
            .filter(|id| !self.excluded.contains(id))
            .collect()
    }

    /// Apply `predicates` left to right over the rows that currently survive.
    ///
    /// `rows` is the full row set in display order; rows excluded by earlier
    /// calls stay excluded.
    pub fn apply_filters(
        &mut self,
        rows: &[&RowRecord],
        predicates: Vec<FilterPredicate>,
        registry: &FunctionRegistry,
    ) -> FilterOutcome {
        let mut survivors: Vec<&RowRecord> = rows
            .iter()
            .copied()
            .filter(|row| !self.excluded.contains(&row.id))
            .collect();
        let mut newly_excluded: HashSet<RowId> = HashSet::new();

        for predicate in predicates {
            survivors.retain(|row| {
                let keep = predicate.accepts(row, registry);
                if !keep {
                    newly_excluded.insert(row.id);
                }
                keep
            });
            tracing::debug!(
                pattern = ?predicate.pattern,
                column = ?predicate.column,
                inverse = predicate.inverse,
                remaining = survivors.len(),
                "filter applied"
            );
            self.predicates.push(predicate);
        }

        self.excluded.extend(newly_excluded.iter().copied());
        self.refresh_highlights(rows, registry);

        FilterOutcome {
            filtered_rows: rows
                .iter()
                .map(|row| row.id)
                .filter(|id| newly_excluded.contains(id))
                .collect(),
            remaining_rows: survivors.iter().map(|row| row.id).collect(),
        }
    }

    /// Remove every predicate equal to `descriptor` and re-evaluate the rest
    pub fn remove_filter(
        &mut self,
        rows: &[&RowRecord],
        descriptor: &FilterPredicate,
        registry: &FunctionRegistry,
    ) -> FilterRemoval {
        let before = self.predicates.len();
        self.predicates.retain(|p| p != descriptor);
        if self.predicates.len() == before {
            tracing::debug!(pattern = ?descriptor.pattern, "no matching filter to remove");
            return FilterRemoval {
                restored_rows: Vec::new(),
                remaining_rows: self.surviving_ids(rows),
            };
        }
        self.rebuild(rows, registry)
    }

    /// Remove all filters
    pub fn clear(&mut self, rows: &[&RowRecord], registry: &FunctionRegistry) -> FilterRemoval {
        self.predicates.clear();
        self.rebuild(rows, registry)
    }

    /// Re-evaluate all active filters against a (possibly new) row set
    pub fn reapply(&mut self, rows: &[&RowRecord], registry: &FunctionRegistry) -> FilterOutcome {
        self.excluded.clear();
        let predicates = std::mem::take(&mut self.predicates);
        self.apply_filters(rows, predicates, registry)
    }

    fn rebuild(&mut self, rows: &[&RowRecord], registry: &FunctionRegistry) -> FilterRemoval {
        let previously_excluded = std::mem::take(&mut self.excluded);
        let remaining = self.reapply(rows, registry).remaining_rows;
        let restored_rows = rows
            .iter()
            .map(|row| row.id)
            .filter(|id| previously_excluded.contains(id) && !self.excluded.contains(id))
            .collect();
        FilterRemoval {
            restored_rows,
            remaining_rows: remaining,
        }
    }

    fn surviving_ids(&self, rows: &[&RowRecord]) -> Vec<RowId> {
        rows.iter()
            .map(|row| row.id)
            .filter(|id| !self.excluded.contains(id))
            .collect()
    }

    /// Currently highlighted rows, in row order
    pub fn highlighted(&self) -> &[RowId] {
        &self.highlighted
    }

    pub fn highlights(&self) -> &[FilterPredicate] {
        &self.highlights
    }

    /// Add a highlight predicate. Does not change the excluded set.
    ///
    /// Returns the surviving rows matched by `predicate`.
    pub fn highlight(
        &mut self,
        rows: &[&RowRecord],
        predicate: FilterPredicate,
        registry: &FunctionRegistry,
    ) -> Vec<RowId> {
        let matched = rows
            .iter()
            .filter(|row| !self.excluded.contains(&row.id))
            .filter(|row| predicate.accepts(row, registry))
            .map(|row| row.id)
            .collect();
        self.highlights.push(predicate);
        self.refresh_highlights(rows, registry);
        matched
    }

    /// Remove highlight predicates equal to `descriptor`, or all of them.
    ///
    /// Returns the rows still highlighted.
    pub fn remove_highlight(
        &mut self,
        rows: &[&RowRecord],
        descriptor: Option<&FilterPredicate>,
        registry: &FunctionRegistry,
    ) -> Vec<RowId> {
        match descriptor {
            Some(descriptor) => self.highlights.retain(|p| p != descriptor),
            None => self.highlights.clear(),
        }
        self.refresh_highlights(rows, registry);
        self.highlighted.clone()
    }

    fn refresh_highlights(&mut self, rows: &[&RowRecord], registry: &FunctionRegistry) {
        if self.highlights.is_empty() {
            self.highlighted.clear();
            return;
        }
        self.highlighted = rows
            .iter()
            .filter(|row| !self.excluded.contains(&row.id))
            .filter(|row| self.highlights.iter().any(|p| p.accepts(row, registry)))
            .map(|row| row.id)
            .collect();
    }
}
