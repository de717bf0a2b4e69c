//! Compiled query plan.
//!
//! A [`QueryPlan`] is what the compiler hands to a backend: a conjunction of
//! required [`Group`]s plus an optional year filter that must not influence
//! ranking. The types are backend-neutral; `search::tantivy` translates them.

use serde::Serialize;
use std::collections::BTreeSet;

/// A searchable field and its relevance weight in multi-field matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedField {
    pub name: String,
    pub weight: f32,
}

impl WeightedField {
    pub fn new(name: impl Into<String>, weight: f32) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Inclusive year range taken from a `YYYY-YYYY` token in the raw query.
///
/// `start` is not required to be `<= end`; an inverted range matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Clause {
    /// Every word of `value` must occur in `field`.
    Field { field: String, value: String },
    /// Exact phrase across the weighted fields.
    Phrase {
        text: String,
        fields: Vec<WeightedField>,
    },
    /// Relevance-scored word match across the weighted fields.
    Fuzzy {
        text: String,
        fields: Vec<WeightedField>,
    },
    /// Conjunction of nested clauses.
    All { clauses: Vec<Clause> },
}

impl Clause {
    pub fn field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Clause::Field {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Visit every leaf clause in order, descending into `All`.
    pub fn leaves(&self) -> Vec<&Clause> {
        match self {
            Clause::All { clauses } => clauses.iter().flat_map(Clause::leaves).collect(),
            leaf => vec![leaf],
        }
    }
}

/// One `&`-separated segment of the query; all clauses are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Group {
    pub clauses: Vec<Clause>,
}

impl Group {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Conjunction of at least one non-empty group plus an optional year filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    groups: Vec<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year_range: Option<YearRange>,
}

impl QueryPlan {
    /// Returns `None` when no non-empty group remains.
    pub(crate) fn new(groups: Vec<Group>, year_range: Option<YearRange>) -> Option<Self> {
        let groups: Vec<Group> = groups.into_iter().filter(|g| !g.is_empty()).collect();
        if groups.is_empty() {
            return None;
        }
        Some(Self { groups, year_range })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn year_range(&self) -> Option<YearRange> {
        self.year_range
    }

    /// All leaf clauses of all groups, in query order.
    pub fn leaves(&self) -> impl Iterator<Item = &Clause> {
        self.groups
            .iter()
            .flat_map(|g| g.clauses.iter())
            .flat_map(Clause::leaves)
    }
}

/// Literal search words, quotes stripped. Only used for highlighting and as
/// suggestion seeds; never parsed again.
pub type KeywordSet = BTreeSet<String>;

/// Output of [`crate::search::compiler::QueryCompiler::compile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub plan: QueryPlan,
    pub keywords: KeywordSet,
}

/// Add every whitespace-separated word of `text` to `keywords`, with
/// surrounding double quotes removed.
pub(crate) fn add_keywords(keywords: &mut KeywordSet, text: &str) {
    for word in text.split_whitespace() {
        let word = word.trim_matches('"');
        if !word.is_empty() {
            keywords.insert(word.to_string());
        }
    }
}
