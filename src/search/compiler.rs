//! Raw query string → [`QueryPlan`].
//!
//! The query language is small:
//!
//! - `&` separates required groups (explicit AND).
//! - `field:word` and `field:"several words"` restrict words to one known field.
//! - `"quoted text"` and reference numbers such as `123-456` match as phrases.
//! - `YYYY-YYYY` anywhere in the query becomes a non-scoring year filter.
//! - Everything else is matched loosely across the weighted fields.
//!
//! Field names and weights come from the document-type registry and are
//! injected at construction, so compilation is a pure function of its input.

use thiserror::Error;

use super::field_scope::FieldScopeSplitter;
use super::phrase::compile_text;
use super::plan::{
    Clause, CompiledQuery, Group, KeywordSet, QueryPlan, WeightedField, add_keywords,
};
use super::year_range::extract_year_range;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("query contains no search terms")]
    EmptyQuery,
}

#[derive(Debug, Clone)]
pub struct QueryCompiler {
    splitter: FieldScopeSplitter,
    weighted_fields: Vec<WeightedField>,
}

impl QueryCompiler {
    pub fn new<'a>(
        known_fields: impl IntoIterator<Item = &'a str>,
        weighted_fields: Vec<WeightedField>,
    ) -> Self {
        Self {
            splitter: FieldScopeSplitter::new(known_fields),
            weighted_fields,
        }
    }

    pub fn weighted_fields(&self) -> &[WeightedField] {
        &self.weighted_fields
    }

    pub fn compile(&self, q: &str) -> Result<CompiledQuery, CompileError> {
        let (year_range, q) = extract_year_range(q);
        let mut keywords = KeywordSet::new();
        let groups: Vec<Group> = q
            .split('&')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.compile_segment(segment, &mut keywords))
            .collect();

        let plan = QueryPlan::new(groups, year_range).ok_or(CompileError::EmptyQuery)?;
        tracing::debug!(
            groups = plan.groups().len(),
            keywords = keywords.len(),
            year_range = ?plan.year_range(),
            "compile_query"
        );
        Ok(CompiledQuery { plan, keywords })
    }

    fn compile_segment(&self, segment: &str, keywords: &mut KeywordSet) -> Group {
        if !segment.contains(':') {
            add_keywords(keywords, segment);
            return Group {
                clauses: compile_text(segment, &self.weighted_fields)
                    .into_iter()
                    .collect(),
            };
        }

        let split = self.splitter.split(segment);
        let mut clauses = Vec::with_capacity(split.scopes.len() + 1);
        for scope in split.scopes {
            add_keywords(keywords, &scope.value);
            clauses.push(Clause::field(scope.field, scope.value));
        }
        add_keywords(keywords, &split.leftover);
        clauses.extend(compile_text(&split.leftover, &self.weighted_fields));
        Group { clauses }
    }
}
