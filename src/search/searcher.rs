//! One search request from raw query string to renderable outcome.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::model::doctype::{DocType, Registry, YEAR_FIELD};
use crate::search::compiler::CompileError;
use crate::search::pagination::PageWindow;
use crate::search::plan::{CompiledQuery, KeywordSet};
use crate::search::suggest::{
    QueryParams, build_suggestions, collect_candidates, suggestion_seeds,
};
use crate::search::tantivy::{SearchHit, SearchRequest, SortOrder, TantivyIndex};

/// Sort choices offered to users, as `(value, label)`.
pub const SORT_OPTIONS: &[(&str, &str)] = &[
    ("jaar", "Jaartal (oplopend)"),
    ("-jaar", "Jaartal (aflopend)"),
];

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub q: String,
    pub doctypes: Vec<String>,
    /// Comma separated sort keys, `-` prefix for descending.
    pub sort: Option<String>,
    /// 1-based.
    pub page: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub q: String,
    pub keywords: KeywordSet,
    pub total: usize,
    pub page: usize,
    pub pages: Vec<usize>,
    /// Append a page number to get a pagination link.
    pub page_link_prefix: String,
    pub hits: Vec<SearchHit>,
    /// Candidate word → query string; only filled on the first page.
    pub suggestions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Nothing to search for; ask the user for a search term.
    Empty { q: String },
    Results(Box<SearchPage>),
}

/// Request-scoped searcher over a shared, read-only configuration.
pub struct Searcher<'a> {
    config: &'a Config,
    index: &'a TantivyIndex,
}

impl<'a> Searcher<'a> {
    pub fn new(config: &'a Config, index: &'a TantivyIndex) -> Self {
        Self { config, index }
    }

    pub fn run(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let registry = &self.config.registry;
        let selection = registry.select(&params.doctypes)?;
        let q = params.q.to_lowercase();
        let CompiledQuery { plan, keywords } = match Registry::compiler(&selection).compile(&q) {
            Ok(compiled) => compiled,
            Err(CompileError::EmptyQuery) => {
                tracing::debug!(q = params.q.as_str(), "search_empty_query");
                return Ok(SearchOutcome::Empty {
                    q: params.q.clone(),
                });
            }
        };

        let page = params.page.max(1);
        let page_size = self.config.page_size;
        let selected: Vec<String> = selection.iter().map(|d| d.name.clone()).collect();
        let sort = params
            .sort
            .as_deref()
            .and_then(|spec| resolve_sort(&selection, spec));
        let results = self.index.search(&SearchRequest {
            plan: &plan,
            doctypes: &selected,
            sort,
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        })?;

        let query_params = QueryParams {
            q: params.q.clone(),
            doctypes: selected,
            sort: params.sort.clone().filter(|s| !s.is_empty()),
        };
        let suggestions = if page == 1 {
            self.suggestions(&keywords, &query_params)?
        } else {
            BTreeMap::new()
        };

        Ok(SearchOutcome::Results(Box::new(SearchPage {
            q: params.q.clone(),
            total: results.total,
            page,
            pages: PageWindow::compute(results.total, page, page_size).pages(),
            page_link_prefix: query_params.page_link_prefix(),
            hits: results.hits,
            suggestions,
            keywords,
        })))
    }

    fn suggestions(
        &self,
        keywords: &KeywordSet,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, String>> {
        let seeds = suggestion_seeds(keywords);
        let options = self.index.suggest_terms(
            &seeds,
            &self.config.suggest_fields,
            self.config.suggest_size,
        )?;
        let candidates = collect_candidates(options, &seeds);
        Ok(build_suggestions(keywords, &candidates, params))
    }
}

/// Resolve a sort specification such as `jaar`, `-jaar` or `-datum` against
/// the selected document types. Keys after the first sortable one are
/// ignored, as are keys no selected type can sort on.
pub fn resolve_sort(selection: &[&DocType], spec: &str) -> Option<SortOrder> {
    for key in spec.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let (descending, column) = match key.strip_prefix('-') {
            Some(column) => (true, column),
            None => (false, key),
        };
        match Registry::sort_field(selection, column) {
            Some(YEAR_FIELD) => {
                return Some(if descending {
                    SortOrder::YearDescending
                } else {
                    SortOrder::YearAscending
                });
            }
            _ => tracing::warn!(key, "sort_key_unsupported"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tantivy::DocumentInput;

    fn config() -> Config {
        Config::builtin().unwrap()
    }

    fn seeded(config: &Config) -> TantivyIndex {
        let mut index = TantivyIndex::create_in_ram(&config.registry).unwrap();
        for i in 0..25 {
            index
                .add_document(&DocumentInput {
                    id: i.to_string(),
                    doctype: "namenindex".into(),
                    year: None,
                    fields: [
                        ("naam".to_string(), format!("jan bakker {i}")),
                        ("datum".to_string(), format!("{}", 1500 + i)),
                    ]
                    .into_iter()
                    .collect(),
                })
                .unwrap();
        }
        index.commit().unwrap();
        index
    }

    #[test]
    fn sort_spec_resolution() {
        let config = config();
        let all = config.registry.select::<&str>(&[]).unwrap();
        assert_eq!(resolve_sort(&all, "jaar"), Some(SortOrder::YearAscending));
        assert_eq!(resolve_sort(&all, "-jaar"), Some(SortOrder::YearDescending));
        assert_eq!(resolve_sort(&all, "-datum"), Some(SortOrder::YearDescending));
        assert_eq!(resolve_sort(&all, "naam,-jaar"), Some(SortOrder::YearDescending));
        assert_eq!(resolve_sort(&all, "naam"), None);
        assert_eq!(resolve_sort(&all, ""), None);
    }

    #[test]
    fn empty_query_is_an_outcome_not_an_error() {
        let config = config();
        let index = seeded(&config);
        let outcome = Searcher::new(&config, &index)
            .run(&SearchParams {
                q: "   ".into(),
                page: 1,
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Empty { .. }));
    }

    #[test]
    fn first_page_has_window_and_suggestions() {
        let config = config();
        let index = seeded(&config);
        let outcome = Searcher::new(&config, &index)
            .run(&SearchParams {
                q: "Bakkr".into(),
                page: 1,
                ..Default::default()
            })
            .unwrap();
        let SearchOutcome::Results(page) = outcome else {
            panic!("expected results");
        };
        assert_eq!(page.total, 0);
        assert_eq!(page.pages, vec![1]);
        assert!(page.suggestions["bakker"].starts_with("?q=Bakkr%20bakker&index=namenindex"));
    }

    #[test]
    fn later_pages_skip_suggestions() {
        let config = config();
        let index = seeded(&config);
        let outcome = Searcher::new(&config, &index)
            .run(&SearchParams {
                q: "bakker 1500-1520".into(),
                doctypes: vec!["namenindex".into()],
                sort: Some("-jaar".into()),
                page: 2,
            })
            .unwrap();
        let SearchOutcome::Results(page) = outcome else {
            panic!("expected results");
        };
        assert_eq!(page.total, 21);
        assert_eq!(page.pages, vec![1, 2, 3]);
        assert_eq!(page.hits.len(), 10);
        assert_eq!(page.hits[0].year, Some(1510));
        assert!(page.suggestions.is_empty());
        assert_eq!(
            page.page_link_prefix,
            "?q=bakker%201500-1520&index=namenindex&sort=-jaar&page="
        );
    }

    #[test]
    fn page_far_past_the_end_is_empty() {
        let config = config();
        let index = seeded(&config);
        for page in [4, 1_000_000_000, usize::MAX] {
            let outcome = Searcher::new(&config, &index)
                .run(&SearchParams {
                    q: "jan".into(),
                    page,
                    ..Default::default()
                })
                .unwrap();
            let SearchOutcome::Results(results) = outcome else {
                panic!("expected results");
            };
            assert_eq!(results.total, 25);
            assert!(results.hits.is_empty());
            assert_eq!(results.pages, vec![1, 2, 3]);
        }
    }

    #[test]
    fn unknown_doctype_is_an_error() {
        let config = config();
        let index = seeded(&config);
        let result = Searcher::new(&config, &index).run(&SearchParams {
            q: "jan".into(),
            doctypes: vec!["onbekend".into()],
            page: 1,
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
