//! Search layer facade.
//!
//! - **[`compiler`]**: raw query string → [`plan::QueryPlan`], built from
//!   [`year_range`], [`field_scope`] and [`phrase`].
//! - **[`pagination`]**: page numbers to show in the navigation bar.
//! - **[`suggest`]**: "did you mean" query strings.
//! - **[`tantivy`]**: index, plan translation, execution and term suggestions.
//! - **[`searcher`]**: one request end to end.

pub mod compiler;
pub mod field_scope;
pub mod pagination;
pub mod phrase;
pub mod plan;
pub mod searcher;
pub mod suggest;
pub mod tantivy;
pub mod year_range;
