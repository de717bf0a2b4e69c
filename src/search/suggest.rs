//! "Did you mean" links.
//!
//! The backend proposes replacement candidates per query token; this module
//! turns them into ready-to-use query strings that keep every other active
//! search parameter (selected document types, sort order).

use regex::{Captures, RegexBuilder};
use std::collections::{BTreeMap, BTreeSet};

use super::plan::KeywordSet;

/// Candidate replacements per token, each list sorted and deduplicated.
pub type SuggestionCandidates = BTreeMap<String, Vec<String>>;

/// The query-string parameters of a search page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub q: String,
    /// Selected document type (index) names, in selection order.
    pub doctypes: Vec<String>,
    pub sort: Option<String>,
}

impl QueryParams {
    /// `?q=…&index=…&sort=…`
    pub fn to_query_string(&self) -> String {
        let mut out = format!("?q={}", urlencoding::encode(&self.q));
        for doctype in &self.doctypes {
            out.push_str("&index=");
            out.push_str(&urlencoding::encode(doctype));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            out.push_str("&sort=");
            out.push_str(&urlencoding::encode(sort));
        }
        out
    }

    /// Prefix for pagination links; the page number is appended by the caller.
    pub fn page_link_prefix(&self) -> String {
        format!("{}&page=", self.to_query_string())
    }

    fn with_q(&self, q: String) -> Self {
        Self {
            q,
            doctypes: self.doctypes.clone(),
            sort: self.sort.clone(),
        }
    }
}

/// Tokens worth asking the backend about: purely numeric words are skipped.
pub fn suggestion_seeds(keywords: &KeywordSet) -> Vec<String> {
    keywords
        .iter()
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .cloned()
        .collect()
}

/// Group raw `(token, option)` pairs from the backend into sorted candidate
/// lists, dropping options that are already one of the query's own tokens.
pub fn collect_candidates<I>(options: I, seeds: &[String]) -> SuggestionCandidates
where
    I: IntoIterator<Item = (String, String)>,
{
    let seeds: BTreeSet<&str> = seeds.iter().map(String::as_str).collect();
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (token, option) in options {
        if seeds.contains(option.as_str()) {
            continue;
        }
        grouped.entry(token).or_default().insert(option);
    }
    grouped
        .into_iter()
        .map(|(token, options)| (token, options.into_iter().collect()))
        .collect()
}

/// Rewrite `q` so that every whole-word occurrence of `token` is followed by
/// `candidate`. Matching ignores case; the original spelling is kept.
pub fn rewrite_query(q: &str, token: &str, candidate: &str) -> String {
    let pattern = format!(r"\b{}\b", regex::escape(token));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re
            .replace_all(q, |caps: &Captures<'_>| format!("{} {candidate}", &caps[0]))
            .into_owned(),
        Err(err) => {
            tracing::warn!(token, error = %err, "suggestion_pattern_invalid");
            q.to_string()
        }
    }
}

/// Map every candidate word to the query string that searches for it.
///
/// Tokens absent from `keywords` are ignored. When two tokens propose the
/// same candidate the later token (in sorted order) wins.
pub fn build_suggestions(
    keywords: &KeywordSet,
    candidates: &SuggestionCandidates,
    params: &QueryParams,
) -> BTreeMap<String, String> {
    let mut urls = BTreeMap::new();
    for (token, options) in candidates {
        if !keywords.contains(token) {
            tracing::debug!(token = token.as_str(), "suggestion_token_not_in_query");
            continue;
        }
        for candidate in options {
            let q = rewrite_query(&params.q, token, candidate);
            urls.insert(candidate.clone(), params.with_q(q).to_query_string());
        }
    }
    urls
}
