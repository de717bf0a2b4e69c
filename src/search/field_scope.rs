//! `field:value` extraction.
//!
//! Splitting is done in two passes over the original text: the first pass
//! records the byte spans of every field scope, the second rebuilds the
//! leftover from whatever lies outside those spans. Nothing is removed from
//! the string while matches are still being searched for.

use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;

/// Pseudo-field meaning "search all weighted fields". Values scoped to it
/// are handed back as leftover text instead of becoming field clauses.
pub const ALL_FIELDS: &str = "alles";

/// A value scoped to one named field, quotes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldScope {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldScopes {
    /// Field scopes in the order they appear in the text.
    pub scopes: Vec<FieldScope>,
    /// Text outside every field scope, whitespace collapsed.
    pub leftover: String,
}

/// Matches `known:"quoted value"`, `known:token` or a free-standing quoted
/// span. Built once per compiler from the registry's field names.
#[derive(Debug, Clone)]
pub struct FieldScopeSplitter {
    re: Regex,
}

impl FieldScopeSplitter {
    pub fn new<'a>(known_fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names: BTreeSet<&str> = known_fields.into_iter().collect();
        names.insert(ALL_FIELDS);
        // Longest first so that a field never shadows a longer one sharing its prefix.
        let mut names: Vec<&str> = names.into_iter().filter(|n| !n.is_empty()).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r#"(?P<quoted>"[^"]*")|(?:^|\s)(?P<field>{alternation}):(?P<value>"[^"]*"|[^\s"]*)"#
        );
        let re = Regex::new(&pattern).expect("field scope regex from escaped names");
        Self { re }
    }

    pub fn split(&self, text: &str) -> FieldScopes {
        // Pass 1: locate field scopes.
        let mut scopes = Vec::new();
        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut leftover_values: Vec<(usize, String)> = Vec::new();
        for caps in self.re.captures_iter(text) {
            let (Some(field), Some(value)) = (caps.name("field"), caps.name("value")) else {
                // A free-standing quoted phrase; leave it to the phrase compiler.
                continue;
            };
            spans.push(field.start()..value.end());
            let raw = value.as_str();
            let inner = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(raw)
                .trim();
            if inner.is_empty() {
                continue;
            }
            if field.as_str() == ALL_FIELDS {
                // Keep the quotes so the phrase compiler still sees a phrase.
                leftover_values.push((field.start(), raw.to_string()));
            } else {
                scopes.push(FieldScope {
                    field: field.as_str().to_string(),
                    value: inner.to_string(),
                });
            }
        }

        // Pass 2: everything outside the recorded spans.
        let mut pieces: Vec<(usize, &str)> = Vec::new();
        let mut cursor = 0;
        for span in &spans {
            pieces.push((cursor, &text[cursor..span.start]));
            cursor = span.end;
        }
        pieces.push((cursor, &text[cursor..]));

        let mut ordered: Vec<(usize, &str)> = pieces;
        ordered.extend(leftover_values.iter().map(|(pos, v)| (*pos, v.as_str())));
        ordered.sort_by_key(|(pos, _)| *pos);
        let leftover = ordered
            .iter()
            .flat_map(|(_, piece)| piece.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");

        FieldScopes { scopes, leftover }
    }
}
