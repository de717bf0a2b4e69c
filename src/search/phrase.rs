use once_cell::sync::Lazy;
use regex::Regex;

use super::plan::{Clause, WeightedField};

/// Quoted phrases, and bare archive reference numbers like `123-45` or
/// `12-345-6` which must match as a unit.
static PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|[0-9]+-[0-9]+(?:-[0-9]+)?"#).expect("phrase regex"));

/// Compile free text into phrase clauses and one trailing fuzzy clause.
///
/// Returns `None` when the text contributes nothing. Without any phrase the
/// result is a single [`Clause::Fuzzy`] over the whole text.
pub fn compile_text(text: &str, weighted_fields: &[WeightedField]) -> Option<Clause> {
    let mut clauses = Vec::new();
    let mut leftover = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in PHRASE_RE.find_iter(text) {
        leftover.push_str(&text[cursor..m.start()]);
        leftover.push(' ');
        cursor = m.end();
        let phrase = m.as_str().trim_matches('"').trim();
        if !phrase.is_empty() {
            clauses.push(Clause::Phrase {
                text: phrase.to_string(),
                fields: weighted_fields.to_vec(),
            });
        }
    }
    leftover.push_str(&text[cursor..]);

    let leftover = leftover.split_whitespace().collect::<Vec<_>>().join(" ");
    if leftover.chars().any(char::is_alphanumeric) {
        clauses.push(Clause::Fuzzy {
            text: leftover,
            fields: weighted_fields.to_vec(),
        });
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Clause::All { clauses }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<WeightedField> {
        vec![
            WeightedField::new("naam", 3.0),
            WeightedField::new("inhoud", 1.0),
        ]
    }

    fn phrase(text: &str) -> Clause {
        Clause::Phrase {
            text: text.into(),
            fields: fields(),
        }
    }

    fn fuzzy(text: &str) -> Clause {
        Clause::Fuzzy {
            text: text.into(),
            fields: fields(),
        }
    }

    #[test]
    fn plain_words_become_one_fuzzy_clause() {
        assert_eq!(compile_text("jan bakker", &fields()), Some(fuzzy("jan bakker")));
    }

    #[test]
    fn empty_text_contributes_nothing() {
        assert_eq!(compile_text("", &fields()), None);
        assert_eq!(compile_text("   ", &fields()), None);
        assert_eq!(compile_text("\"\"", &fields()), None);
    }

    #[test]
    fn phrases_and_leftover_are_anded() {
        let out = compile_text(r#"smid "jan de bakker" groesbeek"#, &fields());
        assert_eq!(
            out,
            Some(Clause::All {
                clauses: vec![phrase("jan de bakker"), fuzzy("smid groesbeek")],
            })
        );
    }

    #[test]
    fn lone_phrase_is_returned_directly() {
        assert_eq!(
            compile_text(r#""jan de bakker""#, &fields()),
            Some(phrase("jan de bakker"))
        );
    }

    #[test]
    fn reference_numbers_are_phrases() {
        let out = compile_text("akte 123-456 en 12-34-56", &fields());
        assert_eq!(
            out,
            Some(Clause::All {
                clauses: vec![phrase("123-456"), phrase("12-34-56"), fuzzy("akte en")],
            })
        );
    }

    #[test]
    fn non_ascii_reference_numbers_stay_fuzzy() {
        let text = "akte \u{661}\u{662}-\u{663}\u{664}";
        assert_eq!(compile_text(text, &fields()), Some(fuzzy(text)));
    }

    #[test]
    fn punctuation_only_leftover_is_dropped() {
        assert_eq!(compile_text(r#""jan" : -"#, &fields()), Some(phrase("jan")));
    }

    #[test]
    fn colons_in_free_text_are_kept() {
        assert_eq!(
            compile_text("value:with:colons", &fields()),
            Some(fuzzy("value:with:colons"))
        );
    }
}
