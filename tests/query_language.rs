//! Query language behaviour against the built-in document types.

use collectie_search::config::Config;
use collectie_search::model::doctype::Registry;
use collectie_search::search::compiler::{CompileError, QueryCompiler};
use collectie_search::search::plan::{Clause, KeywordSet, YearRange};

fn compiler_for(doctypes: &[&str]) -> QueryCompiler {
    let config = Config::builtin().expect("builtin config");
    let selection = config.registry.select(doctypes).expect("known doctypes");
    Registry::compiler(&selection)
}

fn keywords(words: &[&str]) -> KeywordSet {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn scoping_follows_selected_doctypes() {
    // `koper` only exists in the transport register.
    let namen = compiler_for(&["namenindex"]).compile("koper:jan").unwrap();
    assert!(matches!(
        namen.plan.groups()[0].clauses.as_slice(),
        [Clause::Fuzzy { text, .. }] if text == "koper:jan"
    ));

    let transport = compiler_for(&["transportregister"])
        .compile("koper:jan")
        .unwrap();
    assert_eq!(
        transport.plan.groups()[0].clauses,
        vec![Clause::field("koper", "jan")]
    );
}

#[test]
fn fuzzy_clause_carries_weighted_fields() {
    let compiled = compiler_for(&[]).compile("jan").unwrap();
    let Clause::Fuzzy { fields, .. } = &compiled.plan.groups()[0].clauses[0] else {
        panic!("expected fuzzy clause");
    };
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"naam"));
    assert!(names.contains(&"koper"));
    assert!(!names.contains(&"bijzonderheden"));
}

#[test]
fn full_query_composes_all_features() {
    let compiled = compiler_for(&[])
        .compile(r#"naam:"jan de" bakker 1500-1550 & "huis en hof" & bijzonderheden:zegel"#)
        .unwrap();
    let plan = &compiled.plan;
    assert_eq!(
        plan.year_range(),
        Some(YearRange {
            start: 1500,
            end: 1550
        })
    );
    assert_eq!(plan.groups().len(), 3);
    let kinds: Vec<&str> = plan
        .leaves()
        .map(|c| match c {
            Clause::Field { .. } => "field",
            Clause::Phrase { .. } => "phrase",
            Clause::Fuzzy { .. } => "fuzzy",
            Clause::All { .. } => "all",
        })
        .collect();
    assert_eq!(kinds, vec!["field", "fuzzy", "phrase", "field"]);
    assert_eq!(
        compiled.keywords,
        keywords(&["jan", "de", "bakker", "huis", "en", "hof", "zegel"])
    );
}

#[test]
fn only_separators_is_empty() {
    let compiler = compiler_for(&[]);
    for q in ["", "   ", "&", " & & ", "naam:", "naam: & datum:", "1500-1600"] {
        assert_eq!(compiler.compile(q), Err(CompileError::EmptyQuery), "{q:?}");
    }
}

#[test]
fn plan_serializes_for_inspection() {
    let compiled = compiler_for(&["namenindex"])
        .compile("naam:jan 1500-1510")
        .unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(json["plan"]["year_range"]["start"], 1500);
    assert_eq!(json["plan"]["groups"][0]["clauses"][0]["type"], "field");
    assert_eq!(json["plan"]["groups"][0]["clauses"][0]["field"], "naam");
    assert_eq!(json["keywords"][0], "jan");
}
