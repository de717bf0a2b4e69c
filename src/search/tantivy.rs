//! Tantivy-backed document store for compiled query plans.
//!
//! All document types share one index. Every registry field becomes a text
//! field; `doctype` restricts a search to the selected types and `jaar` holds
//! the numeric year used for range filtering and sorting.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::Included;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{
    BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, Occur, PhraseQuery, Query, RangeQuery,
    TermQuery,
};
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TEXT, Value,
};
use tantivy::snippet::SnippetGenerator;
use tantivy::tokenizer::TokenStream;
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter, Order, ReloadPolicy, Searcher as IndexSearcher,
    TantivyDocument, Term,
};

use crate::model::doctype::{DOCTYPE_FIELD, ID_FIELD, Registry, YEAR_FIELD, derive_year};
use crate::search::plan::{Clause, QueryPlan, WeightedField};

const SCHEMA_VERSION: &str = "v1";
const WRITER_HEAP_BYTES: usize = 50_000_000;
/// Upper bound on highlighted text per field; large enough to cover a card.
const HIGHLIGHT_MAX_CHARS: usize = 100_000;
/// Shorter tokens never get term suggestions.
const SUGGEST_MIN_WORD_LEN: usize = 4;
const SUGGEST_MAX_EDITS: usize = 2;
/// Deepest result position a search can page to; hits beyond it are counted
/// but never collected.
pub const MAX_RESULT_WINDOW: usize = 10_000;

#[derive(Clone, Debug)]
pub struct Fields {
    pub id: Field,
    pub doctype: Field,
    pub year: Field,
    pub text: BTreeMap<String, Field>,
}

/// One record to index. `year` is derived from the document type's year
/// source field when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    pub id: String,
    pub doctype: String,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    YearAscending,
    YearDescending,
}

#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub plan: &'a QueryPlan,
    /// Document type names to search; empty means all.
    pub doctypes: &'a [String],
    /// `None` ranks by relevance.
    pub sort: Option<SortOrder>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub doctype: String,
    /// Relevance score; absent when sorted by year.
    pub score: Option<f32>,
    pub year: Option<i64>,
    pub fields: BTreeMap<String, String>,
    /// Whole-field highlights (`<b>…</b>`) for fields that matched.
    pub highlights: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocCounts {
    pub total: usize,
    /// Per document type name; types without cards count zero.
    pub doctypes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

pub struct TantivyIndex {
    index: Index,
    writer: Option<IndexWriter>,
    fields: Fields,
    registry: Registry,
}

impl TantivyIndex {
    pub fn open_or_create(path: &Path, registry: &Registry) -> Result<Self> {
        let schema = build_schema(registry);
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating index directory {}", path.display()))?;
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, schema)?
        };
        Self::from_index(index, registry)
    }

    pub fn create_in_ram(registry: &Registry) -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema(registry)), registry)
    }

    fn from_index(index: Index, registry: &Registry) -> Result<Self> {
        let fields = fields_from_schema(&index.schema(), registry)
            .context("index schema does not match the configured document types; rebuild it")?;
        Ok(Self {
            index,
            writer: None,
            fields,
            registry: registry.clone(),
        })
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn add_document(&mut self, input: &DocumentInput) -> Result<()> {
        let doctype = self
            .registry
            .get(&input.doctype)
            .ok_or_else(|| anyhow!("unknown document type `{}`", input.doctype))?;
        if input.id.trim().is_empty() {
            bail!("document of type `{}` has no id", input.doctype);
        }

        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.id, &input.id);
        doc.add_text(self.fields.doctype, &doctype.name);
        for (name, value) in &input.fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let field = doctype
                .fields
                .iter()
                .find(|f| &f.name == name)
                .and_then(|f| self.fields.text.get(&f.name));
            match field {
                Some(field) => doc.add_text(*field, value),
                None => tracing::warn!(
                    id = input.id.as_str(),
                    doctype = input.doctype.as_str(),
                    field = name.as_str(),
                    "document_field_unknown"
                ),
            }
        }
        let year = input.year.or_else(|| {
            doctype
                .year_source
                .as_ref()
                .and_then(|source| input.fields.get(source))
                .and_then(|datum| derive_year(datum.trim()))
        });
        if let Some(year) = year {
            doc.add_i64(self.fields.year, year);
        }

        let id_term = Term::from_field_text(self.fields.id, &input.id);
        let writer = self.writer()?;
        writer.delete_term(id_term);
        writer.add_document(doc)?;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.commit()?;
        }
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut IndexWriter> {
        if self.writer.is_none() {
            let writer = self
                .index
                .writer_with_num_threads(1, WRITER_HEAP_BYTES)
                .with_context(|| "create index writer")?;
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| anyhow!("index writer unavailable"))
    }

    /// A reader pinned to the latest commit.
    fn searcher(&self) -> Result<IndexSearcher> {
        let reader: IndexReader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(reader.searcher())
    }

    fn text_field(&self, name: &str) -> Result<Field> {
        self.fields
            .text
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("field `{name}` is not in the index schema"))
    }

    /// Run `text` through the field's analyzer.
    fn analyze(&self, field: Field, text: &str) -> Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while let Some(token) = stream.next() {
            tokens.push(token.text.clone());
        }
        Ok(tokens)
    }

    /// Translate a plan into one tantivy query. The year filter and the
    /// document-type restriction are required but never add to the score.
    pub fn translate(&self, plan: &QueryPlan, doctypes: &[String]) -> Result<Box<dyn Query>> {
        let mut must: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for group in plan.groups() {
            let clauses = group
                .clauses
                .iter()
                .map(|c| Ok((Occur::Must, self.clause_query(c)?)))
                .collect::<Result<Vec<_>>>()?;
            must.push((Occur::Must, Box::new(BooleanQuery::new(clauses))));
        }

        if let Some(range) = plan.year_range() {
            let filter = RangeQuery::new(
                Included(Term::from_field_i64(self.fields.year, range.start)),
                Included(Term::from_field_i64(self.fields.year, range.end)),
            );
            must.push((
                Occur::Must,
                Box::new(ConstScoreQuery::new(Box::new(filter), 0.0)),
            ));
        }

        if !doctypes.is_empty() {
            let terms = doctypes
                .iter()
                .map(|name| {
                    (
                        Occur::Should,
                        Box::new(TermQuery::new(
                            Term::from_field_text(self.fields.doctype, name),
                            IndexRecordOption::Basic,
                        )) as Box<dyn Query>,
                    )
                })
                .collect();
            must.push((
                Occur::Must,
                Box::new(ConstScoreQuery::new(Box::new(BooleanQuery::new(terms)), 0.0)),
            ));
        }

        Ok(Box::new(BooleanQuery::new(must)))
    }

    fn clause_query(&self, clause: &Clause) -> Result<Box<dyn Query>> {
        match clause {
            Clause::Field { field, value } => {
                let field = self.text_field(field)?;
                let terms = self
                    .analyze(field, value)?
                    .into_iter()
                    .map(|token| {
                        (
                            Occur::Must,
                            term_query(Term::from_field_text(field, &token)),
                        )
                    })
                    .collect::<Vec<_>>();
                Ok(non_empty(terms))
            }
            Clause::Phrase { text, fields } => {
                let mut per_field = Vec::new();
                for (field, weight) in self.schema_fields(fields) {
                    let terms: Vec<Term> = self
                        .analyze(field, text)?
                        .iter()
                        .map(|token| Term::from_field_text(field, token))
                        .collect();
                    let query: Box<dyn Query> = match terms.len() {
                        0 => continue,
                        1 => term_query(terms[0].clone()),
                        _ => Box::new(PhraseQuery::new(terms)),
                    };
                    per_field.push((Occur::Should, boosted(query, weight)));
                }
                Ok(non_empty(per_field))
            }
            Clause::Fuzzy { text, fields } => {
                let mut per_term = Vec::new();
                for (field, weight) in self.schema_fields(fields) {
                    for token in self.analyze(field, text)? {
                        let query = term_query(Term::from_field_text(field, &token));
                        per_term.push((Occur::Should, boosted(query, weight)));
                    }
                }
                Ok(non_empty(per_term))
            }
            Clause::All { clauses } => {
                let nested = clauses
                    .iter()
                    .map(|c| Ok((Occur::Must, self.clause_query(c)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(non_empty(nested))
            }
        }
    }

    /// Weighted fields that exist in the schema; others are skipped.
    fn schema_fields(&self, fields: &[WeightedField]) -> Vec<(Field, f32)> {
        fields
            .iter()
            .filter_map(|f| self.fields.text.get(&f.name).map(|field| (*field, f.weight)))
            .collect()
    }

    pub fn search(&self, request: &SearchRequest<'_>) -> Result<SearchResults> {
        let searcher = self.searcher()?;
        let query = self.translate(request.plan, request.doctypes)?;
        tracing::info!(
            backend = "tantivy",
            groups = request.plan.groups().len(),
            doctypes = request.doctypes.len(),
            sort = ?request.sort,
            limit = request.limit,
            offset = request.offset,
            "search_start"
        );

        if request.offset >= MAX_RESULT_WINDOW || request.limit == 0 {
            let total = searcher.search(&*query, &Count)?;
            tracing::warn!(
                offset = request.offset,
                max_window = MAX_RESULT_WINDOW,
                total,
                "search_beyond_window"
            );
            return Ok(SearchResults {
                total,
                hits: Vec::new(),
            });
        }
        let limit = request.limit.min(MAX_RESULT_WINDOW - request.offset);
        let top = TopDocs::with_limit(limit).and_offset(request.offset);
        let (addresses, total): (Vec<(Option<f32>, DocAddress)>, usize) = match request.sort {
            None => {
                let (docs, total) = searcher.search(&*query, &(top, Count))?;
                (
                    docs.into_iter()
                        .map(|(score, addr)| (Some(score), addr))
                        .collect(),
                    total,
                )
            }
            Some(order) => {
                let order = match order {
                    SortOrder::YearAscending => Order::Asc,
                    SortOrder::YearDescending => Order::Desc,
                };
                let by_year = top.order_by_fast_field::<i64>(YEAR_FIELD, order);
                let (docs, total) = searcher.search(&*query, &(by_year, Count))?;
                (
                    docs.into_iter().map(|(_year, addr)| (None, addr)).collect(),
                    total,
                )
            }
        };

        let mut generators = Vec::with_capacity(self.fields.text.len());
        for (name, field) in &self.fields.text {
            let mut generator = SnippetGenerator::create(&searcher, &*query, *field)?;
            generator.set_max_num_chars(HIGHLIGHT_MAX_CHARS);
            generators.push((name, *field, generator));
        }

        let mut hits = Vec::with_capacity(addresses.len());
        for (score, addr) in addresses {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let mut hit = self.hit_from_doc(&doc, score);
            for (name, field, generator) in &generators {
                if doc.get_first(*field).is_none() {
                    continue;
                }
                let snippet = generator.snippet_from_doc(&doc);
                if !snippet.highlighted().is_empty() {
                    hit.highlights.insert((*name).clone(), snippet.to_html());
                }
            }
            hits.push(hit);
        }

        tracing::info!(total, returned = hits.len(), "search_done");
        Ok(SearchResults { total, hits })
    }

    /// The card stored under `id`, without score or highlights.
    pub fn get(&self, id: &str) -> Result<Option<SearchHit>> {
        let searcher = self.searcher()?;
        let query = TermQuery::new(
            Term::from_field_text(self.fields.id, id),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_, addr)) = top.into_iter().next() else {
            tracing::debug!(id, "document_not_found");
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(addr)?;
        Ok(Some(self.hit_from_doc(&doc, None)))
    }

    /// Number of indexed cards, overall and per configured document type.
    pub fn doc_counts(&self) -> Result<DocCounts> {
        let searcher = self.searcher()?;
        let mut doctypes = BTreeMap::new();
        for doctype in self.registry.doctypes() {
            let query = TermQuery::new(
                Term::from_field_text(self.fields.doctype, &doctype.name),
                IndexRecordOption::Basic,
            );
            doctypes.insert(doctype.name.clone(), searcher.search(&query, &Count)?);
        }
        Ok(DocCounts {
            total: usize::try_from(searcher.num_docs())?,
            doctypes,
        })
    }

    fn hit_from_doc(&self, doc: &TantivyDocument, score: Option<f32>) -> SearchHit {
        let fields = self
            .fields
            .text
            .iter()
            .filter_map(|(name, field)| {
                let value = doc.get_first(*field).and_then(|v| v.as_str())?;
                Some((name.clone(), value.to_string()))
            })
            .collect();
        SearchHit {
            id: stored_str(doc, self.fields.id),
            doctype: stored_str(doc, self.fields.doctype),
            score,
            year: doc.get_first(self.fields.year).and_then(|v| v.as_i64()),
            fields,
            highlights: BTreeMap::new(),
        }
    }

    /// Spelling candidates for `tokens` from the term dictionaries of
    /// `fields`, as `(token, candidate)` pairs.
    ///
    /// A candidate starts with the same character as the token and is one or
    /// two edits away from it. Per token and field at most `size` candidates
    /// are returned, closest and most frequent first.
    pub fn suggest_terms(
        &self,
        tokens: &[String],
        fields: &[String],
        size: usize,
    ) -> Result<Vec<(String, String)>> {
        let tokens: Vec<&String> = tokens
            .iter()
            .filter(|t| t.chars().count() >= SUGGEST_MIN_WORD_LEN)
            .collect();
        if tokens.is_empty() || size == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.searcher()?;
        let mut out = Vec::new();
        for name in fields {
            let Some(field) = self.fields.text.get(name).copied() else {
                tracing::warn!(field = name.as_str(), "suggest_field_unknown");
                continue;
            };
            let dictionary = term_frequencies(&searcher, field, &tokens)?;
            for token in &tokens {
                let mut ranked: Vec<(usize, u32, &str)> = dictionary
                    .iter()
                    .filter_map(|(term, freq)| {
                        let distance = strsim::levenshtein(token, term);
                        (shares_first_char(token, term)
                            && (1..=SUGGEST_MAX_EDITS).contains(&distance))
                        .then_some((distance, *freq, term.as_str()))
                    })
                    .collect();
                ranked.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(b.2)));
                out.extend(
                    ranked
                        .into_iter()
                        .take(size)
                        .map(|(_, _, term)| ((*token).clone(), term.to_string())),
                );
            }
        }
        tracing::debug!(
            tokens = tokens.len(),
            candidates = out.len(),
            "suggest_terms"
        );
        Ok(out)
    }
}

/// Terms of `field` (with document frequency summed over segments) whose
/// first character matches the first character of some token.
fn term_frequencies(
    searcher: &IndexSearcher,
    field: Field,
    tokens: &[&String],
) -> Result<HashMap<String, u32>> {
    let firsts: Vec<char> = tokens.iter().filter_map(|t| t.chars().next()).collect();
    let mut dictionary: HashMap<String, u32> = HashMap::new();
    for segment in searcher.segment_readers() {
        let inverted = segment.inverted_index(field)?;
        let mut stream = inverted.terms().stream()?;
        while stream.advance() {
            let Ok(term) = std::str::from_utf8(stream.key()) else {
                continue;
            };
            if !term.chars().next().is_some_and(|c| firsts.contains(&c)) {
                continue;
            }
            *dictionary.entry(term.to_string()).or_default() += stream.value().doc_freq;
        }
    }
    Ok(dictionary)
}

fn shares_first_char(a: &str, b: &str) -> bool {
    a.chars().next().is_some() && a.chars().next() == b.chars().next()
}

fn term_query(term: Term) -> Box<dyn Query> {
    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
}

fn boosted(query: Box<dyn Query>, weight: f32) -> Box<dyn Query> {
    if (weight - 1.0).abs() < f32::EPSILON {
        query
    } else {
        Box::new(BoostQuery::new(query, weight))
    }
}

/// A clause whose text analyzes to nothing matches nothing.
fn non_empty(clauses: Vec<(Occur, Box<dyn Query>)>) -> Box<dyn Query> {
    if clauses.is_empty() {
        Box::new(EmptyQuery)
    } else {
        Box::new(BooleanQuery::new(clauses))
    }
}

fn stored_str(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn build_schema(registry: &Registry) -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(ID_FIELD, STRING | STORED);
    schema_builder.add_text_field(DOCTYPE_FIELD, STRING | STORED);
    schema_builder.add_i64_field(YEAR_FIELD, INDEXED | STORED | FAST);
    for name in registry.schema_fields() {
        schema_builder.add_text_field(name, TEXT | STORED);
    }
    schema_builder.build()
}

pub fn fields_from_schema(schema: &Schema, registry: &Registry) -> Result<Fields> {
    let get = |name: &str| {
        schema
            .get_field(name)
            .map_err(|_| anyhow!("schema missing {name}"))
    };
    let mut text = BTreeMap::new();
    for name in registry.schema_fields() {
        text.insert(name.to_string(), get(name)?);
    }
    Ok(Fields {
        id: get(ID_FIELD)?,
        doctype: get(DOCTYPE_FIELD)?,
        year: get(YEAR_FIELD)?,
        text,
    })
}

pub fn index_dir(base: &Path) -> Result<PathBuf> {
    let dir = base.join("index").join(SCHEMA_VERSION);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
