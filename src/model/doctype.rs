//! Document types and their field tables.
//!
//! The collection holds several record kinds, each with its own fields. A
//! [`Registry`] is loaded once from configuration and then only read: the
//! compiler asks it for weighted and scopable field names, the backend for
//! the union schema and sort columns.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::search::compiler::QueryCompiler;
use crate::search::plan::WeightedField;

/// Numeric year attribute used for range filtering and sorting.
pub const YEAR_FIELD: &str = "jaar";
/// Stored document id.
pub const ID_FIELD: &str = "id";
/// Name of the document type a record belongs to.
pub const DOCTYPE_FIELD: &str = "doctype";

const RESERVED_FIELDS: &[&str] = &[YEAR_FIELD, ID_FIELD, DOCTYPE_FIELD];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no document types configured")]
    Empty,

    #[error("document type `{0}` is defined more than once")]
    DuplicateDocType(String),

    #[error("document type `{doctype}`: field name `{field}` is reserved")]
    ReservedField { doctype: String, field: String },

    #[error("document type `{doctype}`: field `{field}` is listed twice")]
    DuplicateField { doctype: String, field: String },

    #[error("document type `{doctype}`: sort column `{column}` targets `{target}`, only `jaar` is sortable")]
    UnsortableTarget {
        doctype: String,
        column: String,
        target: String,
    },

    #[error("document type `{doctype}`: year source `{field}` is not one of its fields")]
    UnknownYearSource { doctype: String, field: String },

    #[error("unknown document type: {0}")]
    UnknownDocType(String),
}

/// One field of a document type. Fields without a weight can be searched
/// with `field:value` but take no part in multi-field matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocType {
    /// Index name, also used in `index=` query parameters.
    pub name: String,
    /// Human readable name.
    #[serde(default)]
    pub title: Option<String>,
    pub fields: Vec<FieldSpec>,
    /// UI column name → backend sort field.
    #[serde(default)]
    pub sort_fields: BTreeMap<String, String>,
    /// Field whose leading four digits give the record's year.
    #[serde(default)]
    pub year_source: Option<String>,
}

impl DocType {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn weighted_fields(&self) -> Vec<WeightedField> {
        self.fields
            .iter()
            .filter_map(|f| f.weight.map(|w| WeightedField::new(f.name.clone(), w)))
            .collect()
    }

    pub fn all_field_names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Backend field to sort on for a UI column, if the column is sortable.
    pub fn sort_field(&self, column: &str) -> Option<&str> {
        if let Some(target) = self.sort_fields.get(column) {
            return Some(target.as_str());
        }
        (column == YEAR_FIELD).then_some(YEAR_FIELD)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(RegistryError::ReservedField {
                    doctype: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(RegistryError::DuplicateField {
                    doctype: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        for (column, target) in &self.sort_fields {
            if target != YEAR_FIELD {
                return Err(RegistryError::UnsortableTarget {
                    doctype: self.name.clone(),
                    column: column.clone(),
                    target: target.clone(),
                });
            }
        }
        if let Some(source) = &self.year_source {
            if !seen.contains(source.as_str()) {
                return Err(RegistryError::UnknownYearSource {
                    doctype: self.name.clone(),
                    field: source.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Read-only table of all document types.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    doctypes: Vec<DocType>,
}

impl Registry {
    pub fn new(doctypes: Vec<DocType>) -> Result<Self, RegistryError> {
        if doctypes.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut names = BTreeSet::new();
        for doctype in &doctypes {
            if !names.insert(doctype.name.as_str()) {
                return Err(RegistryError::DuplicateDocType(doctype.name.clone()));
            }
            doctype.validate()?;
        }
        Ok(Self { doctypes })
    }

    pub fn doctypes(&self) -> &[DocType] {
        &self.doctypes
    }

    pub fn get(&self, name: &str) -> Option<&DocType> {
        self.doctypes.iter().find(|d| d.name == name)
    }

    /// Resolve requested names; an empty request selects every type.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&DocType>, RegistryError> {
        if names.is_empty() {
            return Ok(self.doctypes.iter().collect());
        }
        names
            .iter()
            .map(|n| {
                self.get(n.as_ref())
                    .ok_or_else(|| RegistryError::UnknownDocType(n.as_ref().to_string()))
            })
            .collect()
    }

    /// Weighted fields across `selection`. A field shared by several types
    /// appears once, with its highest weight.
    pub fn weighted_fields(selection: &[&DocType]) -> Vec<WeightedField> {
        let mut out: Vec<WeightedField> = Vec::new();
        for field in selection.iter().flat_map(|d| d.weighted_fields()) {
            match out.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => existing.weight = existing.weight.max(field.weight),
                None => out.push(field),
            }
        }
        out
    }

    pub fn all_field_names<'a>(selection: &[&'a DocType]) -> BTreeSet<&'a str> {
        selection
            .iter()
            .copied()
            .flat_map(DocType::all_field_names)
            .collect()
    }

    /// Union of every field name of every type; the backend schema.
    pub fn schema_fields(&self) -> BTreeSet<&str> {
        self.doctypes
            .iter()
            .flat_map(|d| d.all_field_names())
            .collect()
    }

    /// Compiler for queries against `selection`.
    pub fn compiler(selection: &[&DocType]) -> QueryCompiler {
        QueryCompiler::new(
            Self::all_field_names(selection),
            Self::weighted_fields(selection),
        )
    }

    /// Resolve a UI sort column for the selection; the first type that knows
    /// the column decides.
    pub fn sort_field<'a>(selection: &[&'a DocType], column: &str) -> Option<&'a str> {
        selection.iter().copied().find_map(|d| d.sort_field(column))
    }
}

/// Year from a free-form date such as `1513-04-01` or `1316-11-21 en 1317`.
/// Only years strictly between 1000 and 2000 are accepted.
pub fn derive_year(datum: &str) -> Option<i64> {
    let head = datum.get(..4)?;
    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i64 = head.parse().ok()?;
    (1000 < year && year < 2000).then_some(year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, weight: Option<f32>) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            weight,
        }
    }

    fn namen() -> DocType {
        DocType {
            name: "namenindex".into(),
            title: Some("Namenindex".into()),
            fields: vec![
                field("naam", Some(3.0)),
                field("datum", Some(1.0)),
                field("bijzonderheden", None),
            ],
            sort_fields: [("datum".to_string(), YEAR_FIELD.to_string())]
                .into_iter()
                .collect(),
            year_source: Some("datum".into()),
        }
    }

    fn akten() -> DocType {
        DocType {
            name: "akten".into(),
            title: None,
            fields: vec![field("naam", Some(5.0)), field("inhoud", Some(1.0))],
            sort_fields: BTreeMap::new(),
            year_source: None,
        }
    }

    #[test]
    fn unweighted_fields_are_scopable_only() {
        let d = namen();
        assert_eq!(d.weighted_fields().len(), 2);
        assert!(d.all_field_names().contains("bijzonderheden"));
    }

    #[test]
    fn shared_field_keeps_highest_weight() {
        let reg = Registry::new(vec![namen(), akten()]).unwrap();
        let all = reg.select::<&str>(&[]).unwrap();
        let weighted = Registry::weighted_fields(&all);
        let naam = weighted.iter().find(|f| f.name == "naam").unwrap();
        assert_eq!(naam.weight, 5.0);
        assert_eq!(weighted.len(), 3);
    }

    #[test]
    fn select_rejects_unknown() {
        let reg = Registry::new(vec![namen()]).unwrap();
        assert_eq!(
            reg.select(&["nope"]),
            Err(RegistryError::UnknownDocType("nope".into()))
        );
        assert_eq!(reg.select(&["namenindex"]).unwrap().len(), 1);
    }

    #[test]
    fn validation_catches_bad_tables() {
        assert_eq!(Registry::new(vec![]), Err(RegistryError::Empty));
        assert!(matches!(
            Registry::new(vec![namen(), namen()]),
            Err(RegistryError::DuplicateDocType(_))
        ));
        let mut reserved = akten();
        reserved.fields.push(field(YEAR_FIELD, None));
        assert!(matches!(
            Registry::new(vec![reserved]),
            Err(RegistryError::ReservedField { .. })
        ));
        let mut bad_sort = akten();
        bad_sort.sort_fields.insert("naam".into(), "naam".into());
        assert!(matches!(
            Registry::new(vec![bad_sort]),
            Err(RegistryError::UnsortableTarget { .. })
        ));
        let mut bad_year = akten();
        bad_year.year_source = Some("datum".into());
        assert!(matches!(
            Registry::new(vec![bad_year]),
            Err(RegistryError::UnknownYearSource { .. })
        ));
    }

    #[test]
    fn sort_columns_resolve_through_mapping() {
        let d = namen();
        assert_eq!(d.sort_field("datum"), Some(YEAR_FIELD));
        assert_eq!(d.sort_field(YEAR_FIELD), Some(YEAR_FIELD));
        assert_eq!(d.sort_field("naam"), None);
    }

    #[test]
    fn year_from_datum() {
        assert_eq!(derive_year("1513"), Some(1513));
        assert_eq!(derive_year(""), None);
        assert_eq!(derive_year("1513-04-01"), Some(1513));
        assert_eq!(derive_year("1513-4-1"), Some(1513));
        assert_eq!(derive_year("1316-11-21 en 1317-04-21"), Some(1316));
        assert_eq!(derive_year("2013"), None);
        assert_eq!(derive_year("ca. 1500"), None);
    }
}
