//! Field extraction
//!
//! Turns a parsed page into a [`Record`] by evaluating every field rule
//! against it. Extraction never performs I/O and never fails on a missing
//! field: a rule with no match yields `null` (single) or `[]` (multiple).
//! A selector the evaluator rejects on a real page is a rule error and
//! fails the extraction.

use crate::config::{compile_selector, ExtractRule, Multiplicity};
use crate::query::{PageDocument, Query};
use crate::ConfigError;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// The value extracted for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Single-valued rule that matched nothing
    Missing,
    /// First match of a single-valued rule
    Single(String),
    /// Every match of a multi-valued rule, in document order
    Multiple(Vec<String>),
}

impl FieldValue {
    /// Returns the scalar value, if this is a matched single field
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true for an unmatched single field
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing => serializer.serialize_none(),
            Self::Single(value) => serializer.serialize_str(value),
            Self::Multiple(values) => values.serialize(serializer),
        }
    }
}

/// Extracted fields of one page, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any earlier value under the same name
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Iterates over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    field: String,
    multiplicity: Multiplicity,
    selector: String,
    query: Query,
}

/// A set of field rules compiled once for a whole run
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Vec<CompiledRule>,
}

impl Extractor {
    /// Compiles every rule's selector
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - All selectors compiled
    /// * `Err(ConfigError::Selector)` - The first rule whose selector is
    ///   malformed
    pub fn new(rules: &[ExtractRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let query = compile_selector(
                    &rule.field,
                    rule.kind,
                    &rule.selector,
                    rule.attr.as_deref(),
                )?;
                Ok(CompiledRule {
                    field: rule.field.clone(),
                    multiplicity: rule.multiplicity(),
                    selector: rule.selector.clone(),
                    query,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { rules })
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Extracts one record from a parsed page
    ///
    /// # Returns
    ///
    /// * `Ok(Record)` - One value per rule, in rule order
    /// * `Err(ConfigError::Selector)` - A rule's selector could not be
    ///   evaluated against this page
    pub fn extract(&self, document: &PageDocument) -> Result<Record, ConfigError> {
        let mut record = Record::new();

        for rule in &self.rules {
            let values = rule
                .query
                .values(document)
                .map_err(|message| ConfigError::Selector {
                    field: rule.field.clone(),
                    kind: rule.query.kind(),
                    selector: rule.selector.clone(),
                    message,
                })?;

            tracing::debug!(field = %rule.field, matches = values.len(), "Evaluated field rule");

            let value = match rule.multiplicity {
                Multiplicity::Multiple => FieldValue::Multiple(values),
                Multiplicity::Single => values
                    .into_iter()
                    .next()
                    .map_or(FieldValue::Missing, FieldValue::Single),
            };
            record.insert(rule.field.clone(), value);
        }

        Ok(record)
    }

    /// Parses `html` and extracts one record from it
    pub fn extract_html(&self, html: &str) -> Result<Record, ConfigError> {
        self.extract(&PageDocument::parse(html))
    }
}
