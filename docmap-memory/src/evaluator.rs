//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions,
//! enabling filtering and comparison operations on BSON documents.

use bson::{Bson, Document, datetime::DateTime, spec::BinarySubtype};
use regex::Regex;
use std::{cmp::Ordering, collections::HashMap};

use docmap_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 for comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Binary value (ids, opaque blobs)
    Binary(BinarySubtype, &'a [u8]),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(binary.subtype, &binary.bytes),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(sa, a), Comparable::Binary(sb, b)) => sa == sb && a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Compiled patterns, shared by every document of one filter pass.
type Patterns = HashMap<String, Regex>;

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    patterns: &'a mut Patterns,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns the documents matching `expr`, in input order.
    pub fn filter_documents<'d>(
        documents: impl IntoIterator<Item = &'d Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<&'d Document>> {
        let mut patterns = Patterns::new();
        let mut matched = Vec::new();

        for document in documents {
            let mut evaluator = DocumentEvaluator {
                document,
                patterns: &mut patterns,
            };
            if evaluator.evaluate(expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn is_match(&mut self, value: &Bson, pattern: &Bson) -> DocumentStoreResult<bool> {
        let Bson::String(pattern) = pattern else {
            return Err(DocumentStoreError::InvalidQuery(format!(
                "pattern must be a string, got {:?}",
                pattern.element_type()
            )));
        };

        if !self.patterns.contains_key(pattern) {
            let regex = Regex::new(pattern)
                .map_err(|e| DocumentStoreError::InvalidQuery(e.to_string()))?;
            self.patterns.insert(pattern.clone(), regex);
        }

        let Some(regex) = self.patterns.get(pattern) else {
            return Ok(false);
        };

        Ok(match value {
            Bson::String(value) => regex.is_match(value),
            Bson::Array(items) => items
                .iter()
                .any(|item| matches!(item, Bson::String(value) if regex.is_match(value))),
            _ => false,
        })
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let document = self.document;
        let Some(field_value) = document.get(field) else {
            // A missing field differs from every value.
            return Ok(*op == FieldOp::Ne);
        };

        match op {
            FieldOp::Eq => Ok(Comparable::from(field_value) == Comparable::from(value)),
            FieldOp::Ne => Ok(Comparable::from(field_value) != Comparable::from(value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => Ok(match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    }),
                    None => Ok(false),
                }
            }
            FieldOp::Matches => self.is_match(field_value, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docmap_core::query::Filter;

    use super::*;

    fn matching(documents: &[Document], expr: Expr) -> Vec<&Document> {
        DocumentEvaluator::filter_documents(documents, &expr).unwrap()
    }

    #[test]
    fn comparisons_normalize_numbers() {
        let documents = [doc! { "price": 5 }, doc! { "price": 12.5 }, doc! { "price": 20i64 }];

        assert_eq!(matching(&documents, Filter::gt("price", 10)).len(), 2);
        assert_eq!(matching(&documents, Filter::lte("price", 12.5)).len(), 2);
        assert_eq!(matching(&documents, Filter::eq("price", 20)).len(), 1);
    }

    #[test]
    fn patterns_match_strings_and_string_arrays() {
        let documents = [
            doc! { "title": "Moby Dick" },
            doc! { "title": "Dune" },
            doc! { "title": ["Moby", "Dick"] },
        ];

        assert_eq!(matching(&documents, Filter::matches("title", "^Mob")).len(), 2);
    }

    #[test]
    fn malformed_patterns_are_reported() {
        let documents = [doc! { "title": "Moby Dick" }];
        let result = DocumentEvaluator::filter_documents(&documents, &Filter::matches("title", "("));

        assert!(matches!(result, Err(DocumentStoreError::InvalidQuery(_))));
    }

    #[test]
    fn negation_covers_missing_fields() {
        let documents = [doc! { "title": "Dune" }, doc! { "pages": 412 }];

        assert_eq!(matching(&documents, !Filter::eq("title", "Dune")).len(), 1);
        assert_eq!(matching(&documents, Filter::ne("title", "Dune")).len(), 1);
    }
}
