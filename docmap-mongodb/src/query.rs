//! Query translation from docmap expressions to MongoDB query syntax.
//!
//! This module translates docmap's abstract query expressions into
//! MongoDB BSON documents for execution by the MongoDB query engine.

use bson::{Bson, Document, doc};

use docmap_core::{
    document::ID_FIELD,
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// MongoDB's primary key field.
pub(crate) const MONGO_ID: &str = "_id";

/// Maps a mapped field name onto the stored field name.
pub(crate) fn stored_field(field: &str) -> &str {
    if field == ID_FIELD { MONGO_ID } else { field }
}

/// Translates docmap query expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to field operators; whole expressions are negated with `$nor`.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            stored_field(field): match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Matches => match value {
                    Bson::String(pattern) => doc! { "$regex": pattern },
                    _ => return Err(DocumentStoreError::InvalidQuery(
                        "Matches operator requires a string pattern".to_string(),
                    )),
                },
            }
        })
    }
}
