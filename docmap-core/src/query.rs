//! Query construction for mapped classes.
//!
//! Queries are built from [`QueryAttribute`] handles. Each comparison operator produces an
//! [`Expr::Field`] node; nodes combine into AND/OR trees and whole trees can be negated.
//! The resulting [`Expr`] is data-source agnostic: every store translates it into its native
//! form through a [`QueryVisitor`].
//!
//! # Building expressions
//!
//! ```ignore
//! use docmap::query::{Filter, QueryAttribute};
//!
//! let title = QueryAttribute::new("title");
//! let price = QueryAttribute::new("price");
//!
//! let expr = title.eq("Moby Dick") | (price.lt(10) & !title.matches("^The"));
//! let same = Filter::or([Filter::eq("title", "Moby Dick"), Filter::lt("price", 10)]);
//! ```
//!
//! Mapper predicates receive a [`QueryAttributes`] handle set:
//!
//! ```ignore
//! let cheap = books.select(|book| book.attribute("price").lt(10));
//! ```
//!
//! # Query Building
//!
//! ```ignore
//! use docmap::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("name", "Alice"))
//!     .limit(10)
//!     .offset(0)
//!     .sort("created_at", SortDirection::Desc)
//!     .build();
//! ```

use bson::Bson;
use std::ops::{BitAnd, BitOr, Not};

use crate::{document::ID_FIELD, error::DocumentStoreError};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// String field matches a regular expression.
    Matches,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression as a whole (logical NOT).
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// A handle naming one attribute of a mapped class in a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryAttribute {
    name: String,
}

impl QueryAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn compare(&self, op: FieldOp, value: impl Into<Bson>) -> Expr {
        Expr::field(self.name.clone(), op, value.into())
    }

    pub fn eq(&self, value: impl Into<Bson>) -> Expr {
        self.compare(FieldOp::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Bson>) -> Expr {
        self.compare(FieldOp::Ne, value)
    }

    pub fn lt(&self, value: impl Into<Bson>) -> Expr {
        self.compare(FieldOp::Lt, value)
    }

    pub fn lte(&self, value: impl Into<Bson>) -> Expr {
        self.compare(FieldOp::Lte, value)
    }

    pub fn gt(&self, value: impl Into<Bson>) -> Expr {
        self.compare(FieldOp::Gt, value)
    }

    pub fn gte(&self, value: impl Into<Bson>) -> Expr {
        self.compare(FieldOp::Gte, value)
    }

    /// Matches string values against a regular expression.
    pub fn matches(&self, pattern: impl Into<String>) -> Expr {
        self.compare(FieldOp::Matches, pattern.into())
    }
}

/// Attribute handles handed to query predicates.
///
/// Any name yields a handle: unknown names simply match nothing in the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryAttributes;

impl QueryAttributes {
    pub fn attribute(&self, name: impl Into<String>) -> QueryAttribute {
        QueryAttribute::new(name)
    }

    /// Handle for the identity field.
    pub fn id(&self) -> QueryAttribute {
        QueryAttribute::new(ID_FIELD)
    }
}

/// A structured query for retrieving and filtering documents.
///
/// This struct encapsulates filters, limits, offsets, and sort specifications
/// for document queries. Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates a new empty query matching every document.
    pub fn new() -> Self {
        Query {
            filter: None,
            limit: None,
            offset: None,
            sort: None,
        }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing filter expressions.
///
/// Provides static methods to construct common filter expressions in a type-safe manner.
/// All methods accept field names and values as `Into<String>` and `Into<Bson>` for ergonomics.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        QueryAttribute::new(field).eq(value)
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        QueryAttribute::new(field).ne(value)
    }

    /// Matches documents where the field is greater than the specified value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        QueryAttribute::new(field).gt(value)
    }

    /// Matches documents where the field is greater than or equal to the specified value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        QueryAttribute::new(field).gte(value)
    }

    /// Matches documents where the field is less than the specified value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        QueryAttribute::new(field).lt(value)
    }

    /// Matches documents where the field is less than or equal to the specified value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        QueryAttribute::new(field).lte(value)
    }

    /// Matches documents where the string field matches the regular expression.
    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        QueryAttribute::new(field).matches(pattern)
    }

    /// Combines multiple expressions such that all must match for a document to be included.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match for a document to be included.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Inverts an expression as a whole.
    pub fn not(expr: Expr) -> Expr {
        Expr::Not(Box::new(expr))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip (for pagination).
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Sets the sort specification for the query results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Translates an expression tree into a store's native representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
