// src/db/query.rs
//
// Query shaping over a single entity table.
//
// A `Query<E>` is a pure description (filters, ordering, paging). It is
// turned into SQL only when the context executes it, after every column it
// names has been checked against the entity mapping.

use rusqlite::types::Value;
use std::fmt;
use std::marker::PhantomData;

use crate::domain::{Entity, EntityId};
use crate::error::{AppError, AppResult};

/// Caller-supplied transform applied to the base query before execution.
pub type QueryInject<E> = dyn Fn(Query<E>) -> Query<E> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Comparison {
    fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare {
        column: &'static str,
        op: Comparison,
        value: Value,
    },
    IsNull(&'static str),
    IsNotNull(&'static str),
    In {
        column: &'static str,
        values: Vec<Value>,
    },
}

impl Predicate {
    fn column(&self) -> &'static str {
        match *self {
            Predicate::Compare { column, .. }
            | Predicate::IsNull(column)
            | Predicate::IsNotNull(column)
            | Predicate::In { column, .. } => column,
        }
    }
}

pub struct Query<E> {
    predicates: Vec<Predicate>,
    ordering: Vec<(&'static str, SortOrder)>,
    limit: Option<u64>,
    offset: Option<u64>,
    key: Option<Value>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    /// The base query: every row of `E::TABLE`.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: None,
            key: None,
            _entity: PhantomData,
        }
    }

    pub fn filter(mut self, column: &'static str, op: Comparison, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Compare {
            column,
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparison::Eq, value)
    }

    pub fn where_like(self, column: &'static str, pattern: impl Into<String>) -> Self {
        self.filter(column, Comparison::Like, pattern.into())
    }

    pub fn where_null(mut self, column: &'static str) -> Self {
        self.predicates.push(Predicate::IsNull(column));
        self
    }

    pub fn where_not_null(mut self, column: &'static str) -> Self {
        self.predicates.push(Predicate::IsNotNull(column));
        self
    }

    /// An empty `values` list matches nothing.
    pub fn where_in<V, I>(mut self, column: &'static str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.predicates.push(Predicate::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.ordering.push((column, SortOrder::Ascending));
        self
    }

    pub fn order_by_desc(mut self, column: &'static str) -> Self {
        self.ordering.push((column, SortOrder::Descending));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Run the optional shaping function over this query.
    pub fn apply(self, shape: Option<&QueryInject<E>>) -> Self {
        match shape {
            Some(shape) => shape(self),
            None => self,
        }
    }

    /// Pick the row with the given key out of the rows this query yields.
    ///
    /// The key is matched after filters, ordering and paging have run, so a
    /// row the query pages away is not found.
    pub(crate) fn with_key(mut self, id: &E::Id) -> Self {
        self.key = Some(id.to_sql_value());
        self
    }

    /// At most one row. A keyed query already yields at most one, and its
    /// own paging must stay as shaped.
    pub(crate) fn first_only(self) -> Self {
        if self.key.is_some() {
            self
        } else {
            self.limit(1)
        }
    }

    /// Render as a parameterised SELECT. Rows come back in key order unless
    /// the query names an ordering.
    pub(crate) fn to_select_sql(&self) -> AppResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let columns = select_columns::<E>();
        let shaped = self.render(&columns, &mut params)?;

        let Some(key) = &self.key else {
            return Ok((shaped, params));
        };
        params.push(key.clone());
        let sql = format!(
            "SELECT {} FROM ({}) WHERE {} = ? LIMIT 1",
            columns,
            shaped,
            quote(E::KEY)
        );
        Ok((sql, params))
    }

    fn render(&self, columns: &str, params: &mut Vec<Value>) -> AppResult<String> {
        let mut sql = format!("SELECT {} FROM {}", columns, quote(E::TABLE));

        if !self.predicates.is_empty() {
            let mut clauses = Vec::with_capacity(self.predicates.len());
            for predicate in &self.predicates {
                check_column::<E>(predicate.column())?;
                clauses.push(render_predicate(predicate, params));
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let ordering = if self.ordering.is_empty() {
            vec![(E::KEY, SortOrder::Ascending)]
        } else {
            self.ordering.clone()
        };
        let mut terms = Vec::with_capacity(ordering.len());
        for (column, order) in ordering {
            check_column::<E>(column)?;
            terms.push(match order {
                SortOrder::Ascending => format!("{} ASC", quote(column)),
                SortOrder::Descending => format!("{} DESC", quote(column)),
            });
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        Ok(sql)
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            offset: self.offset,
            key: self.key.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("predicates", &self.predicates)
            .field("ordering", &self.ordering)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("key", &self.key)
            .finish()
    }
}

fn render_predicate(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Compare { column, op, value } => {
            params.push(value.clone());
            format!("{} {} ?", quote(column), op.as_sql())
        }
        Predicate::IsNull(column) => format!("{} IS NULL", quote(column)),
        Predicate::IsNotNull(column) => format!("{} IS NOT NULL", quote(column)),
        Predicate::In { values, .. } if values.is_empty() => "0 = 1".to_string(),
        Predicate::In { column, values } => {
            params.extend(values.iter().cloned());
            let placeholders = vec!["?"; values.len()].join(", ");
            format!("{} IN ({})", quote(column), placeholders)
        }
    }
}

fn select_columns<E: Entity>() -> String {
    let mut columns = Vec::with_capacity(E::COLUMNS.len() + 1);
    columns.push(quote(E::KEY));
    columns.extend(E::COLUMNS.iter().map(|c| quote(c)));
    columns.join(", ")
}

fn check_column<E: Entity>(column: &str) -> AppResult<()> {
    if E::has_column(column) {
        Ok(())
    } else {
        Err(AppError::InvalidQuery(format!(
            "unknown column `{}` on `{}`",
            column,
            E::TABLE
        )))
    }
}

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
