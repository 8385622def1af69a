//! Cursor pagination builder
//!
//! A listing is a base projection and `FROM` shape plus an ordered set of
//! optional clauses: viewer columns and joins (only when someone is
//! signed in), filter predicates, one cursor predicate, ordering and a
//! limit. Each clause is a [`Fragment`] carrying its own bound arguments,
//! so the rendered SQL and argument order can be checked without a
//! database.

use sqlx::{QueryBuilder, Sqlite};

use super::models::UserId;

/// Page size used when none (or a non-positive one) is requested
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Hard ceiling on any page
pub const MAX_PAGE_SIZE: i64 = 10;

/// Normalize a requested page size
pub fn page_size(requested: Option<i64>) -> i64 {
    match requested {
        Some(size) if size > 0 => size.min(MAX_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Int(i64),
    Text(String),
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<UserId> for Arg {
    fn from(value: UserId) -> Self {
        Arg::Int(value.0)
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

/// SQL text with `?` placeholders and the values bound to them, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    sql: String,
    args: Vec<Arg>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Bind the next placeholder
    pub fn bind(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

/// Sort direction of one ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Page boundary relative to the last row the client has seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Forward pagination: rows strictly greater than the key
    After(Arg),
    /// Backward pagination: rows strictly less than the key
    Before(Arg),
}

impl Cursor {
    /// Forward cursor from an optional, possibly blank, text key
    pub fn after_text(key: Option<&str>) -> Option<Self> {
        key.map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| Cursor::After(key.into()))
    }

    /// Backward cursor from an optional id; zero and negatives mean "from the top"
    pub fn before_id(id: Option<i64>) -> Option<Self> {
        id.filter(|id| *id > 0).map(|id| Cursor::Before(id.into()))
    }

    fn predicate(&self, column: &str) -> Fragment {
        match self {
            Cursor::After(key) => Fragment::new(format!("{column} > ?")).bind(key.clone()),
            Cursor::Before(key) => Fragment::new(format!("{column} < ?")).bind(key.clone()),
        }
    }
}

/// A bounded, deterministically ordered listing query
#[derive(Debug, Clone)]
pub struct ListingQuery {
    columns: Vec<Fragment>,
    from: Fragment,
    joins: Vec<Fragment>,
    filters: Vec<Fragment>,
    cursor: Option<Fragment>,
    order_by: Vec<(String, SortOrder)>,
    limit: i64,
}

impl ListingQuery {
    /// Start from a projection and a `FROM` shape (which may include inner joins)
    pub fn select(columns: &str, from: &str) -> Self {
        Self {
            columns: vec![Fragment::new(columns)],
            from: Fragment::new(from),
            joins: Vec::new(),
            filters: Vec::new(),
            cursor: None,
            order_by: Vec::new(),
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn column(mut self, column: Fragment) -> Self {
        self.columns.push(column);
        self
    }

    pub fn join(mut self, join: Fragment) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a predicate; predicates are AND-combined
    pub fn filter(mut self, predicate: Fragment) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Apply viewer-specific columns and joins when a viewer is present
    pub fn viewer<F>(self, viewer: Option<UserId>, apply: F) -> Self
    where
        F: FnOnce(Self, UserId) -> Self,
    {
        match viewer {
            Some(viewer) => apply(self, viewer),
            None => self,
        }
    }

    /// Bound the page by `column` relative to the cursor key
    pub fn cursor(mut self, column: &str, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor.map(|cursor| cursor.predicate(column));
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by.push((column.to_string(), order));
        self
    }

    /// Set the page size; values outside the allowed range are normalized
    pub fn limit(mut self, requested: i64) -> Self {
        self.limit = page_size(Some(requested));
        self
    }

    /// Render SQL text and the arguments for its placeholders, in order
    pub fn render(&self) -> (String, Vec<Arg>) {
        let mut sql = String::from("SELECT ");
        let mut args = Vec::new();

        for (index, column) in self.columns.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&column.sql);
            args.extend(column.args.iter().cloned());
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.from.sql);
        args.extend(self.from.args.iter().cloned());

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql);
            args.extend(join.args.iter().cloned());
        }

        let predicates: Vec<&Fragment> = self.filters.iter().chain(self.cursor.iter()).collect();
        for (index, predicate) in predicates.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(&predicate.sql);
            args.extend(predicate.args.iter().cloned());
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, order)| format!("{} {}", column, order.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        sql.push_str(" LIMIT ?");
        args.push(Arg::Int(self.limit));

        (sql, args)
    }

    /// Build an executable query
    pub fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let (sql, args) = self.render();
        debug_assert_eq!(sql.matches('?').count(), args.len());

        let mut pieces = sql.split('?');
        let mut builder = QueryBuilder::new(pieces.next().unwrap_or_default());
        for (arg, piece) in args.into_iter().zip(pieces) {
            match arg {
                Arg::Int(value) => builder.push_bind(value),
                Arg::Text(value) => builder.push_bind(value),
            };
            builder.push(piece);
        }

        builder
    }
}

/// Escape LIKE wildcards so user input matches literally (`ESCAPE '\'`)
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
