//! Structured SELECT statements and their rendering to SQL text.
//!
//! The compiler produces a [`SelectStatement`] whose predicates are
//! sea-query expression trees rather than strings. Rendering happens only
//! here, through sea-query's query builders, so the same statement can be
//! printed for different backends or built with bound parameters.

use sea_query::{
    Alias, Asterisk, ColumnRef, Expr, IntoColumnRef, JoinType, MysqlQueryBuilder, Order,
    PostgresQueryBuilder, Query, QueryStatementWriter, SimpleExpr, SqliteQueryBuilder, Values,
};
use std::fmt;
use std::str::FromStr;

/// A column, optionally qualified with a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub table: Option<String>,
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn column_ref(&self) -> ColumnRef {
        match &self.table {
            Some(table) => (Alias::new(table), Alias::new(&self.name)).into_column_ref(),
            None => Alias::new(&self.name).into_column_ref(),
        }
    }

    /// The column as an expression operand.
    pub fn expr(&self) -> Expr {
        Expr::col(self.column_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Column(Column),
    /// `*`, or `table.*` when qualified.
    AllColumns { table: Option<String> },
    /// An arbitrary expression with an output name, e.g. an aggregate.
    Expr { expr: SimpleExpr, alias: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
            JoinKind::Right => JoinType::RightJoin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: SimpleExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortBy {
    Column(Column),
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// A SELECT statement in structured form.
///
/// Clauses that are `None` (or an empty `joins`) are left out when rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub select: Vec<SelectItem>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub r#where: Option<SimpleExpr>,
    pub group_by: Option<Column>,
    pub having: Option<SimpleExpr>,
    pub sort_by: Option<SortBy>,
    /// Direction for `sort_by`; descending when unset.
    pub sort_direction: Option<SortDirection>,
}

/// SQL backend used for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
    MySql,
}

impl Dialect {
    fn random(self) -> SimpleExpr {
        match self {
            Dialect::Postgres | Dialect::Sqlite => Expr::cust("RANDOM()"),
            Dialect::MySql => Expr::cust("RAND()"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            other => Err(format!("unknown SQL dialect '{}'", other)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
        })
    }
}

impl SelectStatement {
    /// Lowers the statement into a sea-query builder for `dialect`.
    pub fn to_sea_query(&self, dialect: Dialect) -> sea_query::SelectStatement {
        let mut query = Query::select();

        for item in &self.select {
            match item {
                SelectItem::Column(column) => {
                    query.column(column.column_ref());
                }
                SelectItem::AllColumns { table: None } => {
                    query.column(Asterisk);
                }
                SelectItem::AllColumns { table: Some(table) } => {
                    query.column((Alias::new(table), Asterisk));
                }
                SelectItem::Expr { expr, alias } => {
                    query.expr_as(expr.clone(), Alias::new(alias));
                }
            }
        }

        match &self.from.alias {
            Some(alias) => query.from_as(Alias::new(&self.from.name), Alias::new(alias)),
            None => query.from(Alias::new(&self.from.name)),
        };

        for join in &self.joins {
            match &join.table.alias {
                Some(alias) => query.join_as(
                    join.kind.into(),
                    Alias::new(&join.table.name),
                    Alias::new(alias),
                    join.on.clone(),
                ),
                None => query.join(join.kind.into(), Alias::new(&join.table.name), join.on.clone()),
            };
        }

        if let Some(condition) = &self.r#where {
            query.and_where(condition.clone());
        }
        if let Some(column) = &self.group_by {
            query.group_by_col(column.column_ref());
        }
        if let Some(condition) = &self.having {
            query.and_having(condition.clone());
        }
        if let Some(sort_by) = &self.sort_by {
            let order: Order = self.sort_direction.unwrap_or(SortDirection::Desc).into();
            match sort_by {
                SortBy::Column(column) => query.order_by(column.column_ref(), order),
                SortBy::Random => query.order_by_expr(dialect.random(), order),
            };
        }

        query
    }
}

/// Renders the statement as PostgreSQL text with every value inlined.
pub fn render(stmt: &SelectStatement) -> String {
    render_with(stmt, Dialect::Postgres)
}

/// Renders the statement as SQL text for `dialect` with every value inlined.
pub fn render_with(stmt: &SelectStatement, dialect: Dialect) -> String {
    let query = stmt.to_sea_query(dialect);
    match dialect {
        Dialect::Postgres => query.to_string(PostgresQueryBuilder),
        Dialect::Sqlite => query.to_string(SqliteQueryBuilder),
        Dialect::MySql => query.to_string(MysqlQueryBuilder),
    }
}

/// Renders the statement with placeholders and returns the values to bind.
///
/// Bound values keep their Rust type. Tag ids are text unless the config's
/// `tags.id_type` is `integer`, so a typed driver binding against an integer
/// tag column needs that setting.
pub fn build_with(stmt: &SelectStatement, dialect: Dialect) -> (String, Values) {
    let query = stmt.to_sea_query(dialect);
    match dialect {
        Dialect::Postgres => query.build(PostgresQueryBuilder),
        Dialect::Sqlite => query.build(SqliteQueryBuilder),
        Dialect::MySql => query.build(MysqlQueryBuilder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> SelectStatement {
        SelectStatement {
            select: vec![SelectItem::AllColumns { table: None }],
            from: TableRef::new("tags"),
            joins: vec![],
            r#where: None,
            group_by: None,
            having: None,
            sort_by: None,
            sort_direction: None,
        }
    }

    #[test]
    fn test_absent_clauses_are_omitted() {
        let sql = render(&minimal());
        assert_eq!(sql, r#"SELECT * FROM "tags""#);
    }

    #[test]
    fn test_clause_order() {
        let stmt = SelectStatement {
            select: vec![
                SelectItem::Column(Column::qualified("u", "id")),
                SelectItem::Column(Column::qualified("u", "name")),
            ],
            from: TableRef::aliased("userdata", "u"),
            joins: vec![Join {
                kind: JoinKind::Inner,
                table: TableRef::aliased("userdata_tags", "ut"),
                on: Column::qualified("u", "id")
                    .expr()
                    .equals(Column::qualified("ut", "userdata_id").column_ref()),
            }],
            r#where: Some(Column::qualified("u", "id").expr().gt(0)),
            group_by: Some(Column::qualified("u", "id")),
            having: Some(Expr::val(true).into()),
            sort_by: Some(SortBy::Column(Column::qualified("u", "timestamp"))),
            sort_direction: Some(SortDirection::Asc),
        };

        let sql = render(&stmt);
        assert!(sql.starts_with(r#"SELECT "u"."id", "u"."name" FROM "userdata" AS "u""#));
        assert!(sql.contains(
            r#"INNER JOIN "userdata_tags" AS "ut" ON "u"."id" = "ut"."userdata_id""#
        ));
        assert!(sql.ends_with(r#"ORDER BY "u"."timestamp" ASC"#));

        let keywords = [
            "SELECT",
            "FROM",
            "INNER JOIN",
            "WHERE",
            "GROUP BY",
            "HAVING",
            "ORDER BY",
        ];
        let positions: Vec<usize> = keywords
            .iter()
            .map(|keyword| sql.find(keyword).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{}", sql);
    }

    #[test]
    fn test_missing_direction_sorts_descending() {
        let mut stmt = minimal();
        stmt.sort_by = Some(SortBy::Column(Column::new("id")));
        assert!(render(&stmt).ends_with(r#"ORDER BY "id" DESC"#));
    }

    #[test]
    fn test_random_order_per_dialect() {
        let mut stmt = minimal();
        stmt.sort_by = Some(SortBy::Random);
        stmt.sort_direction = Some(SortDirection::Asc);
        assert!(render_with(&stmt, Dialect::Sqlite).contains("ORDER BY RANDOM() ASC"));
        assert!(render_with(&stmt, Dialect::Postgres).contains("ORDER BY RANDOM() ASC"));
        assert!(render_with(&stmt, Dialect::MySql).contains("ORDER BY RAND() ASC"));
    }

    #[test]
    fn test_values_are_escaped_when_inlined() {
        let mut stmt = minimal();
        stmt.r#where = Some(Column::new("key").expr().eq("o'brien"));
        let sql = render_with(&stmt, Dialect::Sqlite);
        assert!(sql.contains("'o''brien'"), "{}", sql);
    }

    #[test]
    fn test_build_binds_values() {
        let mut stmt = minimal();
        stmt.r#where = Some(Column::new("id").expr().eq("42"));
        let (sql, values) = build_with(&stmt, Dialect::Postgres);
        assert_eq!(sql, r#"SELECT * FROM "tags" WHERE "id" = $1"#);
        assert_eq!(values.0.len(), 1);

        let (sql, _) = build_with(&stmt, Dialect::Sqlite);
        assert!(sql.ends_with(r#"WHERE "id" = ?"#));
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgres".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!("SQLite".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert_eq!("mysql".parse::<Dialect>(), Ok(Dialect::MySql));
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
