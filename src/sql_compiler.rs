//! SQL compiler that lowers tag filter ASTs into SELECT statements using sea-query.
//!
//! Every entity row is joined with its tag associations and grouped by the
//! entity id, so a tag condition becomes an aggregate over the joined rows:
//!
//! ```text
//! SELECT u.id, u.email, u.name
//! FROM userdata u
//! INNER JOIN userdata_tags ut ON u.id = ut.userdata_id
//! GROUP BY u.id
//! HAVING SUM(CASE WHEN ut.tag_id = '1' THEN 1 ELSE 0 END) > 0
//! ORDER BY u.timestamp ASC
//! ```

use crate::ast::{Filter, MetaTag};
use crate::config::{BuilderConfig, TagIdType};
use crate::error::Error;
use crate::parser::{Parser, MAX_DEPTH};
use crate::statement::{
    Column, Join, JoinKind, SelectItem, SelectStatement, SortBy, SortDirection, TableRef,
};
use crate::tag_cache::{CanonicalKey, TagIdCache, TagNotFound};
use sea_query::{Expr, Func, SimpleExpr, Value};
use tracing::{debug, warn};

const ENTITY_ALIAS: &str = "u";
const ASSOCIATION_ALIAS: &str = "ut";
const TAG_ALIAS: &str = "t";

/// Meta tag key interpreted as an ordering directive.
const SORT_KEY: &str = "sort";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    TagNotFound(#[from] TagNotFound),
    /// 降低与渲染都是递归的，过深的树会耗尽调用栈
    #[error("Filter nested too deeply: depth {depth} exceeds {limit}")]
    TooDeep { depth: usize, limit: usize },
    #[error("Tag id '{id}' of '{key}' is not an integer")]
    InvalidTagId { key: String, id: String },
}

/// What the entities are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Timestamp,
    Random,
}

/// Ordering collected from `sort:` directives while lowering one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSession {
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
}

impl Default for SortSession {
    fn default() -> Self {
        Self {
            sort_by: SortKey::Timestamp,
            sort_direction: SortDirection::Asc,
        }
    }
}

impl SortSession {
    /// Applies a `sort:<value>` directive. Returns false for unknown values,
    /// which leave the session untouched.
    fn apply(&mut self, value: &str) -> bool {
        match value {
            "random" => self.sort_by = SortKey::Random,
            "oldest" => {
                self.sort_by = SortKey::Timestamp;
                self.sort_direction = SortDirection::Asc;
            }
            "newest" => {
                self.sort_by = SortKey::Timestamp;
                self.sort_direction = SortDirection::Desc;
            }
            _ => return false,
        }
        true
    }
}

/// Compiles tag filters against one entity table.
#[derive(Debug, Clone)]
pub struct TagQueryCompiler {
    config: BuilderConfig,
    cache: TagIdCache,
}

impl TagQueryCompiler {
    pub fn new(config: BuilderConfig, cache: TagIdCache) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn cache(&self) -> &TagIdCache {
        &self.cache
    }

    /// Mutable access for incremental updates, e.g. [`TagIdCache::on_tag_added`].
    pub fn cache_mut(&mut self) -> &mut TagIdCache {
        &mut self.cache
    }

    /// Compile a filter AST into a SELECT over the configured entity table.
    ///
    /// Fails without producing a statement if any tag in the filter is not
    /// in the cache, or if the filter is nested deeper than [`MAX_DEPTH`].
    /// Filters from the parser always satisfy the depth limit.
    pub fn compile(&self, filter: &Filter) -> Result<SelectStatement, CompileError> {
        let depth = filter.depth();
        if depth > MAX_DEPTH {
            return Err(CompileError::TooDeep {
                depth,
                limit: MAX_DEPTH,
            });
        }

        let mut session = SortSession::default();
        let having = self.lower(filter, &mut session)?;
        debug!(filter = %filter, sort = ?session, "compiled tag filter");

        let config = &self.config;
        let association = &config.association;
        let join_kind = if config.include_untagged {
            JoinKind::Left
        } else {
            JoinKind::Inner
        };

        let sort_by = match session.sort_by {
            SortKey::Timestamp => SortBy::Column(self.entity_column(&config.timestamp_column)),
            SortKey::Random => SortBy::Random,
        };

        Ok(SelectStatement {
            select: config
                .columns
                .iter()
                .map(|column| SelectItem::Column(self.entity_column(column)))
                .collect(),
            from: TableRef::aliased(&config.table_name, ENTITY_ALIAS),
            joins: vec![Join {
                kind: join_kind,
                table: TableRef::aliased(&association.table, ASSOCIATION_ALIAS),
                on: self
                    .entity_column(&config.id_column)
                    .expr()
                    .equals(self.association_column(&association.entity_column).column_ref()),
            }],
            r#where: None,
            group_by: Some(self.entity_column(&config.id_column)),
            having: Some(having),
            sort_by: Some(sort_by),
            sort_direction: Some(session.sort_direction),
        })
    }

    /// Parse and compile a filter string in one step.
    pub fn compile_str(&self, input: &str) -> Result<SelectStatement, Error> {
        let filter = Parser::new(input).parse()?;
        Ok(self.compile(&filter)?)
    }

    /// Tags attached to one entity, each with its usage count over all entities.
    pub fn list_entity_tags(&self, entity_id: impl Into<Value>) -> SelectStatement {
        let association = &self.config.association;
        let tags = &self.config.tags;
        let tag_id = Column::qualified(TAG_ALIAS, &tags.id_column);
        let entity = self.association_column(&association.entity_column);
        let entity_id: Value = entity_id.into();

        SelectStatement {
            select: vec![
                SelectItem::AllColumns {
                    table: Some(TAG_ALIAS.to_string()),
                },
                SelectItem::Expr {
                    expr: Func::count(entity.expr()).into(),
                    alias: "usage_count".to_string(),
                },
            ],
            from: TableRef::aliased(&tags.table, TAG_ALIAS),
            joins: vec![Join {
                kind: JoinKind::Inner,
                table: TableRef::aliased(&association.table, ASSOCIATION_ALIAS),
                on: tag_id
                    .expr()
                    .equals(self.association_column(&association.tag_column).column_ref()),
            }],
            r#where: None,
            group_by: Some(tag_id),
            having: Some(any_row(entity.expr().eq(entity_id))),
            sort_by: None,
            sort_direction: None,
        }
    }

    /// Association rows linking one entity to one tag.
    pub fn entity_tag_lookup<K>(
        &self,
        entity_id: impl Into<Value>,
        tag: &K,
    ) -> Result<SelectStatement, CompileError>
    where
        K: CanonicalKey + ?Sized,
    {
        let association = &self.config.association;
        let tag_id = self.tag_id_value(tag)?;
        let entity_id: Value = entity_id.into();

        Ok(SelectStatement {
            select: vec![SelectItem::AllColumns { table: None }],
            from: TableRef::new(&association.table),
            joins: vec![],
            r#where: Some(
                Column::new(&association.entity_column)
                    .expr()
                    .eq(entity_id)
                    .and(Column::new(&association.tag_column).expr().eq(tag_id)),
            ),
            group_by: None,
            having: None,
            sort_by: None,
            sort_direction: None,
        })
    }

    /// Lower a filter into a boolean aggregate expression
    fn lower(
        &self,
        filter: &Filter,
        session: &mut SortSession,
    ) -> Result<SimpleExpr, CompileError> {
        let expr = match filter {
            Filter::Tag(tag) => self.tag_condition(tag)?,
            Filter::Meta(meta) => self.lower_meta(meta, session)?,
            Filter::True => always_true(),
            Filter::And(left, right) => {
                let left = self.lower(left, session)?;
                let right = self.lower(right, session)?;
                left.and(right)
            }
            Filter::Or(left, right) => {
                let left = self.lower(left, session)?;
                let right = self.lower(right, session)?;
                left.or(right)
            }
            Filter::Not(inner) => self.lower(inner, session)?.not(),
        };
        Ok(expr)
    }

    fn lower_meta(
        &self,
        meta: &MetaTag,
        session: &mut SortSession,
    ) -> Result<SimpleExpr, CompileError> {
        if meta.key != SORT_KEY {
            return self.tag_condition(meta);
        }
        if !session.apply(&meta.value) {
            warn!(value = %meta.value, "ignoring unknown sort directive");
        }
        Ok(always_true())
    }

    /// True for an entity iff one of its association rows carries the tag's id
    fn tag_condition<K>(&self, tag: &K) -> Result<SimpleExpr, CompileError>
    where
        K: CanonicalKey + ?Sized,
    {
        let tag_id = self.tag_id_value(tag)?;
        let matches = self
            .association_column(&self.config.association.tag_column)
            .expr()
            .eq(tag_id);
        Ok(any_row(matches))
    }

    /// Cached id of `tag` as a SQL value of the configured type
    fn tag_id_value<K>(&self, tag: &K) -> Result<Value, CompileError>
    where
        K: CanonicalKey + ?Sized,
    {
        let id = self.cache.tag_to_tag_id(tag)?;
        match self.config.tags.id_type {
            TagIdType::Text => Ok(id.into()),
            TagIdType::Integer => id.parse::<i64>().map(Value::from).map_err(|_| {
                CompileError::InvalidTagId {
                    key: tag.canonical_key().into_owned(),
                    id: id.to_string(),
                }
            }),
        }
    }

    fn entity_column(&self, name: &str) -> Column {
        Column::qualified(ENTITY_ALIAS, name)
    }

    fn association_column(&self, name: &str) -> Column {
        Column::qualified(ASSOCIATION_ALIAS, name)
    }
}

/// `SUM(CASE WHEN <condition> THEN 1 ELSE 0 END) > 0` over the grouped rows
fn any_row(condition: SimpleExpr) -> SimpleExpr {
    Expr::expr(Func::sum(Expr::case(condition, 1).finally(0))).gt(0)
}

fn always_true() -> SimpleExpr {
    Expr::val(true).into()
}
