//! Tag filter language compiler.
//!
//! Compiles boolean tag filters such as `tag1 & (tag2 | !tag3)` or
//! `vacation & sort:newest` into SELECT statements over an entity table
//! joined with its many-to-many tag association table.
//!
//! ```text
//! "a & !b" ──Lexer──▶ tokens ──Parser──▶ Filter ──TagQueryCompiler──▶ SelectStatement ──render──▶ SQL
//!                                                      ▲
//!                                                 TagIdCache
//! ```
//!
//! # Usage
//!
//! ```rust
//! use tag_query::{render, BuilderConfig, TagIdCache, TagQueryCompiler};
//!
//! let mut cache = TagIdCache::new();
//! cache.init([("vacation", "1"), ("family", "2")]);
//!
//! let compiler = TagQueryCompiler::new(BuilderConfig::default(), cache);
//! let stmt = compiler.compile_str("vacation & !family & sort:newest").unwrap();
//! let sql = render(&stmt);
//! assert!(sql.contains("HAVING"));
//! assert!(sql.ends_with("DESC"));
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod sql_compiler;
pub mod statement;
pub mod tag_cache;
pub mod token;
pub mod trie;

pub use ast::{Filter, MetaTag, Tag};
pub use config::{
    load_tag_pairs, AssociationConfig, BuilderConfig, ConfigError, TagIdType, TagTableConfig,
};
pub use error::Error;
pub use lexer::{Lexer, TokenSource, TokenStream};
pub use parser::{parse, Parser, SyntaxError, MAX_DEPTH};
pub use sql_compiler::{CompileError, SortKey, SortSession, TagQueryCompiler};
pub use statement::{
    build_with, render, render_with, Column, Dialect, Join, JoinKind, SelectItem,
    SelectStatement, SortBy, SortDirection, TableRef,
};
pub use tag_cache::{CanonicalKey, TagIdCache, TagNotFound};
pub use token::{Span, Token, TokenKind};
pub use trie::Trie;
