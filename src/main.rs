use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sea_query::Value;
use std::path::PathBuf;
use tag_query::{
    load_tag_pairs, parse, render_with, BuilderConfig, Dialect, TagIdCache, TagQueryCompiler,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 标签过滤表达式到 SQL 的编译器
#[derive(Parser, Debug)]
#[command(name = "tag-query")]
#[command(version, about = "Compile tag filter expressions to SQL")]
struct Args {
    /// 实体表配置文件 (JSON)，缺省时使用 userdata 表
    #[arg(long)]
    config: Option<PathBuf>,

    /// 标签缓存初始数据 (JSON 对象: 规范键 -> 标签ID)
    #[arg(long)]
    tags: Option<PathBuf>,

    /// 输出的 SQL 方言: postgres, sqlite, mysql
    #[arg(long, default_value = "postgres")]
    dialect: Dialect,

    /// 编译单个过滤表达式后退出
    #[arg(short = 'c', long)]
    command: Option<String>,
}

const HELP: &str = "\
输入过滤表达式即可查看生成的 SQL，例如: tag1 & (tag2 | !tag3) & sort:newest

命令:
  .ast <filter>      显示表达式的 AST
  .add <tag> <id>    向标签缓存中添加标签
  .tags <entity id>  显示查询实体标签的 SQL
  .help              显示帮助
  .exit              退出";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tag_query=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut compiler = create_compiler(&args)?;

    match &args.command {
        Some(filter) => {
            if !compile_and_print(&compiler, filter, args.dialect) {
                std::process::exit(1);
            }
            Ok(())
        }
        None => run_repl(&mut compiler, args.dialect),
    }
}

/// 创建编译器实例，未指定配置文件时使用默认配置
fn create_compiler(args: &Args) -> anyhow::Result<TagQueryCompiler> {
    let config = match &args.config {
        Some(path) => BuilderConfig::from_json_file(path)
            .with_context(|| format!("无法加载表配置 {}", path.display()))?,
        None => BuilderConfig::default(),
    };

    let mut cache = TagIdCache::new();
    if let Some(path) = &args.tags {
        let pairs = load_tag_pairs(path)
            .with_context(|| format!("无法加载标签数据 {}", path.display()))?;
        cache.init(pairs);
    }

    info!(
        table = %config.table_name,
        tags = cache.len(),
        "compiler ready"
    );
    Ok(TagQueryCompiler::new(config, cache))
}

/// 编译并输出 SQL，失败时输出带位置的错误信息
fn compile_and_print(compiler: &TagQueryCompiler, filter: &str, dialect: Dialect) -> bool {
    match compiler.compile_str(filter) {
        Ok(stmt) => {
            println!("{}", render_with(&stmt, dialect));
            true
        }
        Err(e) => {
            eprintln!("{}", e.format_with_source(filter));
            false
        }
    }
}

fn run_repl(compiler: &mut TagQueryCompiler, dialect: Dialect) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("tag-query ({}) - 输入 .help 查看帮助, .exit 退出", dialect);

    loop {
        let line = match rl.readline("tags> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)?;

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            ".exit" | ".quit" => break,
            ".help" => println!("{}", HELP),
            ".ast" => match parse(rest) {
                Ok(filter) => println!("{:#?}", filter),
                Err(e) => eprintln!("{}", e.format_with_source(rest)),
            },
            ".add" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                [tag, id] => {
                    compiler.cache_mut().on_tag_added(*tag, *id);
                    println!("✓ {} -> {}", tag, id);
                }
                _ => eprintln!("用法: .add <tag> <id>"),
            },
            ".tags" if !rest.is_empty() => {
                let stmt = compiler.list_entity_tags(entity_id(rest));
                println!("{}", render_with(&stmt, dialect));
            }
            ".tags" => eprintln!("用法: .tags <entity id>"),
            _ if command.starts_with('.') => eprintln!("未知命令: {} (输入 .help 查看帮助)", command),
            _ => {
                compile_and_print(compiler, line, dialect);
            }
        }
    }

    Ok(())
}

/// 数字形式的实体ID按整数处理，其余按字符串处理
fn entity_id(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(id) => id.into(),
        Err(_) => raw.to_string().into(),
    }
}
