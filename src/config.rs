//! 配置模块，负责加载JSON配置文件

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),
    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 实体表与标签关联表的描述，每个编译器实例创建时提供一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// 实体表名
    pub table_name: String,
    /// 实体表的主键列
    pub id_column: String,
    /// 查询返回的实体列
    pub columns: Vec<String>,
    /// `sort:newest` / `sort:oldest` 使用的时间列
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default)]
    pub association: AssociationConfig,
    #[serde(default)]
    pub tags: TagTableConfig,
    /// 为 true 时使用 LEFT JOIN，没有任何标签的实体也参与过滤
    #[serde(default)]
    pub include_untagged: bool,
}

/// 实体与标签之间的多对多关联表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub table: String,
    /// 指向实体主键的列
    pub entity_column: String,
    /// 指向标签主键的列
    pub tag_column: String,
}

/// 标签表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagTableConfig {
    pub table: String,
    pub id_column: String,
    /// 标签ID写入 SQL 时的类型，需与关联表中标签列的类型一致
    pub id_type: TagIdType,
}

/// 标签ID值的 SQL 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagIdType {
    /// 字符串字面量 / 文本参数
    #[default]
    Text,
    /// 整数字面量 / 整数参数，缓存中的ID必须能解析为 i64
    Integer,
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            table: "userdata_tags".to_string(),
            entity_column: "userdata_id".to_string(),
            tag_column: "tag_id".to_string(),
        }
    }
}

impl Default for TagTableConfig {
    fn default() -> Self {
        Self {
            table: "tags".to_string(),
            id_column: "id".to_string(),
            id_type: TagIdType::Text,
        }
    }
}

/// 默认配置：`userdata(id, email, name)` 表
impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            table_name: "userdata".to_string(),
            id_column: "id".to_string(),
            columns: vec!["id".to_string(), "email".to_string(), "name".to_string()],
            timestamp_column: default_timestamp_column(),
            association: AssociationConfig::default(),
            tags: TagTableConfig::default(),
            include_untagged: false,
        }
    }
}

impl BuilderConfig {
    pub fn new(
        table_name: impl Into<String>,
        id_column: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            id_column: id_column.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }
}

/// 从JSON文件加载标签缓存的初始数据
///
/// 文件内容为 `{ "规范键": "标签ID" }`，例如 `{ "tag1": "1", "color:red": "2" }`
pub fn load_tag_pairs<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, String>, ConfigError> {
    read_json(path.as_ref())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    // 检查文件是否存在
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
