//! 配置模块，负责从JSON文件加载实体元数据目录

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{EntitySchema, StaticCatalog};

/// 目录配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置 {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 目录配置结构：实体名 -> 实体元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(flatten)]
    pub entities: HashMap<String, EntitySchema>,
}

impl CatalogConfig {
    /// 从JSON文件加载目录配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;

        Self::parse(&content, path_ref.display().to_string())
    }

    /// 从JSON文本加载目录配置
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<inline>".to_string())
    }

    fn parse(content: &str, origin: String) -> Result<Self, ConfigError> {
        let entities: HashMap<String, EntitySchema> = serde_json::from_str(content)
            .map_err(|source| ConfigError::Parse { origin, source })?;
        Ok(CatalogConfig { entities })
    }

    /// 转换为可供翻译器使用的静态目录
    pub fn into_catalog(self) -> StaticCatalog {
        StaticCatalog::from(self.entities)
    }
}
