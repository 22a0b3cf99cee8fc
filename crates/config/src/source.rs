//! 环境变量来源
//!
//! 合并 `.env` 文件与进程环境变量，进程环境变量优先

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ConfigError;

/// 覆盖默认 `.env` 路径的环境变量
pub const ENV_FILE_VAR: &str = "ENV_FILE";

/// 进程启动时的一次性环境变量快照
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// 读取 `.env` 文件（可选）并叠加进程环境变量
    ///
    /// 文件不存在不算错误；文件格式错误会返回 [`ConfigError::EnvFile`]。
    pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
        Self::from_process().merge_file(env_file)
    }

    /// 只读取进程环境变量
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 合并 `.env` 文件中的变量，已存在的变量不会被覆盖
    pub fn merge_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(self),
            Err(source) => {
                return Err(ConfigError::EnvFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        for item in iter {
            let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                path: path.to_path_buf(),
                source,
            })?;
            self.vars.entry(key).or_insert(value);
        }

        Ok(self)
    }

    /// 读取变量原值，空白字符串视为未设置
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn required(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// 读取并解析可选变量
    pub fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// 读取并解析必需变量
    pub fn required_parsed<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parsed(key)?
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }
}

/// 计算服务的 `.env` 文件位置
///
/// `ENV_FILE` 优先，否则取可执行文件所在目录下的 `.env`
pub fn resolve_env_file() -> PathBuf {
    let override_path = std::env::var(ENV_FILE_VAR).ok();
    let install_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    env_file_location(override_path.as_deref(), install_dir.as_deref())
}

/// `.env` 查找顺序：显式路径 → 安装目录 → 当前工作目录
pub fn env_file_location(override_path: Option<&str>, install_dir: Option<&Path>) -> PathBuf {
    match (override_path.map(str::trim).filter(|p| !p.is_empty()), install_dir) {
        (Some(path), _) => PathBuf::from(path),
        (None, Some(dir)) => dir.join(".env"),
        (None, None) => PathBuf::from(".env"),
    }
}
