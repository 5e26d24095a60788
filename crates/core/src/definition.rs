//! 通用定义解析
//!
//! 插件配置统一存放在 [`EntityDefinition`] 的键值表中。每个连接器用一个小的类型化结构
//! 描述自己的配置，并通过 [`DefinitionAdaptor`] 在键值表与结构之间转换；
//! 公共的配置块（凭据、robots.txt 设置）以组合方式嵌入，各自校验自己的键。
//!
//! ```rust
//! use harvester_core::definition::{DefinitionAdaptor, PropertyReader};
//! use harvester_core::models::EntityDefinition;
//! use harvester_core::HarvesterResult;
//! use std::collections::BTreeMap;
//!
//! #[derive(Debug, PartialEq)]
//! struct EchoConfig { prefix: String, repeat: u32 }
//!
//! impl DefinitionAdaptor for EchoConfig {
//!     const TYPE: &'static str = "ECHO";
//!
//!     fn from_properties(properties: &BTreeMap<String, String>) -> HarvesterResult<Self> {
//!         let reader = PropertyReader::new(Self::TYPE, properties);
//!         Ok(Self { prefix: reader.required("e-prefix")?, repeat: reader.parse_or("e-repeat", 1)? })
//!     }
//!
//!     fn write_properties(&self, properties: &mut BTreeMap<String, String>) {
//!         properties.insert("e-prefix".into(), self.prefix.clone());
//!         properties.insert("e-repeat".into(), self.repeat.to_string());
//!     }
//! }
//!
//! let def = EntityDefinition::new("ECHO").with_property("e-prefix", ">");
//! let config = EchoConfig::from_definition(&def).unwrap();
//! assert_eq!(config.repeat, 1);
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use url::Url;

use crate::{models::EntityDefinition, HarvesterError, HarvesterResult};

/// 键值表读取器，所有错误都转换为 InvalidDefinition
pub struct PropertyReader<'a> {
    owner: &'a str,
    properties: &'a BTreeMap<String, String>,
}

impl<'a> PropertyReader<'a> {
    pub fn new(owner: &'a str, properties: &'a BTreeMap<String, String>) -> Self {
        Self { owner, properties }
    }

    /// 非空白的属性值
    pub fn optional(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn required(&self, key: &str) -> HarvesterResult<String> {
        self.optional(key).ok_or_else(|| {
            HarvesterError::invalid_definition(format!("{}: 缺少必填参数 {key}", self.owner))
        })
    }

    pub fn bool_or(&self, key: &str, default: bool) -> HarvesterResult<bool> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(true),
                "false" | "no" | "0" | "off" => Ok(false),
                _ => Err(self.invalid(key, &value)),
            },
        }
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> HarvesterResult<T>
    where
        T: FromStr,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| self.invalid(key, &value)),
        }
    }

    pub fn parse_required<T>(&self, key: &str) -> HarvesterResult<T>
    where
        T: FromStr,
    {
        let value = self.required(key)?;
        value.parse().map_err(|_| self.invalid(key, &value))
    }

    pub fn url(&self, key: &str) -> HarvesterResult<Url> {
        let value = self.required(key)?;
        Url::parse(&value).map_err(|e| {
            HarvesterError::invalid_definition(format!(
                "{}: 参数 {key} 不是有效的URL ({value}): {e}",
                self.owner
            ))
        })
    }

    fn invalid(&self, key: &str, value: &impl Display) -> HarvesterError {
        HarvesterError::invalid_definition(format!(
            "{}: 参数 {key} 的值无效 ({value})",
            self.owner
        ))
    }
}

/// 类型化配置与 [`EntityDefinition`] 之间的转换
pub trait DefinitionAdaptor: Sized {
    /// 对应的插件类型
    const TYPE: &'static str;

    fn from_properties(properties: &BTreeMap<String, String>) -> HarvesterResult<Self>;

    fn write_properties(&self, properties: &mut BTreeMap<String, String>);

    fn from_definition(definition: &EntityDefinition) -> HarvesterResult<Self> {
        definition.expect_type(Self::TYPE)?;
        Self::from_properties(&definition.properties)
    }

    fn to_definition(&self) -> EntityDefinition {
        let mut definition = EntityDefinition::new(Self::TYPE);
        self.write_properties(&mut definition.properties);
        definition
    }

    /// 在初始化时用运行参数覆盖配置，不修改已存储的定义
    fn override_with(&mut self, params: &BTreeMap<String, String>) -> HarvesterResult<()> {
        if params.is_empty() {
            return Ok(());
        }
        let mut merged = BTreeMap::new();
        self.write_properties(&mut merged);
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        *self = Self::from_properties(&merged)?;
        Ok(())
    }
}

/// 凭据配置块
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsConfig {
    pub const P_USERNAME: &'static str = "cred-username";
    pub const P_PASSWORD: &'static str = "cred-password";

    pub fn read(reader: &PropertyReader<'_>) -> HarvesterResult<Self> {
        let username = reader.optional(Self::P_USERNAME);
        let password = reader.optional(Self::P_PASSWORD);
        if password.is_some() && username.is_none() {
            return Err(HarvesterError::invalid_definition(format!(
                "提供了 {} 但缺少 {}",
                Self::P_PASSWORD,
                Self::P_USERNAME
            )));
        }
        Ok(Self { username, password })
    }

    pub fn write(&self, properties: &mut BTreeMap<String, String>) {
        if let Some(username) = &self.username {
            properties.insert(Self::P_USERNAME.to_string(), username.clone());
        }
        if let Some(password) = &self.password {
            properties.insert(Self::P_PASSWORD.to_string(), password.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none()
    }
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// robots.txt 配置块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsConfig {
    pub enabled: bool,
    pub user_agent: String,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: "GeoportalHarvester".to_string(),
        }
    }
}

impl RobotsConfig {
    pub const P_ENABLED: &'static str = "bot-enabled";
    pub const P_USER_AGENT: &'static str = "bot-user-agent";

    pub fn read(reader: &PropertyReader<'_>) -> HarvesterResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: reader.bool_or(Self::P_ENABLED, defaults.enabled)?,
            user_agent: reader
                .optional(Self::P_USER_AGENT)
                .unwrap_or(defaults.user_agent),
        })
    }

    pub fn write(&self, properties: &mut BTreeMap<String, String>) {
        properties.insert(Self::P_ENABLED.to_string(), self.enabled.to_string());
        properties.insert(Self::P_USER_AGENT.to_string(), self.user_agent.clone());
    }
}
