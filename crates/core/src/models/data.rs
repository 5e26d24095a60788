use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// 常用内容类型
pub mod content_kind {
    pub const APPLICATION_XML: &str = "application/xml";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const TEXT_PLAIN: &str = "text/plain";
}

/// 一条采集记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReference {
    /// 在数据源内稳定的记录标识
    pub id: String,
    /// 产生该记录的数据源地址，清理时按此地址匹配已发布记录
    pub broker_uri: Url,
    pub broker_name: String,
    pub source_uri: Url,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl DataReference {
    pub fn new(
        id: impl Into<String>,
        broker_uri: Url,
        broker_name: impl Into<String>,
        source_uri: Url,
    ) -> Self {
        Self {
            id: id.into(),
            broker_uri,
            broker_name: broker_name.into(),
            source_uri,
            last_modified: None,
            content: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_content(mut self, kind: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        self.content.insert(kind.into(), payload.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    pub fn content(&self, kind: &str) -> Option<&[u8]> {
        self.content.get(kind).map(Vec::as_slice)
    }

    /// 首选的内容：优先XML，其次任意一种
    pub fn primary_content(&self) -> Option<(&str, &[u8])> {
        self.content
            .get_key_value(content_kind::APPLICATION_XML)
            .or_else(|| self.content.iter().next())
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// 发布结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishingStatus {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "UPDATED")]
    Updated,
}

/// 目标端确认发布的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    /// 目标端使用的记录标识，与清理快照中的标识一致
    pub id: String,
    pub status: PublishingStatus,
}

impl PublishedRecord {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: PublishingStatus::Created,
        }
    }

    pub fn updated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: PublishingStatus::Updated,
        }
    }
}
