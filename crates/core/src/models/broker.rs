use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityDefinition;
use crate::HarvesterError;

/// 代理类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerCategory {
    #[serde(rename = "INBOUND", alias = "inbound")]
    Inbound,
    #[serde(rename = "OUTBOUND", alias = "outbound")]
    Outbound,
}

impl fmt::Display for BrokerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerCategory::Inbound => write!(f, "INBOUND"),
            BrokerCategory::Outbound => write!(f, "OUTBOUND"),
        }
    }
}

impl FromStr for BrokerCategory {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INBOUND" => Ok(BrokerCategory::Inbound),
            "OUTBOUND" => Ok(BrokerCategory::Outbound),
            _ => Err(HarvesterError::invalid_definition(format!(
                "未知的代理类别: {s}"
            ))),
        }
    }
}

/// 可复用的代理配置条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerReference {
    pub id: Uuid,
    pub category: BrokerCategory,
    pub definition: EntityDefinition,
    #[serde(rename = "resourceLocator")]
    pub resource_locator: String,
}
