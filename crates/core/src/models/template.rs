use serde::{Deserialize, Serialize};

/// 参数类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "choices", rename_all = "lowercase")]
pub enum ArgumentKind {
    String,
    Password,
    Integer,
    Bool,
    Url,
    Period,
    Choice(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiArgument {
    pub name: String,
    pub label: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: ArgumentKind,
    #[serde(default, rename = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// 供外部配置界面使用的参数模板，引擎本身只用于展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiTemplate {
    #[serde(rename = "type")]
    pub type_id: String,
    pub label: String,
    pub arguments: Vec<UiArgument>,
}

impl UiTemplate {
    pub fn new(type_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            label: label.into(),
            arguments: Vec::new(),
        }
    }

    pub fn argument(
        mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        kind: ArgumentKind,
        required: bool,
    ) -> Self {
        self.arguments.push(UiArgument {
            name: name.into(),
            label: label.into(),
            required,
            kind,
            default_value: None,
        });
        self
    }

    /// 为最后添加的参数设置默认值
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        if let Some(last) = self.arguments.last_mut() {
            last.default_value = Some(value.into());
        }
        self
    }

    pub fn required_arguments(&self) -> impl Iterator<Item = &UiArgument> {
        self.arguments.iter().filter(|a| a.required)
    }
}

/// 选择标签语言：`zh` 开头的区域使用中文，其余使用英文
pub fn localized<'a>(locale: &str, zh: &'a str, en: &'a str) -> &'a str {
    if locale.to_ascii_lowercase().starts_with("zh") {
        zh
    } else {
        en
    }
}
