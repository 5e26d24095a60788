use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harvester_core::definition::{DefinitionAdaptor, PropertyReader};
use harvester_core::models::{
    localized, ArgumentKind, DataReference, EntityDefinition, PublishedRecord, UiTemplate,
};
use harvester_core::traits::{InitContext, OutputBroker, OutputConnector, PluginFactory};
use harvester_core::{HarvesterError, HarvesterResult};
use tokio::fs;
use tracing::debug;
use url::Url;

const EXTENSION: &str = "xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderOutputConfig {
    pub root_folder: PathBuf,
    pub cleanup: bool,
}

impl FolderOutputConfig {
    pub const P_ROOT_FOLDER: &'static str = "f-root-folder";
    pub const P_CLEANUP: &'static str = "f-cleanup";
}

impl DefinitionAdaptor for FolderOutputConfig {
    const TYPE: &'static str = "FOLDER";

    fn from_properties(properties: &BTreeMap<String, String>) -> HarvesterResult<Self> {
        let reader = PropertyReader::new(Self::TYPE, properties);
        Ok(Self {
            root_folder: PathBuf::from(reader.required(Self::P_ROOT_FOLDER)?),
            cleanup: reader.bool_or(Self::P_CLEANUP, false)?,
        })
    }

    fn write_properties(&self, properties: &mut BTreeMap<String, String>) {
        properties.insert(
            Self::P_ROOT_FOLDER.to_string(),
            self.root_folder.display().to_string(),
        );
        properties.insert(Self::P_CLEANUP.to_string(), self.cleanup.to_string());
    }
}

/// 文件名中只保留安全字符
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

/// 数据源对应的子目录：有主机名时取主机名，否则按完整路径逐级建目录
pub fn source_folder(broker_uri: &Url) -> String {
    if let Some(host) = broker_uri.host_str().filter(|h| !h.is_empty()) {
        return sanitize(host);
    }
    let segments: Vec<String> = broker_uri
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).map(sanitize).collect())
        .unwrap_or_default();
    if segments.is_empty() {
        "default".to_string()
    } else {
        segments.join("/")
    }
}

/// 把记录写成本地文件：`<root>/<数据源子目录>/<id>.xml`
pub struct FolderOutputBroker {
    definition: EntityDefinition,
    config: FolderOutputConfig,
    /// 最近一次读取已发布记录时使用的子目录，删除记录时使用
    cleanup_folder: Option<PathBuf>,
}

impl FolderOutputBroker {
    pub fn new(definition: EntityDefinition, config: FolderOutputConfig) -> Self {
        Self {
            definition,
            config,
            cleanup_folder: None,
        }
    }

    fn folder_for(&self, broker_uri: &Url) -> PathBuf {
        self.config.root_folder.join(source_folder(broker_uri))
    }

    fn file_in(folder: &Path, id: &str) -> PathBuf {
        folder.join(format!("{id}.{EXTENSION}"))
    }
}

#[async_trait]
impl OutputBroker for FolderOutputBroker {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn initialize(&mut self, context: &InitContext) -> HarvesterResult<()> {
        self.config.override_with(&context.params)?;
        fs::create_dir_all(&self.config.root_folder)
            .await
            .map_err(|e| {
                HarvesterError::Processor(format!(
                    "无法创建目录 {}: {e}",
                    self.config.root_folder.display()
                ))
            })?;
        Ok(())
    }

    async fn publish(&mut self, data: &DataReference) -> HarvesterResult<PublishedRecord> {
        let name = self.definition.display_name().to_string();
        let Some((_, payload)) = data.primary_content() else {
            return Err(HarvesterError::rejected(
                name,
                Some(data.id.clone()),
                "记录没有内容",
            ));
        };

        let folder = self.folder_for(&data.broker_uri);
        let id = sanitize(&data.id);
        let path = Self::file_in(&folder, &id);
        let output_error = |e: std::io::Error| {
            HarvesterError::output(
                name.clone(),
                Some(data.id.clone()),
                format!("写入 {} 失败: {e}", path.display()),
            )
        };

        fs::create_dir_all(&folder).await.map_err(output_error)?;
        let existed = fs::try_exists(&path).await.unwrap_or(false);
        fs::write(&path, payload).await.map_err(output_error)?;
        debug!(path = %path.display(), "记录已写入");

        Ok(if existed {
            PublishedRecord::updated(id)
        } else {
            PublishedRecord::created(id)
        })
    }

    async fn terminate(&mut self) -> HarvesterResult<()> {
        self.cleanup_folder = None;
        Ok(())
    }

    fn cleanup_enabled(&self) -> bool {
        self.config.cleanup
    }

    async fn existing_ids(&mut self, source: &Url) -> HarvesterResult<HashSet<String>> {
        let folder = self.folder_for(source);
        let mut ids = HashSet::new();
        match fs::read_dir(&folder).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.insert(stem.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.cleanup_folder = Some(folder);
        Ok(ids)
    }

    async fn delete(&mut self, id: &str) -> HarvesterResult<()> {
        let folder = self
            .cleanup_folder
            .as_ref()
            .ok_or_else(|| HarvesterError::Processor("尚未读取已发布记录".to_string()))?;
        let path = Self::file_in(folder, id);
        fs::remove_file(&path).await.map_err(|e| {
            HarvesterError::Processor(format!("删除 {} 失败: {e}", path.display()))
        })
    }
}

pub struct FolderOutputConnector;

impl PluginFactory for FolderOutputConnector {
    fn type_id(&self) -> &str {
        FolderOutputConfig::TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(
            FolderOutputConfig::TYPE,
            localized(locale, "本地目录", "Local folder"),
        )
        .argument(
            FolderOutputConfig::P_ROOT_FOLDER,
            localized(locale, "根目录", "Root folder"),
            ArgumentKind::String,
            true,
        )
        .argument(
            FolderOutputConfig::P_CLEANUP,
            localized(locale, "清理过期记录", "Delete stale records"),
            ArgumentKind::Bool,
            false,
        )
        .default_value("false")
    }
}

impl OutputConnector for FolderOutputConnector {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn OutputBroker>> {
        let config = FolderOutputConfig::from_definition(definition)?;
        Ok(Box::new(FolderOutputBroker::new(definition.clone(), config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_folder_prefers_host() {
        let url = Url::parse("http://catalog.example.com/csw").unwrap();
        assert_eq!(source_folder(&url), "catalog.example.com");

        let url = Url::parse("file:///data/in/").unwrap();
        assert_eq!(source_folder(&url), "data/in");

        let url = Url::parse("file:///a/in/").unwrap();
        assert_ne!(source_folder(&url), source_folder(&Url::parse("file:///b/in/").unwrap()));
        assert_eq!(source_folder(&Url::parse("file:///").unwrap()), "default");
        assert_eq!(source_folder(&Url::parse("file:///x/../etc/").unwrap()), "etc");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b c.xml"), "a_b_c.xml");
        assert_eq!(sanitize(".."), "_");
    }
}
