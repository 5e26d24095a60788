use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_core::definition::{DefinitionAdaptor, PropertyReader};
use harvester_core::models::{
    content_kind, localized, ArgumentKind, DataReference, EntityDefinition, UiTemplate,
};
use harvester_core::traits::{
    InitContext, InputBroker, InputConnector, InputIterator, IteratorContext, PluginFactory,
};
use harvester_core::{HarvesterError, HarvesterResult};
use regex::Regex;
use tokio::fs;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInputConfig {
    pub root_folder: PathBuf,
    /// 文件名通配符，例如 `*.xml`
    pub pattern: Option<String>,
}

impl FolderInputConfig {
    pub const P_ROOT_FOLDER: &'static str = "f-root-folder";
    pub const P_PATTERN: &'static str = "f-pattern";
}

impl DefinitionAdaptor for FolderInputConfig {
    const TYPE: &'static str = "FOLDER";

    fn from_properties(properties: &BTreeMap<String, String>) -> HarvesterResult<Self> {
        let reader = PropertyReader::new(Self::TYPE, properties);
        let config = Self {
            root_folder: PathBuf::from(reader.required(Self::P_ROOT_FOLDER)?),
            pattern: reader.optional(Self::P_PATTERN),
        };
        if let Some(pattern) = &config.pattern {
            glob_regex(pattern)?;
        }
        Ok(config)
    }

    fn write_properties(&self, properties: &mut BTreeMap<String, String>) {
        properties.insert(
            Self::P_ROOT_FOLDER.to_string(),
            self.root_folder.display().to_string(),
        );
        if let Some(pattern) = &self.pattern {
            properties.insert(Self::P_PATTERN.to_string(), pattern.clone());
        }
    }
}

/// 通配符转换成正则：`*` 匹配任意字符，`?` 匹配单个字符
fn glob_regex(pattern: &str) -> HarvesterResult<Regex> {
    let mut expression = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');
    Regex::new(&expression).map_err(|e| {
        HarvesterError::invalid_definition(format!("无效的文件名模式 {pattern}: {e}"))
    })
}

fn kind_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("xml") => content_kind::APPLICATION_XML,
        Some("json") => content_kind::APPLICATION_JSON,
        _ => content_kind::TEXT_PLAIN,
    }
}

/// 从本地目录读取文件
pub struct FolderInputBroker {
    definition: EntityDefinition,
    config: FolderInputConfig,
    root: Option<PathBuf>,
}

impl FolderInputBroker {
    pub fn new(definition: EntityDefinition, config: FolderInputConfig) -> Self {
        Self {
            definition,
            config,
            root: None,
        }
    }
}

#[async_trait]
impl InputBroker for FolderInputBroker {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    fn broker_uri(&self) -> HarvesterResult<Url> {
        let root = self.root.as_ref().unwrap_or(&self.config.root_folder);
        Url::from_directory_path(root).map_err(|_| {
            HarvesterError::invalid_definition(format!(
                "目录必须是绝对路径: {}",
                root.display()
            ))
        })
    }

    async fn initialize(&mut self, context: &InitContext) -> HarvesterResult<()> {
        self.config.override_with(&context.params)?;
        let root = fs::canonicalize(&self.config.root_folder)
            .await
            .map_err(|e| {
                HarvesterError::Processor(format!(
                    "无法访问目录 {}: {e}",
                    self.config.root_folder.display()
                ))
            })?;
        if !fs::metadata(&root).await?.is_dir() {
            return Err(HarvesterError::Processor(format!(
                "{} 不是目录",
                root.display()
            )));
        }
        debug!(root = %root.display(), "目录数据源已初始化");
        self.root = Some(root);
        Ok(())
    }

    async fn iterator(
        &mut self,
        context: &IteratorContext,
    ) -> HarvesterResult<Box<dyn InputIterator>> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| HarvesterError::Processor("目录数据源尚未初始化".to_string()))?;
        let pattern = self.config.pattern.as_deref().map(glob_regex).transpose()?;
        Ok(Box::new(FolderIterator {
            broker_uri: self.broker_uri()?,
            broker_name: self.definition.display_name().to_string(),
            root: root.clone(),
            pending_dirs: vec![root],
            pending_files: Vec::new(),
            pattern,
            since: context.last_harvest,
            next_file: None,
        }))
    }

    async fn read_content(&mut self, id: &str) -> HarvesterResult<Option<DataReference>> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| HarvesterError::Processor("目录数据源尚未初始化".to_string()))?;
        let relative = Path::new(id);
        if id.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(HarvesterError::Input(format!("无效的记录标识: {id}")));
        }
        let Some(stem) = relative.file_name() else {
            return Ok(None);
        };
        let dir = relative
            .parent()
            .map_or_else(|| root.clone(), |parent| root.join(parent));

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HarvesterError::Input(format!(
                    "无法读取目录 {}: {e}",
                    dir.display()
                )))
            }
        };
        // 记录标识不含扩展名，同名文件取文件名最小的一个
        let mut found: Option<(PathBuf, DateTime<Utc>)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.with_extension("").file_name() != Some(stem) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if found.as_ref().map_or(true, |(current, _)| path < *current) {
                found = Some((path, modified_at(&metadata)));
            }
        }

        match found {
            Some((path, modified)) => {
                debug!(record.id = %id, path = %path.display(), "读取单条记录");
                let broker_name = self.definition.display_name().to_string();
                read_record(&root, &self.broker_uri()?, &broker_name, &path, modified)
                    .await
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    async fn terminate(&mut self) -> HarvesterResult<()> {
        self.root = None;
        Ok(())
    }
}

fn modified_at(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// 相对根目录的路径，去掉扩展名
fn record_id(root: &Path, path: &Path) -> String {
    let path = path.with_extension("");
    path.strip_prefix(root)
        .unwrap_or(&path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

async fn read_record(
    root: &Path,
    broker_uri: &Url,
    broker_name: &str,
    path: &Path,
    modified: DateTime<Utc>,
) -> HarvesterResult<DataReference> {
    let payload = fs::read(path).await.map_err(|e| {
        HarvesterError::Input(format!("无法读取文件 {}: {e}", path.display()))
    })?;
    let source_uri = Url::from_file_path(path).map_err(|_| {
        HarvesterError::Input(format!("无法转换文件路径 {}", path.display()))
    })?;

    Ok(DataReference::new(
        record_id(root, path),
        broker_uri.clone(),
        broker_name.to_string(),
        source_uri,
    )
    .with_last_modified(modified)
    .with_content(kind_for(path), payload))
}

/// 惰性遍历目录树，每次只展开一层
struct FolderIterator {
    broker_uri: Url,
    broker_name: String,
    root: PathBuf,
    pending_dirs: Vec<PathBuf>,
    pending_files: Vec<(PathBuf, DateTime<Utc>)>,
    pattern: Option<Regex>,
    since: Option<DateTime<Utc>>,
    next_file: Option<(PathBuf, DateTime<Utc>)>,
}

impl FolderIterator {
    fn accepts(&self, path: &Path, modified: DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if modified <= since {
                return false;
            }
        }
        match (&self.pattern, path.file_name().and_then(|n| n.to_str())) {
            (Some(pattern), Some(name)) => pattern.is_match(name),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    async fn expand(&mut self, dir: PathBuf) -> HarvesterResult<()> {
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            HarvesterError::Input(format!("无法读取目录 {}: {e}", dir.display()))
        })?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let path = entry.path();
            if metadata.is_dir() {
                self.pending_dirs.push(path);
            } else if metadata.is_file() {
                let modified = modified_at(&metadata);
                if self.accepts(&path, modified) {
                    files.push((path, modified));
                }
            }
        }
        // 逆序存放，pop 时按文件名顺序输出
        files.sort_by(|a, b| b.0.cmp(&a.0));
        self.pending_files = files;
        self.pending_dirs.sort_by(|a, b| b.cmp(a));
        Ok(())
    }
}

#[async_trait]
impl InputIterator for FolderIterator {
    async fn has_next(&mut self) -> HarvesterResult<bool> {
        if self.next_file.is_some() {
            return Ok(true);
        }
        loop {
            if let Some(file) = self.pending_files.pop() {
                self.next_file = Some(file);
                return Ok(true);
            }
            match self.pending_dirs.pop() {
                Some(dir) => self.expand(dir).await?,
                None => return Ok(false),
            }
        }
    }

    async fn next(&mut self) -> HarvesterResult<DataReference> {
        if self.next_file.is_none() && !self.has_next().await? {
            return Err(HarvesterError::Input("没有更多文件".to_string()));
        }
        let (path, modified) = self
            .next_file
            .take()
            .ok_or_else(|| HarvesterError::Input("没有更多文件".to_string()))?;

        read_record(
            &self.root,
            &self.broker_uri,
            &self.broker_name,
            &path,
            modified,
        )
        .await
    }
}

pub struct FolderInputConnector;

impl PluginFactory for FolderInputConnector {
    fn type_id(&self) -> &str {
        FolderInputConfig::TYPE
    }

    fn describe(&self, locale: &str) -> UiTemplate {
        UiTemplate::new(
            FolderInputConfig::TYPE,
            localized(locale, "本地目录", "Local folder"),
        )
        .argument(
            FolderInputConfig::P_ROOT_FOLDER,
            localized(locale, "根目录", "Root folder"),
            ArgumentKind::String,
            true,
        )
        .argument(
            FolderInputConfig::P_PATTERN,
            localized(locale, "文件名模式", "File pattern"),
            ArgumentKind::String,
            false,
        )
    }
}

impl InputConnector for FolderInputConnector {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn InputBroker>> {
        let config = FolderInputConfig::from_definition(definition)?;
        Ok(Box::new(FolderInputBroker::new(definition.clone(), config)))
    }
}
