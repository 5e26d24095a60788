//! Mock implementations of brokers, connectors, stores and trigger contexts
//!
//! Every mock keeps its observable state behind `Arc<Mutex<..>>` so a test can
//! hand the mock to the engine and still inspect what happened afterwards.

use std::collections::{BTreeMap, HashSet};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_core::models::{
    DataReference, EntityDefinition, History, HistoryEvent, HistoryReport, PublishedRecord,
    TaskDefinition, UiTemplate,
};
use harvester_core::traits::{
    CrudRepository, HistoryRepository, InitContext, InputBroker, InputConnector, InputIterator,
    IteratorContext, OutputBroker, OutputConnector, PluginFactory, TriggerContext,
};
use harvester_core::{HarvesterError, HarvesterResult};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

/// One scripted step of a mock input iterator
#[derive(Debug, Clone)]
pub enum ScriptedRecord {
    Record(DataReference),
    /// `next()` fails with an input error
    Fail(String),
}

/// Lifecycle calls observed on a mock broker
#[derive(Debug, Default)]
pub struct BrokerLog {
    pub initialized: usize,
    pub terminated: usize,
    pub params: BTreeMap<String, String>,
    pub last_harvest: Option<DateTime<Utc>>,
    /// ids asked for through `read_content`
    pub read_ids: Vec<String>,
    /// `next()` calls made on a stalled iterator
    pub next_calls: usize,
}

/// Scripted input broker
#[derive(Clone)]
pub struct MockInputBroker {
    definition: EntityDefinition,
    broker_uri: Url,
    script: Vec<ScriptedRecord>,
    fail_initialize: bool,
    fail_has_next_at: Option<usize>,
    stalled: bool,
    log: Arc<Mutex<BrokerLog>>,
}

impl MockInputBroker {
    pub fn new(broker_uri: &str) -> Self {
        Self {
            definition: EntityDefinition::new("MOCK-IN"),
            broker_uri: Url::parse(broker_uri).expect("valid mock broker uri"),
            script: Vec::new(),
            fail_initialize: false,
            fail_has_next_at: None,
            stalled: false,
            log: Arc::new(Mutex::new(BrokerLog::default())),
        }
    }

    pub fn with_records(mut self, records: Vec<DataReference>) -> Self {
        self.script
            .extend(records.into_iter().map(ScriptedRecord::Record));
        self
    }

    pub fn with_step(mut self, step: ScriptedRecord) -> Self {
        self.script.push(step);
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// `has_next()` fails once this many steps have been consumed
    pub fn failing_has_next_at(mut self, position: usize) -> Self {
        self.fail_has_next_at = Some(position);
        self
    }

    /// `has_next()` always answers true and `next()` always fails without advancing
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<BrokerLog>> {
        Arc::clone(&self.log)
    }
}

struct MockIterator {
    script: std::vec::IntoIter<ScriptedRecord>,
    remaining: usize,
    consumed: usize,
    fail_has_next_at: Option<usize>,
    stalled: bool,
    log: Arc<Mutex<BrokerLog>>,
}

#[async_trait]
impl InputIterator for MockIterator {
    async fn has_next(&mut self) -> HarvesterResult<bool> {
        if self.fail_has_next_at == Some(self.consumed) {
            return Err(HarvesterError::Input("连接中断".to_string()));
        }
        Ok(self.stalled || self.remaining > 0)
    }

    async fn next(&mut self) -> HarvesterResult<DataReference> {
        if self.stalled {
            self.log.lock().unwrap().next_calls += 1;
            return Err(HarvesterError::Input("读取超时".to_string()));
        }
        self.remaining = self.remaining.saturating_sub(1);
        self.consumed += 1;
        match self.script.next() {
            Some(ScriptedRecord::Record(data)) => Ok(data),
            Some(ScriptedRecord::Fail(message)) => Err(HarvesterError::Input(message)),
            None => Err(HarvesterError::Input("没有更多记录".to_string())),
        }
    }
}

#[async_trait]
impl InputBroker for MockInputBroker {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    fn broker_uri(&self) -> HarvesterResult<Url> {
        Ok(self.broker_uri.clone())
    }

    async fn initialize(&mut self, context: &InitContext) -> HarvesterResult<()> {
        if self.fail_initialize {
            return Err(HarvesterError::Processor("数据源不可用".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        log.initialized += 1;
        log.params = context.params.clone();
        Ok(())
    }

    async fn iterator(
        &mut self,
        context: &IteratorContext,
    ) -> HarvesterResult<Box<dyn InputIterator>> {
        self.log.lock().unwrap().last_harvest = context.last_harvest;
        Ok(Box::new(MockIterator {
            remaining: self.script.len(),
            script: self.script.clone().into_iter(),
            consumed: 0,
            fail_has_next_at: self.fail_has_next_at,
            stalled: self.stalled,
            log: Arc::clone(&self.log),
        }))
    }

    async fn read_content(&mut self, id: &str) -> HarvesterResult<Option<DataReference>> {
        self.log.lock().unwrap().read_ids.push(id.to_string());
        Ok(self.script.iter().find_map(|step| match step {
            ScriptedRecord::Record(data) if data.id == id => Some(data.clone()),
            _ => None,
        }))
    }

    async fn terminate(&mut self) -> HarvesterResult<()> {
        self.log.lock().unwrap().terminated += 1;
        Ok(())
    }
}

/// Everything a mock output broker saw
#[derive(Debug, Default)]
pub struct OutputLog {
    pub initialized: usize,
    pub terminated: usize,
    pub published: Vec<String>,
    pub deleted: Vec<String>,
    pub snapshot_source: Option<Url>,
}

/// Output broker with scripted failures and a preexisting record set
#[derive(Clone)]
pub struct MockOutputBroker {
    definition: EntityDefinition,
    cleanup: bool,
    existing: HashSet<String>,
    failing: HashSet<String>,
    rejecting: HashSet<String>,
    fail_initialize: bool,
    log: Arc<Mutex<OutputLog>>,
}

impl MockOutputBroker {
    pub fn new(name: &str) -> Self {
        Self {
            definition: EntityDefinition::new("MOCK-OUT").with_label(name),
            cleanup: false,
            existing: HashSet::new(),
            failing: HashSet::new(),
            rejecting: HashSet::new(),
            fail_initialize: false,
            log: Arc::new(Mutex::new(OutputLog::default())),
        }
    }

    /// Enables cleanup with the given ids already published by an earlier run
    pub fn with_cleanup<I, S>(mut self, existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleanup = true;
        self.existing = existing.into_iter().map(Into::into).collect();
        self
    }

    /// Publishing these ids fails with a non-negligible error
    pub fn failing_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Publishing these ids is rejected with a negligible error
    pub fn rejecting<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejecting = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<OutputLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl OutputBroker for MockOutputBroker {
    fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    async fn initialize(&mut self, _context: &InitContext) -> HarvesterResult<()> {
        if self.fail_initialize {
            return Err(HarvesterError::Processor("目标不可用".to_string()));
        }
        self.log.lock().unwrap().initialized += 1;
        Ok(())
    }

    async fn publish(&mut self, data: &DataReference) -> HarvesterResult<PublishedRecord> {
        let name = self.definition.display_name().to_string();
        if self.failing.contains(&data.id) {
            return Err(HarvesterError::output(name, Some(data.id.clone()), "写入超时"));
        }
        if self.rejecting.contains(&data.id) {
            return Err(HarvesterError::rejected(name, Some(data.id.clone()), "元数据校验失败"));
        }
        self.log.lock().unwrap().published.push(data.id.clone());
        if self.existing.contains(&data.id) {
            Ok(PublishedRecord::updated(&data.id))
        } else {
            Ok(PublishedRecord::created(&data.id))
        }
    }

    async fn terminate(&mut self) -> HarvesterResult<()> {
        self.log.lock().unwrap().terminated += 1;
        Ok(())
    }

    fn cleanup_enabled(&self) -> bool {
        self.cleanup
    }

    async fn existing_ids(&mut self, source: &Url) -> HarvesterResult<HashSet<String>> {
        self.log.lock().unwrap().snapshot_source = Some(source.clone());
        Ok(self.existing.clone())
    }

    async fn delete(&mut self, id: &str) -> HarvesterResult<()> {
        self.log.lock().unwrap().deleted.push(id.to_string());
        Ok(())
    }
}

/// Connector handing out clones of a prepared input broker
pub struct MockInputConnector {
    pub prototype: MockInputBroker,
}

impl PluginFactory for MockInputConnector {
    fn type_id(&self) -> &str {
        "MOCK-IN"
    }

    fn describe(&self, _locale: &str) -> UiTemplate {
        UiTemplate::new("MOCK-IN", "Mock input")
    }
}

impl InputConnector for MockInputConnector {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn InputBroker>> {
        definition.expect_type("MOCK-IN")?;
        Ok(Box::new(self.prototype.clone()))
    }
}

/// Connector handing out clones of a prepared output broker
pub struct MockOutputConnector {
    pub prototype: MockOutputBroker,
}

impl PluginFactory for MockOutputConnector {
    fn type_id(&self) -> &str {
        "MOCK-OUT"
    }

    fn describe(&self, _locale: &str) -> UiTemplate {
        UiTemplate::new("MOCK-OUT", "Mock output")
    }
}

impl OutputConnector for MockOutputConnector {
    fn build(&self, definition: &EntityDefinition) -> HarvesterResult<Box<dyn OutputBroker>> {
        definition.expect_type("MOCK-OUT")?;
        Ok(Box::new(self.prototype.clone()))
    }
}

/// In-memory history store
#[derive(Default, Clone)]
pub struct MockHistoryRepository {
    events: Arc<Mutex<Vec<HistoryEvent>>>,
    failed: Arc<Mutex<Vec<(Uuid, String)>>>,
    unavailable: bool,
}

impl MockHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a persistence error
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_events(events: Vec<HistoryEvent>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<HistoryEvent> {
        self.events.lock().unwrap().clone()
    }

    fn check(&self) -> HarvesterResult<()> {
        if self.unavailable {
            Err(HarvesterError::Persistence("历史存储不可用".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HistoryRepository for MockHistoryRepository {
    async fn create(&self, event: HistoryEvent) -> HarvesterResult<Uuid> {
        self.check()?;
        let id = event.id;
        self.events.lock().unwrap().push(event);
        Ok(id)
    }

    async fn list(&self, task_id: Uuid) -> HarvesterResult<History> {
        self.check()?;
        Ok(History(
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.task_id == task_id)
                .cloned()
                .collect(),
        ))
    }

    async fn purge(&self, task_id: Uuid) -> HarvesterResult<()> {
        self.check()?;
        self.events.lock().unwrap().retain(|e| e.task_id != task_id);
        Ok(())
    }

    async fn store_failed_data_id(&self, event_id: Uuid, data_id: &str) -> HarvesterResult<()> {
        self.check()?;
        self.failed
            .lock()
            .unwrap()
            .push((event_id, data_id.to_string()));
        Ok(())
    }

    async fn failed_data_ids(&self, event_id: Uuid) -> HarvesterResult<Vec<String>> {
        self.check()?;
        Ok(self
            .failed
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == event_id)
            .map(|(_, data_id)| data_id.clone())
            .collect())
    }
}

/// In-memory CRUD store
pub struct MockCrudRepository<T> {
    items: Arc<Mutex<BTreeMap<Uuid, T>>>,
}

impl<T> MockCrudRepository<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

impl<T> Default for MockCrudRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> CrudRepository<T> for MockCrudRepository<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn create(&self, item: T) -> HarvesterResult<Uuid> {
        let id = Uuid::new_v4();
        self.items.lock().unwrap().insert(id, item);
        Ok(id)
    }

    async fn read(&self, id: Uuid) -> HarvesterResult<Option<T>> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, id: Uuid, item: T) -> HarvesterResult<bool> {
        let mut items = self.items.lock().unwrap();
        match items.get_mut(&id) {
            Some(existing) => {
                *existing = item;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> HarvesterResult<bool> {
        Ok(self.items.lock().unwrap().remove(&id).is_some())
    }

    async fn list(&self) -> HarvesterResult<Vec<(Uuid, T)>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .map(|(id, item)| (*id, item.clone()))
            .collect())
    }
}

/// Trigger context that records submissions and executions
pub struct RecordingTriggerContext {
    task_id: Option<Uuid>,
    last_harvest: Mutex<Option<DateTime<Utc>>>,
    submitted: AtomicUsize,
    executed: AtomicUsize,
    fail_execution: bool,
    fired: Notify,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl RecordingTriggerContext {
    pub fn new() -> Self {
        Self {
            task_id: Some(Uuid::new_v4()),
            last_harvest: Mutex::new(None),
            submitted: AtomicUsize::new(0),
            executed: AtomicUsize::new(0),
            fail_execution: false,
            fired: Notify::new(),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_last_harvest(self, last_harvest: DateTime<Utc>) -> Self {
        *self.last_harvest.lock().unwrap() = Some(last_harvest);
        self
    }

    /// Every execution returns an error
    pub fn failing(mut self) -> Self {
        self.fail_execution = true;
        self
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Waits until the next submission or execution
    pub async fn wait_fired(&self) {
        self.fired.notified().await;
    }

    /// Cancellation tokens handed to the executions so far
    pub fn tokens(&self) -> Vec<CancellationToken> {
        self.tokens.lock().unwrap().clone()
    }
}

impl Default for RecordingTriggerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerContext for RecordingTriggerContext {
    fn task_id(&self) -> Option<Uuid> {
        self.task_id
    }

    async fn submit(
        &self,
        _task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<Uuid> {
        self.tokens.lock().unwrap().push(cancel);
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.fired.notify_one();
        Ok(Uuid::new_v4())
    }

    async fn execute(
        &self,
        _task: &TaskDefinition,
        cancel: CancellationToken,
    ) -> HarvesterResult<HistoryReport> {
        self.tokens.lock().unwrap().push(cancel);
        self.executed.fetch_add(1, Ordering::SeqCst);
        *self.last_harvest.lock().unwrap() = Some(Utc::now());
        self.fired.notify_one();
        if self.fail_execution {
            return Err(HarvesterError::Processor("目标不可用".to_string()));
        }
        Ok(HistoryReport::default())
    }

    async fn last_harvest(&self) -> HarvesterResult<Option<DateTime<Utc>>> {
        Ok(*self.last_harvest.lock().unwrap())
    }
}
