//! Shared harness for the operation-layer suites
//!
//! Wires [`EngagementSync`] to in-memory adapters and records notifier
//! events so tests can assert on the lifecycle of each operation.

#![allow(dead_code)]

use parking_lot::Mutex;
use pov_model::{
    Actor, ActorId, Engagement, EngagementId, LogKind, NewCriterion, NewEngagement, NewSession,
    SessionActivityInput,
};
use pov_store::AggregateStore;
use pov_sync::{
    EngagementSync, MemoryBlobStorage, MemoryGateway, Notifier, Ports, StaticIdentity, SyncConfig,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Failed(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn started(&self, label: &str) {
        self.events.lock().push(Event::Started(label.to_string()));
    }

    fn succeeded(&self, label: &str) {
        self.events.lock().push(Event::Succeeded(label.to_string()));
    }

    fn failed(&self, message: &str) {
        self.events.lock().push(Event::Failed(message.to_string()));
    }
}

pub struct Harness {
    pub sync: EngagementSync,
    pub gateway: Arc<MemoryGateway>,
    pub storage: Arc<MemoryBlobStorage>,
    pub identity: Arc<StaticIdentity>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<AggregateStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::new())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self::build(config, MemoryGateway::new())
    }

    pub fn build(config: SyncConfig, gateway: MemoryGateway) -> Self {
        let gateway = Arc::new(gateway);
        let storage = Arc::new(MemoryBlobStorage::new());
        let identity = Arc::new(StaticIdentity::new(owner()));
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(AggregateStore::new());
        let ports = Ports {
            gateway: gateway.clone(),
            identity: identity.clone(),
            notifier: notifier.clone(),
            storage: storage.clone(),
        };
        Self {
            sync: EngagementSync::new(config, ports, Arc::clone(&store)),
            gateway,
            storage,
            identity,
            notifier,
            store,
        }
    }

    /// Create and load a fresh engagement
    pub async fn engagement(&self) -> EngagementId {
        self.sync
            .create_engagement(NewEngagement {
                title: "Acme POV".into(),
                customer_name: "Acme Corp".into(),
                ..Default::default()
            })
            .await
            .expect("create engagement")
            .id
    }

    pub fn loaded(&self) -> Engagement {
        self.store.engagement().expect("an engagement is loaded")
    }

    /// Log entries of one kind in the loaded aggregate, newest first
    pub fn log_of(&self, kind: LogKind) -> Vec<String> {
        self.loaded()
            .activity_log
            .into_iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.description)
            .collect()
    }
}

pub fn owner() -> Actor {
    Actor::new(ActorId::new(), "Sam.Lee@Example.com", "Sam Lee")
}

pub fn criterion(engagement_id: EngagementId, activities: &[&str]) -> NewCriterion {
    NewCriterion {
        engagement_id: Some(engagement_id),
        title: "Threat detection".into(),
        success_criteria: "Detect 95% of simulated attacks".into(),
        categories: vec!["Security".into()],
        activities: activities.iter().map(|a| (*a).to_string()).collect(),
        ..Default::default()
    }
}

pub fn session(engagement_id: EngagementId, activities: Vec<SessionActivityInput>) -> NewSession {
    NewSession {
        engagement_id: Some(engagement_id),
        title: "Day 1".into(),
        scheduled_at: chrono::Utc::now(),
        duration_minutes: 90,
        notes: String::new(),
        activities,
    }
}
