use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::command::{self, Command, Request};
use crate::config::EmotitleConfig;
use crate::decoration::DecorationStore;
use crate::error::EmotitleError;
use crate::expiry::ExpiryScheduler;
use crate::history::EventHistory;
use crate::info::{self, InfoDump};
use crate::topology::{EntityKey, HostPaneId, HostUpdate, TabKey, TopologySnapshot};

pub const RESPONSE_OK: &str = "ok";

/// Rename directive for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleUpdate {
    Pane { id: HostPaneId, title: String },
    Tab { key: TabKey, title: String },
}

impl TitleUpdate {
    pub fn title(&self) -> &str {
        match self {
            TitleUpdate::Pane { title, .. } | TitleUpdate::Tab { title, .. } => title,
        }
    }
}

/// What the host must do after the engine handled an input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub titles: Vec<TitleUpdate>,
    /// Seconds until the next expiry sweep, when a timer has to be armed.
    pub arm_timer: Option<f64>,
}

#[derive(Debug)]
pub struct Engine {
    config: EmotitleConfig,
    topology: TopologySnapshot,
    history: EventHistory,
    store: DecorationStore,
    scheduler: ExpiryScheduler,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EmotitleConfig::default())
    }
}

impl Engine {
    pub fn new(config: EmotitleConfig) -> Self {
        let scheduler = ExpiryScheduler::new(config.tick_secs());
        Self {
            config,
            topology: TopologySnapshot::new(),
            history: EventHistory::default(),
            store: DecorationStore::new(),
            scheduler,
        }
    }

    pub fn apply_host_update(&mut self, update: HostUpdate, now: DateTime<Utc>) -> Effects {
        let diff = self.topology.apply_host_update(update);

        for change in &diff.tab_changes {
            self.history.record(
                change.event_type,
                change.tab_key,
                change.pane_keys.clone(),
                change.position,
                now,
            );
        }

        for key in self.store.reconcile(&diff) {
            debug!(event = "decoration_reconciled", entity = ?key);
        }

        let mut dirty = Vec::new();
        for key in diff.blurred() {
            if self.store.on_focus_changed(key, false) {
                info!(event = "focus_eviction", entity = ?key);
                dirty.push(key);
            }
        }
        for key in diff.focused() {
            self.store.on_focus_changed(key, true);
        }
        for key in &diff.renamed {
            if self.store.is_decorated(*key) && !dirty.contains(key) {
                dirty.push(*key);
            }
        }

        self.effects_for(&dirty)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Effects {
        let expired = self.scheduler.on_tick(&mut self.store, now);
        self.effects_for(&expired)
    }

    /// Handles one inbound pipe request. The response is `"ok"`, the info
    /// JSON, or a description of what went wrong.
    pub fn dispatch(
        &mut self,
        args: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> (String, Effects) {
        let result = command::parse_request(args).and_then(|request| match request {
            Request::Info => Ok((self.info_json(), Effects::default())),
            Request::Decorate(command) => self
                .decorate(&command, now)
                .map(|effects| (RESPONSE_OK.to_string(), effects)),
        });
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(event = "command_rejected", error = %err);
                (err.to_string(), Effects::default())
            }
        }
    }

    pub fn decorate(
        &mut self,
        command: &Command,
        now: DateTime<Utc>,
    ) -> Result<Effects, EmotitleError> {
        let key = command::resolve(command, &self.topology)?;
        self.store.set(key, &command.emojis, now, self.config.temp_ttl())?;
        debug!(event = "decorated", entity = ?key, emojis = %command.emojis);
        Ok(self.effects_for(&[key]))
    }

    pub fn info(&self) -> InfoDump {
        info::dump(&self.topology, &self.store, &self.history)
    }

    fn info_json(&self) -> String {
        self.info()
            .to_json()
            .unwrap_or_else(|err| format!("failed to serialize info: {err}"))
    }

    pub fn rendered_title(&self, key: EntityKey) -> Option<String> {
        let base_name = self.topology.base_name(key)?;
        Some(self.store.compose(key, base_name))
    }

    fn effects_for(&mut self, keys: &[EntityKey]) -> Effects {
        let titles = keys
            .iter()
            .filter_map(|key| self.title_update(*key))
            .collect();
        Effects {
            titles,
            arm_timer: self.scheduler.arm_if_needed(&self.store),
        }
    }

    fn title_update(&self, key: EntityKey) -> Option<TitleUpdate> {
        let title = self.rendered_title(key)?;
        match key {
            EntityKey::Pane(pane_key) => {
                let pane = self.topology.pane(pane_key)?;
                Some(TitleUpdate::Pane {
                    id: pane.host_id,
                    title,
                })
            }
            EntityKey::Tab(tab_key) => Some(TitleUpdate::Tab { key: tab_key, title }),
        }
    }

    pub fn config(&self) -> &EmotitleConfig {
        &self.config
    }

    pub fn topology(&self) -> &TopologySnapshot {
        &self.topology
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn store(&self) -> &DecorationStore {
        &self.store
    }
}
