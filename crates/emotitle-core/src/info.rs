use serde::Serialize;

use crate::decoration::DecorationStore;
use crate::history::{EventHistory, EventLogEntry};
use crate::topology::{EntityKey, PaneKey, TabKey, TopologySnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneInfo {
    pub id: u32,
    pub is_plugin: bool,
    pub key: PaneKey,
    pub is_focused: bool,
    pub title: String,
    pub base_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabInfo {
    pub key: TabKey,
    pub position: usize,
    pub name: String,
    pub base_name: String,
    pub active: bool,
    pub panes: Vec<PaneInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoDump {
    pub tabs: Vec<TabInfo>,
    pub focused_tab_index: Option<usize>,
    pub focused_pane: Option<String>,
    pub event_history: Vec<EventLogEntry>,
}

impl InfoDump {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn dump(
    topology: &TopologySnapshot,
    store: &DecorationStore,
    history: &EventHistory,
) -> InfoDump {
    let tabs = topology
        .tabs_by_position()
        .into_iter()
        .map(|tab| TabInfo {
            key: tab.key,
            position: tab.position,
            name: store.compose(EntityKey::Tab(tab.key), &tab.base_name),
            base_name: tab.base_name.clone(),
            active: tab.active,
            panes: topology
                .panes_of(tab)
                .into_iter()
                .map(|pane| PaneInfo {
                    id: pane.host_id.id(),
                    is_plugin: pane.host_id.is_plugin(),
                    key: pane.key,
                    is_focused: pane.is_focused,
                    title: store.compose(EntityKey::Pane(pane.key), &pane.base_name),
                    base_title: pane.base_name.clone(),
                })
                .collect(),
        })
        .collect();

    InfoDump {
        tabs,
        focused_tab_index: topology
            .active_tab()
            .and_then(|key| topology.tab(key))
            .map(|tab| tab.position),
        focused_pane: topology
            .focused_pane()
            .and_then(|key| topology.pane(key))
            .map(|pane| pane.host_id.to_string()),
        event_history: history.dump(),
    }
}
