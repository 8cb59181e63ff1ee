use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::decoration::DELIMITER;
use crate::error::EmotitleError;
use crate::history::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PaneKey(u64);

impl PaneKey {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Tabs are keyed by the order in which they were first observed, which is
/// also the host's internal tab index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TabKey(u32);

impl TabKey {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// 1-based index the host expects in a tab rename directive.
    pub fn rename_target(self) -> u32 {
        self.0 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Pane(PaneKey),
    Tab(TabKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostPaneId {
    Terminal(u32),
    Plugin(u32),
}

impl HostPaneId {
    pub fn id(self) -> u32 {
        match self {
            HostPaneId::Terminal(id) | HostPaneId::Plugin(id) => id,
        }
    }

    pub fn is_plugin(self) -> bool {
        matches!(self, HostPaneId::Plugin(_))
    }
}

impl fmt::Display for HostPaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPaneId::Terminal(id) => write!(f, "terminal_{id}"),
            HostPaneId::Plugin(id) => write!(f, "plugin_{id}"),
        }
    }
}

impl FromStr for HostPaneId {
    type Err = EmotitleError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (make, digits): (fn(u32) -> HostPaneId, &str) =
            if let Some(rest) = trimmed.strip_prefix("terminal_") {
                (HostPaneId::Terminal, rest)
            } else if let Some(rest) = trimmed.strip_prefix("plugin_") {
                (HostPaneId::Plugin, rest)
            } else {
                (HostPaneId::Terminal, trimmed)
            };
        digits
            .parse::<u32>()
            .map(make)
            .map_err(|_| EmotitleError::InvalidArg {
                key: "pane_id",
                expected: "an unsigned integer, terminal_<id> or plugin_<id>",
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTab {
    pub position: usize,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPane {
    pub id: HostPaneId,
    pub title: String,
    pub is_focused: bool,
}

/// Panes grouped by the tab position the host reported them under.
pub type HostManifest = BTreeMap<usize, Vec<HostPane>>;

/// The host reports tabs and panes separately; each report replaces the
/// previous one of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostUpdate {
    Tabs(Vec<HostTab>),
    Panes(HostManifest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    pub key: PaneKey,
    pub host_id: HostPaneId,
    pub tab: Option<TabKey>,
    pub base_name: String,
    pub is_focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub key: TabKey,
    pub position: usize,
    pub base_name: String,
    pub active: bool,
    pub panes: Vec<PaneKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabChange {
    pub event_type: EventType,
    pub tab_key: TabKey,
    pub pane_keys: Vec<PaneKey>,
    pub position: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub tab_changes: Vec<TabChange>,
    pub added_panes: Vec<PaneKey>,
    pub removed_panes: Vec<PaneKey>,
    /// Entities whose base name was changed by someone other than us.
    pub renamed: Vec<EntityKey>,
    pub previous_focused_pane: Option<PaneKey>,
    pub focused_pane: Option<PaneKey>,
    pub previous_active_tab: Option<TabKey>,
    pub active_tab: Option<TabKey>,
}

impl Diff {
    pub fn removed_tabs(&self) -> impl Iterator<Item = TabKey> + '_ {
        self.tab_changes
            .iter()
            .filter(|change| change.event_type == EventType::TabRemoved)
            .map(|change| change.tab_key)
    }

    #[cfg(test)]
    pub(crate) fn added_tabs(&self) -> impl Iterator<Item = TabKey> + '_ {
        self.tab_changes
            .iter()
            .filter(|change| change.event_type == EventType::TabAdded)
            .map(|change| change.tab_key)
    }

    pub fn removed_entities(&self) -> Vec<EntityKey> {
        self.removed_panes
            .iter()
            .copied()
            .map(EntityKey::Pane)
            .chain(self.removed_tabs().map(EntityKey::Tab))
            .collect()
    }

    /// Entities that held focus before this update and no longer do.
    pub fn blurred(&self) -> Vec<EntityKey> {
        let mut blurred = Vec::new();
        if let Some(previous) = self.previous_focused_pane {
            if self.focused_pane != Some(previous) {
                blurred.push(EntityKey::Pane(previous));
            }
        }
        if let Some(previous) = self.previous_active_tab {
            if self.active_tab != Some(previous) {
                blurred.push(EntityKey::Tab(previous));
            }
        }
        blurred
    }

    pub fn focused(&self) -> Vec<EntityKey> {
        let mut focused = Vec::new();
        if let Some(current) = self.focused_pane {
            if self.previous_focused_pane != Some(current) {
                focused.push(EntityKey::Pane(current));
            }
        }
        if let Some(current) = self.active_tab {
            if self.previous_active_tab != Some(current) {
                focused.push(EntityKey::Tab(current));
            }
        }
        focused
    }
}

/// Authoritative view of tabs and panes, rebuilt from host reports.
///
/// Entities are stored by opaque key; positions are attributes recomputed on
/// every reconcile, so anything holding a key survives reordering.
#[derive(Debug, Default)]
pub struct TopologySnapshot {
    tabs: BTreeMap<TabKey, Tab>,
    panes: BTreeMap<PaneKey, Pane>,
    pane_index: HashMap<HostPaneId, PaneKey>,
    next_pane_key: u64,
    next_tab_key: u32,
    host_tabs: Vec<HostTab>,
    host_manifest: Option<HostManifest>,
    focused_pane: Option<PaneKey>,
    active_tab: Option<TabKey>,
}

impl TopologySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_host_update(&mut self, update: HostUpdate) -> Diff {
        let mut diff = Diff {
            previous_focused_pane: self.focused_pane,
            previous_active_tab: self.active_tab,
            ..Diff::default()
        };

        match update {
            HostUpdate::Tabs(mut tabs) => {
                tabs.sort_by_key(|tab| tab.position);
                self.host_tabs = tabs;
            }
            HostUpdate::Panes(manifest) => {
                self.reconcile_panes(&manifest, &mut diff);
                self.host_manifest = Some(manifest);
            }
        }

        if self.reconcile_tabs(&mut diff) {
            self.refresh_focus();
        }

        diff.focused_pane = self.focused_pane;
        diff.active_tab = self.active_tab;
        diff
    }

    fn reconcile_panes(&mut self, manifest: &HostManifest, diff: &mut Diff) {
        let mut seen = HashSet::new();
        for host_pane in manifest.values().flatten() {
            if !seen.insert(host_pane.id) {
                continue;
            }
            match self.pane_index.get(&host_pane.id).copied() {
                Some(key) => {
                    let Some(pane) = self.panes.get_mut(&key) else {
                        continue;
                    };
                    pane.is_focused = host_pane.is_focused;
                    if !is_own_rendering(&pane.base_name, &host_pane.title) {
                        debug!(
                            event = "pane_renamed",
                            pane = %host_pane.id,
                            from = %pane.base_name,
                            to = %host_pane.title
                        );
                        pane.base_name = host_pane.title.clone();
                        diff.renamed.push(EntityKey::Pane(key));
                    }
                }
                None => {
                    let key = PaneKey::new(self.next_pane_key);
                    self.next_pane_key += 1;
                    self.pane_index.insert(host_pane.id, key);
                    self.panes.insert(
                        key,
                        Pane {
                            key,
                            host_id: host_pane.id,
                            tab: None,
                            base_name: host_pane.title.clone(),
                            is_focused: host_pane.is_focused,
                        },
                    );
                    debug!(event = "pane_added", pane = %host_pane.id, pane_key = key.0);
                    diff.added_panes.push(key);
                }
            }
        }

        let retired: Vec<HostPaneId> = self
            .pane_index
            .keys()
            .filter(|host_id| !seen.contains(*host_id))
            .copied()
            .collect();
        for host_id in retired {
            let Some(key) = self.pane_index.remove(&host_id) else {
                continue;
            };
            self.panes.remove(&key);
            if self.focused_pane == Some(key) {
                self.focused_pane = None;
            }
            debug!(event = "pane_removed", pane = %host_id, pane_key = key.0);
            diff.removed_panes.push(key);
        }
    }

    /// Returns false when the tab and pane reports disagree on the number of
    /// tabs; structure is left untouched until a consistent pair arrives.
    fn reconcile_tabs(&mut self, diff: &mut Diff) -> bool {
        let Some(manifest) = self.host_manifest.as_ref() else {
            return false;
        };
        if self.host_tabs.is_empty() || manifest.len() != self.host_tabs.len() {
            debug!(
                event = "topology_deferred",
                tabs = self.host_tabs.len(),
                manifest_tabs = manifest.len()
            );
            return false;
        }

        let manifest_positions: Vec<usize> = manifest.keys().copied().collect();
        let current: Vec<(HostTab, Vec<PaneKey>)> = self
            .host_tabs
            .iter()
            .enumerate()
            .map(|(ordinal, host_tab)| {
                let manifest_position = if manifest.contains_key(&host_tab.position) {
                    host_tab.position
                } else {
                    manifest_positions
                        .get(ordinal)
                        .copied()
                        .unwrap_or(host_tab.position)
                };
                let pane_keys = manifest
                    .get(&manifest_position)
                    .map(|panes| {
                        panes
                            .iter()
                            .filter_map(|pane| self.pane_index.get(&pane.id).copied())
                            .collect()
                    })
                    .unwrap_or_default();
                (host_tab.clone(), pane_keys)
            })
            .collect();

        let assigned = self.match_previous_tabs(&current);
        let claimed: HashSet<TabKey> = assigned.iter().flatten().copied().collect();

        let removed: Vec<TabKey> = self
            .tabs
            .keys()
            .filter(|key| !claimed.contains(*key))
            .copied()
            .collect();
        for key in removed {
            let Some(tab) = self.tabs.remove(&key) else {
                continue;
            };
            if self.active_tab == Some(key) {
                self.active_tab = None;
            }
            info!(event = "tab_removed", tab_key = key.0, position = tab.position);
            diff.tab_changes.push(TabChange {
                event_type: EventType::TabRemoved,
                tab_key: key,
                pane_keys: tab.panes,
                position: tab.position,
            });
        }

        for ((host_tab, pane_keys), previous) in current.into_iter().zip(assigned) {
            let key = match previous {
                Some(key) => key,
                None => {
                    let key = TabKey::new(self.next_tab_key);
                    self.next_tab_key += 1;
                    key
                }
            };
            for pane_key in &pane_keys {
                if let Some(pane) = self.panes.get_mut(pane_key) {
                    pane.tab = Some(key);
                }
            }

            if !self.tabs.contains_key(&key) {
                info!(
                    event = "tab_added",
                    tab_key = key.0,
                    position = host_tab.position,
                    name = %host_tab.name
                );
                diff.tab_changes.push(TabChange {
                    event_type: EventType::TabAdded,
                    tab_key: key,
                    pane_keys: pane_keys.clone(),
                    position: host_tab.position,
                });
                self.tabs.insert(
                    key,
                    Tab {
                        key,
                        position: host_tab.position,
                        base_name: host_tab.name,
                        active: host_tab.active,
                        panes: pane_keys,
                    },
                );
                continue;
            }
            let stale = self.names_other_tab(key, &host_tab.name);
            let Some(tab) = self.tabs.get_mut(&key) else {
                continue;
            };

            if stale {
                debug!(event = "tab_report_stale", tab_key = key.0, name = %host_tab.name);
            } else {
                tab.active = host_tab.active;
            }
            if tab.position != host_tab.position || tab.panes != pane_keys {
                debug!(
                    event = "tab_key_updated",
                    tab_key = key.0,
                    from = tab.position,
                    to = host_tab.position
                );
                tab.position = host_tab.position;
                tab.panes = pane_keys.clone();
                diff.tab_changes.push(TabChange {
                    event_type: EventType::TabKeyUpdated,
                    tab_key: key,
                    pane_keys: pane_keys.clone(),
                    position: host_tab.position,
                });
            }
            if !stale && !is_own_rendering(&tab.base_name, &host_tab.name) {
                debug!(
                    event = "tab_renamed",
                    tab_key = key.0,
                    from = %tab.base_name,
                    to = %host_tab.name
                );
                tab.base_name = host_tab.name;
                diff.renamed.push(EntityKey::Tab(key));
                diff.tab_changes.push(TabChange {
                    event_type: EventType::TabRenamed,
                    tab_key: key,
                    pane_keys,
                    position: host_tab.position,
                });
            }
        }

        true
    }

    /// Pairs each reported tab with the previous tab sharing the most panes.
    fn match_previous_tabs(&self, current: &[(HostTab, Vec<PaneKey>)]) -> Vec<Option<TabKey>> {
        let mut pairs: Vec<(usize, usize, TabKey)> = Vec::new();
        for (idx, (_, pane_keys)) in current.iter().enumerate() {
            let members: HashSet<&PaneKey> = pane_keys.iter().collect();
            for tab in self.tabs.values() {
                let overlap = tab.panes.iter().filter(|key| members.contains(key)).count();
                if overlap > 0 {
                    pairs.push((overlap, idx, tab.key));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut assigned: Vec<Option<TabKey>> = vec![None; current.len()];
        let mut claimed = HashSet::new();
        for (_, idx, key) in pairs {
            if assigned[idx].is_none() && !claimed.contains(&key) {
                assigned[idx] = Some(key);
                claimed.insert(key);
            }
        }

        // Tabs the manifest lists without panes can only be matched by position.
        for (idx, (host_tab, pane_keys)) in current.iter().enumerate() {
            if assigned[idx].is_some() || !pane_keys.is_empty() {
                continue;
            }
            let fallback = self.tabs.values().find(|tab| {
                tab.position == host_tab.position
                    && !claimed.contains(&tab.key)
                    && tab.panes.iter().all(|key| !self.panes.contains_key(key))
            });
            if let Some(tab) = fallback {
                assigned[idx] = Some(tab.key);
                claimed.insert(tab.key);
            }
        }

        assigned
    }

    /// A reported name that renders another tab rather than `key` means the
    /// tab and pane reports were paired across a reorder.
    fn names_other_tab(&self, key: TabKey, reported: &str) -> bool {
        let Some(tab) = self.tabs.get(&key) else {
            return false;
        };
        !is_own_rendering(&tab.base_name, reported)
            && self
                .tabs
                .values()
                .any(|other| other.key != key && is_own_rendering(&other.base_name, reported))
    }

    fn refresh_focus(&mut self) {
        self.active_tab = self.tabs.values().find(|tab| tab.active).map(|tab| tab.key);
        self.focused_pane = match self.active_tab.and_then(|key| self.tabs.get(&key)) {
            Some(tab) => self.focused_among(tab.panes.iter()),
            None => self.focused_among(self.panes.keys()),
        };
    }

    fn focused_among<'a>(&self, keys: impl Iterator<Item = &'a PaneKey>) -> Option<PaneKey> {
        let focused: Vec<&Pane> = keys
            .filter_map(|key| self.panes.get(key))
            .filter(|pane| pane.is_focused)
            .collect();
        focused
            .iter()
            .find(|pane| !pane.host_id.is_plugin())
            .or_else(|| focused.first())
            .map(|pane| pane.key)
    }

    pub fn pane(&self, key: PaneKey) -> Option<&Pane> {
        self.panes.get(&key)
    }

    pub fn tab(&self, key: TabKey) -> Option<&Tab> {
        self.tabs.get(&key)
    }

    pub fn pane_key(&self, host_id: HostPaneId) -> Option<PaneKey> {
        self.pane_index.get(&host_id).copied()
    }

    pub fn tab_at_position(&self, position: usize) -> Option<&Tab> {
        self.tabs.values().find(|tab| tab.position == position)
    }

    pub fn tab_of_pane(&self, key: PaneKey) -> Option<TabKey> {
        let pane = self.panes.get(&key)?;
        if let Some(tab) = pane.tab.filter(|tab| self.tabs.contains_key(tab)) {
            return Some(tab);
        }
        // Panes that arrived while the reports disagreed have no owner yet.
        let manifest = self.host_manifest.as_ref()?;
        let position = manifest.iter().find_map(|(position, panes)| {
            panes
                .iter()
                .any(|candidate| candidate.id == pane.host_id)
                .then_some(*position)
        })?;
        self.tab_at_position(position).map(|tab| tab.key)
    }

    pub fn focused_pane(&self) -> Option<PaneKey> {
        self.focused_pane
    }

    pub fn active_tab(&self) -> Option<TabKey> {
        self.active_tab
    }

    pub fn tabs_by_position(&self) -> Vec<&Tab> {
        let mut tabs: Vec<&Tab> = self.tabs.values().collect();
        tabs.sort_by_key(|tab| tab.position);
        tabs
    }

    pub fn panes_of(&self, tab: &Tab) -> Vec<&Pane> {
        tab.panes
            .iter()
            .filter_map(|key| self.panes.get(key))
            .collect()
    }

    pub fn base_name(&self, key: EntityKey) -> Option<&str> {
        match key {
            EntityKey::Pane(key) => self.panes.get(&key).map(|pane| pane.base_name.as_str()),
            EntityKey::Tab(key) => self.tabs.get(&key).map(|tab| tab.base_name.as_str()),
        }
    }

    #[cfg(test)]
    pub(crate) fn tab_count(&self) -> usize {
        self.tabs.len()
    }
}

/// A reported name that is the base name, or the base name followed by our
/// delimiter, is something we rendered ourselves rather than a rename.
fn is_own_rendering(base_name: &str, reported: &str) -> bool {
    reported == base_name
        || reported
            .strip_prefix(base_name)
            .is_some_and(|rest| rest.starts_with(DELIMITER))
}
