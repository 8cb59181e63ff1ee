use chrono::{DateTime, Duration, TimeZone, Utc};
use emotitle_core::{
    Effects, Engine, EventType, HostManifest, HostPane, HostPaneId, HostTab, HostUpdate,
    TitleUpdate, HISTORY_CAPACITY,
};
use std::collections::BTreeMap;

struct FakePane {
    id: u32,
    title: String,
}

struct FakeTab {
    internal: u32,
    name: String,
    panes: Vec<FakePane>,
    focused: usize,
}

/// Minimal stand-in for the multiplexer: keeps its own layout, reports it to
/// the engine after every action and applies the renames it gets back.
struct FakeHost {
    engine: Engine,
    now: DateTime<Utc>,
    timer_due: Option<DateTime<Utc>>,
    tabs: Vec<FakeTab>,
    active: usize,
    next_pane: u32,
    next_internal: u32,
}

impl FakeHost {
    fn new() -> Self {
        let mut host = Self {
            engine: Engine::default(),
            now: Utc
                .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
            timer_due: None,
            tabs: Vec::new(),
            active: 0,
            next_pane: 0,
            next_internal: 1,
        };
        host.new_tab("Tab #1");
        host
    }

    fn sync(&mut self) {
        let tabs = self
            .tabs
            .iter()
            .enumerate()
            .map(|(position, tab)| HostTab {
                position,
                name: tab.name.clone(),
                active: position == self.active,
            })
            .collect();
        let effects = self.engine.apply_host_update(HostUpdate::Tabs(tabs), self.now);
        self.apply(effects);

        let manifest: HostManifest = self
            .tabs
            .iter()
            .enumerate()
            .map(|(position, tab)| {
                let panes = tab
                    .panes
                    .iter()
                    .enumerate()
                    .map(|(idx, pane)| HostPane {
                        id: HostPaneId::Terminal(pane.id),
                        title: pane.title.clone(),
                        is_focused: idx == tab.focused,
                    })
                    .collect();
                (position, panes)
            })
            .collect();
        let effects = self.engine.apply_host_update(HostUpdate::Panes(manifest), self.now);
        self.apply(effects);
    }

    fn apply(&mut self, effects: Effects) {
        for update in effects.titles {
            match update {
                TitleUpdate::Pane { id, title } => {
                    if let Some(pane) = self
                        .tabs
                        .iter_mut()
                        .flat_map(|tab| tab.panes.iter_mut())
                        .find(|pane| HostPaneId::Terminal(pane.id) == id)
                    {
                        pane.title = title;
                    }
                }
                TitleUpdate::Tab { key, title } => {
                    if let Some(tab) = self
                        .tabs
                        .iter_mut()
                        .find(|tab| tab.internal == key.rename_target())
                    {
                        tab.name = title;
                    }
                }
            }
        }
        if let Some(delay) = effects.arm_timer {
            let delay = Duration::milliseconds((delay * 1_000.0).round() as i64);
            self.timer_due = Some(self.now + delay);
        }
    }

    fn advance(&mut self, ms: i64) {
        let target = self.now + Duration::milliseconds(ms);
        while let Some(due) = self.timer_due.filter(|due| *due <= target) {
            self.now = due;
            self.timer_due = None;
            let effects = self.engine.tick(self.now);
            self.apply(effects);
            self.sync();
        }
        self.now = target;
    }

    fn pipe(&mut self, pairs: &[(&str, &str)]) -> String {
        let args: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let (response, effects) = self.engine.dispatch(&args, self.now);
        self.apply(effects);
        self.sync();
        response
    }

    fn new_tab(&mut self, name: &str) -> usize {
        let pane = self.spawn_pane();
        self.tabs.push(FakeTab {
            internal: self.next_internal,
            name: name.to_string(),
            panes: vec![pane],
            focused: 0,
        });
        self.next_internal += 1;
        self.active = self.tabs.len() - 1;
        self.sync();
        self.active
    }

    fn new_pane(&mut self) -> u32 {
        let pane = self.spawn_pane();
        let id = pane.id;
        let tab = &mut self.tabs[self.active];
        tab.panes.push(pane);
        tab.focused = tab.panes.len() - 1;
        self.sync();
        id
    }

    fn close_focused_pane(&mut self) {
        let tab = &mut self.tabs[self.active];
        tab.panes.remove(tab.focused);
        tab.focused = tab.focused.saturating_sub(1);
        if tab.panes.is_empty() {
            self.tabs.remove(self.active);
            self.active = self.active.saturating_sub(1);
        }
        self.sync();
    }

    fn close_tab(&mut self, position: usize) {
        self.tabs.remove(position);
        if self.active >= position && self.active > 0 {
            self.active -= 1;
        }
        self.sync();
    }

    fn move_tab(&mut self, from: usize, to: usize) {
        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
        self.active = to;
        self.sync();
    }

    fn rename_tab(&mut self, position: usize, name: &str) {
        self.tabs[position].name = name.to_string();
        self.sync();
    }

    fn focus_pane(&mut self, idx: usize) {
        self.tabs[self.active].focused = idx;
        self.sync();
    }

    fn focus_tab(&mut self, position: usize) {
        self.active = position;
        self.sync();
    }

    fn spawn_pane(&mut self) -> FakePane {
        let id = self.next_pane;
        self.next_pane += 1;
        FakePane {
            id,
            title: format!("Pane #{}", id + 1),
        }
    }

    fn pane_title(&self, id: u32) -> &str {
        self.tabs
            .iter()
            .flat_map(|tab| tab.panes.iter())
            .find(|pane| pane.id == id)
            .map(|pane| pane.title.as_str())
            .expect("pane exists")
    }

    fn tab_names(&self) -> Vec<&str> {
        self.tabs.iter().map(|tab| tab.name.as_str()).collect()
    }
}

#[test]
fn temporary_segment_disappears_after_expiry() {
    let mut host = FakeHost::new();
    assert_eq!(host.pipe(&[("target", "pane"), ("emojis", "📚")]), "ok");
    assert!(host.pane_title(0).contains("📚"));

    host.advance(900);
    assert!(host.pane_title(0).contains("📚"));
    host.advance(200);
    assert_eq!(host.pane_title(0), "Pane #1");
}

#[test]
fn pinned_survives_new_pane_and_refocus_without_extra_segments() {
    let mut host = FakeHost::new();
    assert_eq!(host.pipe(&[("target", "pane"), ("emojis", "📌🚀")]), "ok");
    assert!(host.pane_title(0).contains("📌🚀"));

    host.new_pane();
    host.focus_pane(0);
    host.advance(1_000);
    assert_eq!(host.pane_title(0), "Pane #1 | 📌🚀");
}

#[test]
fn refocus_keeps_only_pinned_segments() {
    let mut host = FakeHost::new();
    host.new_pane();
    host.focus_pane(0);
    assert_eq!(host.pipe(&[("emojis", "📌🚀 | 📚 | 🚗")]), "ok");
    assert_eq!(host.pane_title(0), "Pane #1 | 📌🚀 | 📚 | 🚗");

    host.focus_pane(1);
    host.focus_pane(0);
    let title = host.pane_title(0);
    assert!(title.contains("📌🚀"));
    assert!(!title.contains("📚"));
    assert!(!title.contains("🚗"));
}

#[test]
fn tab_switch_drops_temporary_tab_segments() {
    let mut host = FakeHost::new();
    host.rename_tab(0, "A");
    host.new_tab("B");
    host.focus_tab(0);
    assert_eq!(
        host.pipe(&[("target", "tab"), ("emojis", "📌🚀 | 📚")]),
        "ok"
    );
    assert_eq!(host.tab_names(), vec!["A | 📌🚀 | 📚", "B"]);

    host.focus_tab(1);
    assert_eq!(host.tab_names(), vec!["A | 📌🚀", "B"]);

    host.focus_tab(0);
    host.advance(2_000);
    assert_eq!(host.tab_names(), vec!["A | 📌🚀", "B"]);
}

#[test]
fn closing_decorated_pane_leaves_nothing_to_resurrect() {
    let mut host = FakeHost::new();
    host.new_pane();
    assert_eq!(host.pipe(&[("emojis", "📌🚀 | 📚")]), "ok");
    assert_eq!(host.pane_title(1), "Pane #2 | 📌🚀 | 📚");

    host.close_focused_pane();
    assert!(!host.engine.store().has_temporary());

    host.advance(1_500);
    host.focus_pane(0);
    let info = host.engine.info();
    assert!(info
        .tabs
        .iter()
        .flat_map(|tab| tab.panes.iter())
        .all(|pane| pane.title == pane.base_title));
    assert_eq!(host.pane_title(0), "Pane #1");
}

#[test]
fn pinned_persists_across_other_closures_reorders_and_focus() {
    let mut host = FakeHost::new();
    let other = host.new_pane();
    assert_eq!(host.pipe(&[("pane_id", "0"), ("emojis", "📌🎉")]), "ok");
    assert_eq!(
        host.pipe(&[("target", "tab"), ("pane_id", "0"), ("emojis", "📌🚀")]),
        "ok"
    );

    host.close_focused_pane();
    assert!(host.pane_title(0).contains("📌🎉"));
    let closed = other.to_string();
    assert_ne!(host.pipe(&[("pane_id", closed.as_str()), ("emojis", "✅")]), "ok");

    host.new_tab("second");
    host.move_tab(1, 0);
    host.focus_tab(1);
    host.focus_tab(0);
    host.advance(2_000);

    assert_eq!(host.pane_title(0), "Pane #1 | 📌🎉");
    assert_eq!(host.tab_names(), vec!["second", "Tab #1 | 📌🚀"]);
}

#[test]
fn repeated_sets_keep_pinned_history_and_latest_temporaries() {
    let mut host = FakeHost::new();
    host.pipe(&[("emojis", "📌🚀 | 📚")]);
    host.pipe(&[("emojis", "🚗 | 📌🎉")]);
    host.pipe(&[("emojis", "✅")]);
    assert_eq!(host.pane_title(0), "Pane #1 | 📌🚀 | 📌🎉 | ✅");

    host.advance(1_000);
    assert_eq!(host.pane_title(0), "Pane #1 | 📌🚀 | 📌🎉");
}

#[test]
fn recreated_pane_at_same_position_starts_undecorated() {
    let mut host = FakeHost::new();
    host.new_pane();
    host.pipe(&[("emojis", "📌🚀")]);
    host.close_focused_pane();

    let fresh = host.new_pane();
    assert!(!host.pane_title(fresh).contains("📌🚀"));

    host.new_tab("doomed");
    host.pipe(&[("target", "tab"), ("emojis", "📌🔥")]);
    host.close_tab(1);
    host.new_tab("replacement");
    assert_eq!(host.tab_names(), vec!["Tab #1", "replacement"]);
}

#[test]
fn tab_decoration_follows_tab_after_earlier_tab_closes() {
    let mut host = FakeHost::new();
    host.rename_tab(0, "TAB_A");
    host.new_tab("TAB_B");
    let tab_c = host.new_tab("TAB_C");
    assert_eq!(tab_c, 2);
    let pane_in_c = host.tabs[2].panes[0].id.to_string();

    host.close_tab(1);
    host.focus_tab(0);
    assert_eq!(
        host.pipe(&[
            ("target", "tab"),
            ("pane_id", pane_in_c.as_str()),
            ("emojis", "📚"),
        ]),
        "ok"
    );
    assert_eq!(host.tab_names(), vec!["TAB_A", "TAB_C | 📚"]);

    host.advance(1_300);
    assert_eq!(host.tab_names(), vec!["TAB_A", "TAB_C"]);
}

#[test]
fn tab_index_resolves_against_current_positions() {
    let mut host = FakeHost::new();
    host.new_tab("B");
    host.new_tab("C");
    host.close_tab(0);
    assert_eq!(
        host.pipe(&[("target", "tab"), ("tab_index", "0"), ("emojis", "📌✅")]),
        "ok"
    );
    assert_eq!(host.tab_names(), vec!["B | 📌✅", "C"]);
    assert!(host
        .pipe(&[("target", "tab"), ("tab_index", "2"), ("emojis", "📌✅")])
        .starts_with("could not resolve tab_index=2"));
}

#[test]
fn history_stays_bounded_through_pane_churn() {
    let mut host = FakeHost::new();
    for _ in 0..50 {
        host.new_pane();
        host.close_focused_pane();
    }
    host.new_tab("extra");
    host.close_tab(1);

    let info = host.engine.info();
    assert!(info.event_history.len() <= HISTORY_CAPACITY);
    assert!(info
        .event_history
        .windows(2)
        .all(|pair| pair[0].seq < pair[1].seq));
    assert!(info
        .event_history
        .iter()
        .any(|entry| entry.event_type == EventType::TabKeyUpdated));
    assert!(info
        .event_history
        .iter()
        .any(|entry| entry.event_type == EventType::TabRemoved));

    for _ in 0..60 {
        host.new_pane();
        host.close_focused_pane();
    }
    let history = host.engine.history().dump();
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert!(history.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    assert!(history.first().map(|entry| entry.seq).unwrap_or_default() > 1);
}

#[test]
fn info_pipe_reports_layout_and_history() {
    let mut host = FakeHost::new();
    host.new_tab("second");
    let response = host.pipe(&[("info", "true")]);
    let info: serde_json::Value = serde_json::from_str(&response).expect("info json");

    assert_eq!(info["tabs"].as_array().map(Vec::len), Some(2));
    assert_eq!(info["tabs"][1]["name"], "second");
    assert_eq!(info["tabs"][1]["active"], true);
    assert_eq!(info["focused_tab_index"], 1);
    assert_eq!(info["focused_pane"], "terminal_1");
    let added = info["event_history"]
        .as_array()
        .expect("history array")
        .iter()
        .filter(|entry| entry["event_type"] == "TabAdded")
        .count();
    assert_eq!(added, 2);
}
