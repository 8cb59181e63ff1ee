use std::collections::BTreeMap;

use crate::error::EmotitleError;
use crate::topology::{EntityKey, HostPaneId, TopologySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Pane,
    Tab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    PaneId(HostPaneId),
    /// Resolved against whichever tab holds the position at dispatch time.
    TabIndex(usize),
    Focused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub target: Target,
    pub selector: Selector,
    pub emojis: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Info,
    Decorate(Command),
}

pub fn parse_request(args: &BTreeMap<String, String>) -> Result<Request, EmotitleError> {
    if args.get("info").map(|v| v.trim()) == Some("true") {
        return Ok(Request::Info);
    }
    parse_args(args).map(Request::Decorate)
}

pub fn parse_args(args: &BTreeMap<String, String>) -> Result<Command, EmotitleError> {
    let target = match args.get("target").map(|t| t.trim()).unwrap_or("pane") {
        "pane" => Target::Pane,
        "tab" => Target::Tab,
        other => return Err(EmotitleError::UnsupportedTarget(other.to_string())),
    };

    // Kept untrimmed so dangling delimiters still reach the segment parser.
    let emojis = args
        .get("emojis")
        .ok_or(EmotitleError::MissingArg("emojis"))?
        .clone();
    if emojis.trim().is_empty() {
        return Err(EmotitleError::EmptyEmojis);
    }

    let pane_id = args
        .get("pane_id")
        .map(|v| v.parse::<HostPaneId>())
        .transpose()?;
    let tab_index = parse_optional_usize(args.get("tab_index"), "tab_index")?;
    if target == Target::Pane && tab_index.is_some() {
        return Err(EmotitleError::TabIndexWithPaneTarget);
    }

    let selector = match (pane_id, tab_index) {
        (Some(pane_id), _) => Selector::PaneId(pane_id),
        (None, Some(tab_index)) => Selector::TabIndex(tab_index),
        (None, None) => Selector::Focused,
    };

    Ok(Command {
        target,
        selector,
        emojis,
    })
}

/// Maps a command onto the entity it decorates in the current topology.
pub fn resolve(
    command: &Command,
    topology: &TopologySnapshot,
) -> Result<EntityKey, EmotitleError> {
    match (command.target, command.selector) {
        (Target::Pane, Selector::PaneId(pane_id)) => topology
            .pane_key(pane_id)
            .map(EntityKey::Pane)
            .ok_or_else(|| EmotitleError::UnknownPane(pane_id.to_string())),
        (Target::Pane, Selector::Focused) => topology
            .focused_pane()
            .map(EntityKey::Pane)
            .ok_or(EmotitleError::NoFocusedPane),
        (Target::Pane, Selector::TabIndex(_)) => Err(EmotitleError::TabIndexWithPaneTarget),
        (Target::Tab, Selector::PaneId(pane_id)) => {
            let pane_key = topology
                .pane_key(pane_id)
                .ok_or_else(|| EmotitleError::UnknownPane(pane_id.to_string()))?;
            topology
                .tab_of_pane(pane_key)
                .map(EntityKey::Tab)
                .ok_or_else(|| EmotitleError::UnknownTabForPane(pane_id.to_string()))
        }
        (Target::Tab, Selector::TabIndex(tab_index)) => topology
            .tab_at_position(tab_index)
            .map(|tab| EntityKey::Tab(tab.key))
            .ok_or(EmotitleError::UnknownTab(tab_index)),
        (Target::Tab, Selector::Focused) => topology
            .active_tab()
            .map(EntityKey::Tab)
            .ok_or(EmotitleError::NoFocusedTab),
    }
}

fn parse_optional_usize(
    value: Option<&String>,
    key: &'static str,
) -> Result<Option<usize>, EmotitleError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| EmotitleError::InvalidArg {
                key,
                expected: "an unsigned integer",
            }),
    }
}
