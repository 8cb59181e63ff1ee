use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmotitleError {
    #[error("missing required arg: {0}")]
    MissingArg(&'static str),
    #[error("{key} must be {expected}")]
    InvalidArg {
        key: &'static str,
        expected: &'static str,
    },
    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),
    #[error("tab_index is not allowed when target=pane")]
    TabIndexWithPaneTarget,
    #[error("emojis must not be empty")]
    EmptyEmojis,
    #[error("malformed emojis: empty segment at position {position}")]
    MalformedEmojis { position: usize },
    #[error("could not resolve pane_id={0}; ensure plugin received PaneUpdate")]
    UnknownPane(String),
    #[error("could not resolve tab_index={0}; ensure plugin received TabUpdate")]
    UnknownTab(usize),
    #[error("could not resolve tab from pane_id={0}; ensure plugin received PaneUpdate")]
    UnknownTabForPane(String),
    #[error("could not resolve focused pane; ensure plugin received PaneUpdate")]
    NoFocusedPane,
    #[error("could not resolve focused tab; ensure plugin received TabUpdate")]
    NoFocusedTab,
}
