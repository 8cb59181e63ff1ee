//! Emoji title decorations for multiplexer panes and tabs.
//!
//! The host feeds topology reports, timer ticks and pipe requests into an
//! [`Engine`]; every call returns the renames to apply and whether the sweep
//! timer needs arming. Nothing here talks to the host directly.

pub mod command;
pub mod config;
pub mod decoration;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod history;
pub mod info;
pub mod topology;

pub use config::EmotitleConfig;
pub use decoration::{DELIMITER, PIN_MARKER};
pub use engine::{Effects, Engine, TitleUpdate, RESPONSE_OK};
pub use error::EmotitleError;
pub use history::{EventLogEntry, EventType, HISTORY_CAPACITY};
pub use topology::{
    EntityKey, HostManifest, HostPane, HostPaneId, HostTab, HostUpdate, PaneKey, TabKey,
};
