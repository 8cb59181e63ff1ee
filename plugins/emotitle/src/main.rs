mod host;

use std::collections::BTreeMap;

use chrono::Utc;
use emotitle_core::{Effects, EmotitleConfig, Engine};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use zellij_tile::prelude::*;

register_plugin!(PluginState);

#[derive(Default)]
struct PluginState {
    engine: Engine,
}

impl ZellijPlugin for PluginState {
    fn load(&mut self, configuration: BTreeMap<String, String>) {
        let config = EmotitleConfig::from_btreemap(&configuration);
        init_logging(&config.log_level);
        info!(event = "plugin_loaded", pipe = %config.pipe_name, tick_ms = config.tick_ms);
        self.engine = Engine::new(config);

        request_permission(&[
            PermissionType::ReadApplicationState,
            PermissionType::ChangeApplicationState,
            PermissionType::ReadCliPipes,
        ]);
        subscribe(&[
            EventType::PaneUpdate,
            EventType::TabUpdate,
            EventType::Timer,
            EventType::PermissionRequestResult,
        ]);
        set_selectable(false);
    }

    fn update(&mut self, event: Event) -> bool {
        let now = Utc::now();
        let effects = match event {
            Event::TabUpdate(tabs) => self.engine.apply_host_update(host::tabs_update(tabs), now),
            Event::PaneUpdate(manifest) => {
                self.engine.apply_host_update(host::panes_update(manifest), now)
            }
            Event::Timer(_) => self.engine.tick(now),
            Event::PermissionRequestResult(PermissionStatus::Denied) => {
                warn!(event = "permission_denied");
                return false;
            }
            _ => return false,
        };
        apply(effects);
        false
    }

    fn pipe(&mut self, pipe_message: PipeMessage) -> bool {
        if pipe_message.name != self.engine.config().pipe_name {
            return false;
        }
        let (response, effects) = self.engine.dispatch(&pipe_message.args, Utc::now());
        apply(effects);
        cli_pipe_output(&pipe_message.name, &response);
        false
    }

    fn render(&mut self, _rows: usize, _cols: usize) {}
}

fn apply(effects: Effects) {
    for update in effects.titles {
        debug!(event = "title_pushed", title = %update.title());
        host::apply_title(update);
    }
    if let Some(secs) = effects.arm_timer {
        set_timeout(secs);
    }
}

fn init_logging(level: &str) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
    if let Err(err) = result {
        eprintln!("log_init_error: {err}");
    }
}
