use emotitle_core::{HostManifest, HostPane, HostPaneId, HostTab, HostUpdate, TitleUpdate};
use zellij_tile::prelude::*;

pub fn tabs_update(tabs: Vec<TabInfo>) -> HostUpdate {
    HostUpdate::Tabs(
        tabs.into_iter()
            .map(|tab| HostTab {
                position: tab.position,
                name: tab.name,
                active: tab.active,
            })
            .collect(),
    )
}

pub fn panes_update(manifest: PaneManifest) -> HostUpdate {
    let panes: HostManifest = manifest
        .panes
        .into_iter()
        .map(|(position, panes)| {
            let panes = panes
                .into_iter()
                .map(|pane| HostPane {
                    id: if pane.is_plugin {
                        HostPaneId::Plugin(pane.id)
                    } else {
                        HostPaneId::Terminal(pane.id)
                    },
                    title: pane.title,
                    is_focused: pane.is_focused,
                })
                .collect();
            (position, panes)
        })
        .collect();
    HostUpdate::Panes(panes)
}

pub fn apply_title(update: TitleUpdate) {
    match update {
        TitleUpdate::Pane {
            id: HostPaneId::Terminal(id),
            title,
        } => rename_terminal_pane(id, title),
        TitleUpdate::Pane {
            id: HostPaneId::Plugin(id),
            title,
        } => rename_plugin_pane(id, title),
        TitleUpdate::Tab { key, title } => rename_tab(key.rename_target(), title),
    }
}
