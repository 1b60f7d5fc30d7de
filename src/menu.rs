//! Projects a [`ResourceModel`] into a toolkit-independent menu
//!
//! Layout, top to bottom:
//! 1. "Disconnect All" when anything is connected
//! 2. Active servers, for quick ssh access
//! 3. One collapsible group per section, entries active-first

use crate::dispatcher::Action;
use crate::model::{Entry, ResourceModel, Section};
use serde::Serialize;
use std::fmt;

pub const DISCONNECT_ALL_ICON: &str = "action-unavailable-symbolic";
pub const QUICK_ACCESS_ICON: &str = "utilities-terminal-symbolic";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MenuItem {
    /// Plain clickable item
    Button {
        label: String,
        icon: &'static str,
        action: Action,
    },
    /// Collapsible submenu for one section
    Group {
        title: String,
        icon: &'static str,
        entries: Vec<MenuEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MenuEntry {
    /// Website: activating opens the url
    Link { label: String, action: Action },
    /// Server or datasource switch reflecting the connection state
    Toggle { label: String, on: bool },
}

impl MenuEntry {
    fn from_entry(entry: &Entry) -> Self {
        match entry {
            Entry::Website { name, .. } => MenuEntry::Link {
                label: name.clone(),
                action: Action::Open(entry.open_url().unwrap_or_default()),
            },
            Entry::Resource { name, active } => MenuEntry::Toggle {
                label: name.clone(),
                on: *active,
            },
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MenuEntry::Link { label, .. } | MenuEntry::Toggle { label, .. } => label,
        }
    }

    /// Action for a switch flipped to `value`; links ignore the value.
    pub fn toggled(&self, value: bool) -> Action {
        match self {
            MenuEntry::Link { action, .. } => action.clone(),
            MenuEntry::Toggle { label, .. } if value => Action::Connect(label.clone()),
            MenuEntry::Toggle { label, .. } => Action::Disconnect(label.clone()),
        }
    }
}

pub fn disconnect_all_label(active: usize) -> String {
    format!("Disconnect All ({active} connected)")
}

/// Build the full menu. Same model in, same menu out.
pub fn render(model: &ResourceModel) -> Menu {
    let mut items = Vec::new();

    let active = model.active_count();
    if active > 0 {
        items.push(MenuItem::Button {
            label: disconnect_all_label(active),
            icon: DISCONNECT_ALL_ICON,
            action: Action::DisconnectAll,
        });
    }

    for server in model.active_servers() {
        items.push(MenuItem::Button {
            label: server.name().to_string(),
            icon: QUICK_ACCESS_ICON,
            action: Action::Connect(server.name().to_string()),
        });
    }

    items.extend(model.sections.iter().map(render_section));
    Menu { items }
}

fn render_section(section: &Section) -> MenuItem {
    MenuItem::Group {
        title: section.display_name.clone(),
        icon: section.kind.icon(),
        entries: section
            .sorted_entries()
            .into_iter()
            .map(MenuEntry::from_entry)
            .collect(),
    }
}

impl Menu {
    /// Find an entry by label inside any group.
    pub fn entry(&self, label: &str) -> Option<&MenuEntry> {
        self.items.iter().find_map(|item| match item {
            MenuItem::Group { entries, .. } => entries.iter().find(|e| e.label() == label),
            MenuItem::Button { .. } => None,
        })
    }
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return writeln!(f, "(no resources)");
        }
        for item in &self.items {
            match item {
                MenuItem::Button { label, action, .. } => match action {
                    Action::DisconnectAll => writeln!(f, "[x] {label}")?,
                    _ => writeln!(f, " >  {label}")?,
                },
                MenuItem::Group { title, entries, .. } => {
                    writeln!(f, "{title}")?;
                    for entry in entries {
                        match entry {
                            MenuEntry::Toggle { label, on: true } => writeln!(f, "    [on ] {label}")?,
                            MenuEntry::Toggle { label, on: false } => writeln!(f, "    [off] {label}")?,
                            MenuEntry::Link { label, action } => match action {
                                Action::Open(url) => writeln!(f, "    {label} <{url}>")?,
                                _ => writeln!(f, "    {label}")?,
                            },
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionKind;
    use pretty_assertions::assert_eq;

    fn sample_model() -> ResourceModel {
        let mut servers = Section::new(SectionKind::Server);
        servers.entries = vec![
            Entry::resource("db-admin", false),
            Entry::resource("web-2", true),
            Entry::resource("web-1", true),
        ];
        let mut datasources = Section::new(SectionKind::Datasource);
        datasources.entries = vec![Entry::resource("pg-prod", true)];
        let mut websites = Section::new(SectionKind::Website);
        websites.entries = vec![Entry::website("Wiki", "s://wiki.example.com")];
        ResourceModel::new(vec![servers, datasources, websites])
    }

    #[test]
    fn test_render_layout() {
        let menu = render(&sample_model());

        let expected = vec![
            MenuItem::Button {
                label: "Disconnect All (3 connected)".to_string(),
                icon: DISCONNECT_ALL_ICON,
                action: Action::DisconnectAll,
            },
            MenuItem::Button {
                label: "web-1".to_string(),
                icon: QUICK_ACCESS_ICON,
                action: Action::Connect("web-1".to_string()),
            },
            MenuItem::Button {
                label: "web-2".to_string(),
                icon: QUICK_ACCESS_ICON,
                action: Action::Connect("web-2".to_string()),
            },
            MenuItem::Group {
                title: "Servers (ssh)".to_string(),
                icon: "utilities-terminal-symbolic",
                entries: vec![
                    MenuEntry::Toggle { label: "web-1".to_string(), on: true },
                    MenuEntry::Toggle { label: "web-2".to_string(), on: true },
                    MenuEntry::Toggle { label: "db-admin".to_string(), on: false },
                ],
            },
            MenuItem::Group {
                title: "Datasources".to_string(),
                icon: "media-floppy-symbolic",
                entries: vec![MenuEntry::Toggle { label: "pg-prod".to_string(), on: true }],
            },
            MenuItem::Group {
                title: "Websites".to_string(),
                icon: "video-display-symbolic",
                entries: vec![MenuEntry::Link {
                    label: "Wiki".to_string(),
                    action: Action::Open("https://wiki.example.com".to_string()),
                }],
            },
        ];
        assert_eq!(menu.items, expected);
    }

    #[test]
    fn test_no_disconnect_all_when_idle() {
        let mut servers = Section::new(SectionKind::Server);
        servers.entries = vec![Entry::resource("web-1", false)];
        let menu = render(&ResourceModel::new(vec![servers]));

        assert_eq!(menu.items.len(), 1);
        assert!(matches!(menu.items[0], MenuItem::Group { .. }));
    }

    #[test]
    fn test_render_is_idempotent() {
        let model = sample_model();
        assert_eq!(render(&model), render(&model));
    }

    #[test]
    fn test_toggle_actions() {
        let menu = render(&sample_model());
        let entry = menu.entry("db-admin").unwrap();
        assert_eq!(entry.toggled(true), Action::Connect("db-admin".to_string()));
        assert_eq!(entry.toggled(false), Action::Disconnect("db-admin".to_string()));

        let link = menu.entry("Wiki").unwrap();
        assert_eq!(
            link.toggled(false),
            Action::Open("https://wiki.example.com".to_string())
        );
    }

    #[test]
    fn test_display() {
        let text = render(&sample_model()).to_string();
        assert!(text.starts_with("[x] Disconnect All (3 connected)\n"));
        assert!(text.contains("    [off] db-admin\n"));
        assert!(text.contains("    Wiki <https://wiki.example.com>\n"));
        assert_eq!(render(&ResourceModel::default()).to_string(), "(no resources)\n");
    }
}
