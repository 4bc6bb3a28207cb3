//! Tray menu model.
//!
//! The menu is rebuilt from a [`MenuView`] on every redraw, so enabled and
//! checked flags always match the current state. Items carry a
//! [`MenuCommand`] that the host hands back to `TimerController::dispatch`.

use serde::Serialize;

use crate::settings::{Feature, TimerKind};
use crate::timer::TimerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MenuCommand {
    Start,
    Stop,
    /// Change a duration by `delta` minutes.
    Adjust { kind: TimerKind, delta: i32 },
    Toggle { feature: Feature },
    Exit,
}

/// What the menu needs to know about the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuView {
    pub state: TimerState,
    pub blocks_worked: f64,
    pub step_size: u32,
    pub hide_windows: bool,
    pub spotify: bool,
    pub home_assistant: bool,
    pub spotify_available: bool,
}

impl MenuView {
    fn feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::HideWindows => self.hide_windows,
            Feature::Spotify => self.spotify,
            Feature::HomeAssistant => self.home_assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuEntry {
    Item(MenuItem),
    Separator,
    Submenu { label: String, entries: Vec<MenuEntry> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItem {
    pub label: String,
    pub command: Option<MenuCommand>,
    pub enabled: bool,
    /// `None` for plain items, `Some(checked)` for toggles.
    pub checked: Option<bool>,
    /// Activated on a click on the tray icon itself.
    pub default: bool,
}

impl MenuItem {
    fn action(label: impl Into<String>, command: MenuCommand) -> Self {
        Self {
            label: label.into(),
            command: Some(command),
            enabled: true,
            checked: None,
            default: false,
        }
    }

    fn label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: None,
            enabled: false,
            checked: None,
            default: false,
        }
    }
}

pub fn can_start(state: TimerState) -> bool {
    matches!(state, TimerState::Ready | TimerState::Done)
}

pub fn can_stop(state: TimerState) -> bool {
    !matches!(state, TimerState::Ready | TimerState::Done)
}

fn adjust(kind: TimerKind, step: u32, sign: i32) -> MenuEntry {
    let delta = i32::try_from(step).unwrap_or(i32::MAX) * sign;
    let label = format!("{} {}{}", kind.label(), if sign > 0 { '+' } else { '-' }, step);
    MenuEntry::Item(MenuItem::action(label, MenuCommand::Adjust { kind, delta }))
}

fn toggle(view: &MenuView, feature: Feature) -> MenuEntry {
    let mut item = MenuItem::action(feature.key(), MenuCommand::Toggle { feature });
    item.checked = Some(view.feature(feature));
    if feature == Feature::Spotify {
        item.enabled = view.spotify_available;
    }
    MenuEntry::Item(item)
}

pub fn build_menu(view: &MenuView) -> Vec<MenuEntry> {
    let mut start = MenuItem::action("Start", MenuCommand::Start);
    start.enabled = can_start(view.state);
    start.default = view.state == TimerState::Ready;

    let mut stop = MenuItem::action("Stop", MenuCommand::Stop);
    stop.enabled = can_stop(view.state);
    stop.default = view.state == TimerState::Work;

    let step = view.step_size;
    let settings = vec![
        MenuEntry::Item(MenuItem::label(format!("Worked {:.1} blocks", view.blocks_worked))),
        MenuEntry::Separator,
        adjust(TimerKind::Work, step, 1),
        adjust(TimerKind::Work, step, -1),
        adjust(TimerKind::Pause, step, 1),
        adjust(TimerKind::Pause, step, -1),
        MenuEntry::Separator,
        toggle(view, Feature::HideWindows),
        toggle(view, Feature::Spotify),
        toggle(view, Feature::HomeAssistant),
        MenuEntry::Separator,
        MenuEntry::Item(MenuItem::action("Exit", MenuCommand::Exit)),
    ];

    vec![
        MenuEntry::Item(start),
        MenuEntry::Item(stop),
        MenuEntry::Submenu {
            label: "Settings".into(),
            entries: settings,
        },
    ]
}

/// Depth-first list of all items, for lookups by label.
pub fn items(entries: &[MenuEntry]) -> Vec<&MenuItem> {
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            MenuEntry::Item(item) => out.push(item),
            MenuEntry::Separator => {}
            MenuEntry::Submenu { entries, .. } => out.extend(items(entries)),
        }
    }
    out
}

pub fn find<'a>(entries: &'a [MenuEntry], label: &str) -> Option<&'a MenuItem> {
    items(entries).into_iter().find(|item| item.label == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(state: TimerState) -> MenuView {
        MenuView {
            state,
            blocks_worked: 1.5,
            step_size: 5,
            hide_windows: true,
            spotify: false,
            home_assistant: false,
            spotify_available: false,
        }
    }

    #[test]
    fn start_and_stop_follow_state() {
        for (state, start, stop) in [
            (TimerState::Ready, true, false),
            (TimerState::Work, false, true),
            (TimerState::Pause, false, true),
            (TimerState::Done, true, false),
            (TimerState::Starting, false, true),
        ] {
            let menu = build_menu(&view(state));
            assert_eq!(find(&menu, "Start").unwrap().enabled, start, "{state}");
            assert_eq!(find(&menu, "Stop").unwrap().enabled, stop, "{state}");
        }
    }

    #[test]
    fn default_item_tracks_state() {
        let menu = build_menu(&view(TimerState::Ready));
        assert!(find(&menu, "Start").unwrap().default);
        let menu = build_menu(&view(TimerState::Work));
        assert!(find(&menu, "Stop").unwrap().default);
        assert!(!find(&menu, "Start").unwrap().default);
    }

    #[test]
    fn settings_submenu_layout() {
        let menu = build_menu(&view(TimerState::Ready));
        let labels: Vec<_> = items(&menu).iter().map(|i| i.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Start",
                "Stop",
                "Worked 1.5 blocks",
                "Work +5",
                "Work -5",
                "Pause +5",
                "Pause -5",
                "Hide Windows",
                "Spotify",
                "Home Assistant",
                "Exit",
            ]
        );
        assert_eq!(
            find(&menu, "Pause -5").unwrap().command,
            Some(MenuCommand::Adjust {
                kind: TimerKind::Pause,
                delta: -5
            })
        );
    }

    #[test]
    fn toggles_show_checked_and_spotify_availability() {
        let menu = build_menu(&view(TimerState::Ready));
        assert_eq!(find(&menu, "Hide Windows").unwrap().checked, Some(true));
        assert_eq!(find(&menu, "Home Assistant").unwrap().checked, Some(false));
        assert!(!find(&menu, "Spotify").unwrap().enabled);

        let mut available = view(TimerState::Ready);
        available.spotify_available = true;
        assert!(find(&build_menu(&available), "Spotify").unwrap().enabled);
    }
}
