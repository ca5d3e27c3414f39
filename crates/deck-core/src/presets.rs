//! Static preset catalog
//!
//! Read-only lookup tables used to fill defaults during apply:
//! - Five-field schedule presets keyed by description
//! - Scheduled job templates keyed by template id
//! - Service unit templates keyed by template id
//! - Reload commands keyed by rice component
//!
//! Lookups are exact-key. Listing preserves declaration order.

use crate::error::{DeckError, DeckResult, NotFoundKind};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Serialize;

/// Scheduled job template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobTemplate {
    /// Template id
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Five-field schedule
    pub schedule: &'static str,
    /// Command line
    pub command: &'static str,
}

/// Service unit template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitTemplate {
    /// Template id
    pub id: &'static str,
    /// Unit body
    pub content: &'static str,
}

static SCHEDULE_PRESETS: Lazy<IndexMap<&'static str, &'static str>> = Lazy::new(|| {
    IndexMap::from([
        ("Every minute", "* * * * *"),
        ("Every 5 minutes", "*/5 * * * *"),
        ("Every 15 minutes", "*/15 * * * *"),
        ("Every 30 minutes", "*/30 * * * *"),
        ("Every hour", "0 * * * *"),
        ("Every 6 hours", "0 */6 * * *"),
        ("Every 12 hours", "0 */12 * * *"),
        ("Daily at midnight", "0 0 * * *"),
        ("Daily at noon", "0 12 * * *"),
        ("Weekly on Sunday", "0 0 * * 0"),
        ("Monthly on 1st", "0 0 1 * *"),
        ("Every weekday", "0 9 * * 1-5"),
    ])
});

static JOB_TEMPLATES: Lazy<IndexMap<&'static str, JobTemplate>> = Lazy::new(|| {
    [
        JobTemplate {
            id: "cleanup-tmp",
            name: "Clean /tmp directory",
            schedule: "0 2 * * *",
            command: "find /tmp -type f -atime +7 -delete",
        },
        JobTemplate {
            id: "update-system",
            name: "System update check",
            schedule: "0 3 * * 0",
            command: "pacman -Sy",
        },
        JobTemplate {
            id: "backup-configs",
            name: "Backup configurations",
            schedule: "0 4 * * *",
            command: "tar -czf ~/backups/configs-$(date +%Y%m%d).tar.gz ~/.config",
        },
        JobTemplate {
            id: "rotate-wallpaper",
            name: "Rotate wallpaper",
            schedule: "*/30 * * * *",
            command: "feh --bg-fill --randomize ~/Pictures/Wallpapers/*",
        },
        JobTemplate {
            id: "reload-eww",
            name: "Reload EWW widgets",
            schedule: "0 */6 * * *",
            command: "eww reload",
        },
    ]
    .into_iter()
    .map(|t| (t.id, t))
    .collect()
});

static UNIT_TEMPLATES: Lazy<IndexMap<&'static str, UnitTemplate>> = Lazy::new(|| {
    [
        UnitTemplate {
            id: "basic",
            content: "[Unit]\n\
                      Description=My Custom Service\n\
                      After=network.target\n\
                      \n\
                      [Service]\n\
                      Type=simple\n\
                      ExecStart=/usr/bin/my-command\n\
                      Restart=on-failure\n\
                      RestartSec=5s\n\
                      \n\
                      [Install]\n\
                      WantedBy=default.target\n",
        },
        UnitTemplate {
            id: "timer",
            content: "[Unit]\n\
                      Description=My Timer Service\n\
                      Requires=my-timer.timer\n\
                      \n\
                      [Service]\n\
                      Type=oneshot\n\
                      ExecStart=/usr/bin/my-script.sh\n",
        },
        UnitTemplate {
            id: "monitor",
            content: "[Unit]\n\
                      Description=System Monitor Service\n\
                      After=network.target\n\
                      \n\
                      [Service]\n\
                      Type=simple\n\
                      ExecStart=/usr/bin/watch -n 5 /usr/bin/my-monitor-script\n\
                      Restart=always\n\
                      RestartSec=10s\n\
                      \n\
                      [Install]\n\
                      WantedBy=default.target\n",
        },
        UnitTemplate {
            id: "wallpaper-rotator",
            content: "[Unit]\n\
                      Description=Wallpaper Rotation Service\n\
                      After=graphical-session.target\n\
                      \n\
                      [Service]\n\
                      Type=simple\n\
                      ExecStart=/usr/bin/bash -c 'while true; do feh --bg-fill --randomize ~/Pictures/Wallpapers/*; sleep 300; done'\n\
                      Restart=always\n\
                      \n\
                      [Install]\n\
                      WantedBy=default.target\n",
        },
        UnitTemplate {
            id: "eww-refresh",
            content: "[Unit]\n\
                      Description=EWW Widget Auto-refresh\n\
                      After=graphical-session.target\n\
                      \n\
                      [Service]\n\
                      Type=simple\n\
                      ExecStart=/usr/bin/bash -c 'while true; do eww reload; sleep 3600; done'\n\
                      Restart=always\n\
                      \n\
                      [Install]\n\
                      WantedBy=default.target\n",
        },
    ]
    .into_iter()
    .map(|t| (t.id, t))
    .collect()
});

// Terminals and rofi pick up their config on next launch.
static RELOAD_COMMANDS: Lazy<IndexMap<&'static str, &'static str>> = Lazy::new(|| {
    IndexMap::from([
        ("waybar", "killall waybar && waybar &"),
        ("polybar", "killall polybar && polybar &"),
        ("eww", "eww reload"),
        ("conky", "killall conky && conky &"),
        ("picom", "killall picom && picom &"),
        ("dunst", "killall dunst && dunst &"),
        ("kitty", "echo \"Restart Kitty terminal manually\""),
        ("alacritty", "echo \"Restart Alacritty terminal manually\""),
        ("rofi", "echo \"Rofi will use new config on next launch\""),
    ])
});

/// Read-only preset lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetCatalog;

impl PresetCatalog {
    /// Create catalog handle
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Schedule string for a preset description
    ///
    /// # Errors
    /// - `DeckError::NotFound` for unknown descriptions
    pub fn schedule(&self, description: &str) -> DeckResult<&'static str> {
        SCHEDULE_PRESETS
            .get(description)
            .copied()
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Preset, description))
    }

    /// Scheduled job template by id
    ///
    /// # Errors
    /// - `DeckError::NotFound` for unknown ids
    pub fn job_template(&self, id: &str) -> DeckResult<JobTemplate> {
        JOB_TEMPLATES
            .get(id)
            .copied()
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Preset, id))
    }

    /// Service unit template by id
    ///
    /// # Errors
    /// - `DeckError::NotFound` for unknown ids
    pub fn unit_template(&self, id: &str) -> DeckResult<UnitTemplate> {
        UNIT_TEMPLATES
            .get(id)
            .copied()
            .ok_or_else(|| DeckError::not_found(NotFoundKind::Preset, id))
    }

    /// Reload command for a rice component
    ///
    /// # Errors
    /// - `DeckError::NotFound` if the component has no reload action
    pub fn reload_command(&self, component: &str) -> DeckResult<&'static str> {
        RELOAD_COMMANDS
            .get(component)
            .copied()
            .ok_or_else(|| DeckError::not_found(NotFoundKind::ReloadCommand, component))
    }

    /// Check if a component has a reload action
    #[inline]
    #[must_use]
    pub fn has_reload(&self, component: &str) -> bool {
        RELOAD_COMMANDS.contains_key(component)
    }

    /// All schedule presets as `(description, schedule)`
    pub fn schedule_presets(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        SCHEDULE_PRESETS.iter().map(|(k, v)| (*k, *v))
    }

    /// All job templates
    pub fn job_templates(&self) -> impl Iterator<Item = JobTemplate> {
        JOB_TEMPLATES.values().copied()
    }

    /// All unit templates
    pub fn unit_templates(&self) -> impl Iterator<Item = UnitTemplate> {
        UNIT_TEMPLATES.values().copied()
    }

    /// Known rice components, in declaration order
    pub fn components(&self) -> impl Iterator<Item = &'static str> {
        RELOAD_COMMANDS.keys().copied()
    }

    /// All `(component, reload command)` pairs
    pub fn reload_commands(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        RELOAD_COMMANDS.iter().map(|(k, v)| (*k, *v))
    }
}
