// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use ini::Ini;
use log::{debug, info, warn};
use pusher_common::settings::{parse_address, parse_bool, Settings, SubindexPolicy};
use pusher_common::types::is_page_aligned;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "pusher.ini";

/// Locate pusher.ini in the current directory or the user config directory.
pub fn find_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    // XDG_CONFIG_HOME
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(&xdg).join("pusher").join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }

    // Linux: ~/.config/pusher/pusher.ini
    if let Ok(home) = std::env::var("HOME") {
        let path = PathBuf::from(&home)
            .join(".config")
            .join("pusher")
            .join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load settings from an INI file, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Settings {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                warn!("Config file not found: {}", p.display());
                return Settings::default();
            }
            p.to_path_buf()
        }
        None => match find_config_path() {
            Some(p) => p,
            None => {
                info!("No pusher config found, using defaults");
                return Settings::default();
            }
        },
    };

    info!("Loading config from: {}", config_path.display());

    match Ini::load_from_file(&config_path) {
        Ok(conf) => apply_config(&conf),
        Err(e) => {
            warn!("Failed to parse config: {}", e);
            Settings::default()
        }
    }
}

/// Build settings from a parsed INI document.
pub fn apply_config(conf: &Ini) -> Settings {
    let mut settings = Settings::default();

    // [Pusher]
    if let Some(section) = conf.section(Some("Pusher")) {
        if let Some(enable) = section.get("ib_enable") {
            settings.ib_enable = parse_bool(enable);
        }
        if let Some(policy) = section.get("subindex_policy") {
            settings.subindex_policy = SubindexPolicy::from_str_or_default(policy);
            debug!("Subindex policy: {:?}", settings.subindex_policy);
        }
    }

    // [Memory]
    if let Some(section) = conf.section(Some("Memory")) {
        if let Some(base) = section.get("gpu_va_base") {
            match parse_address(base) {
                Some(addr) if is_page_aligned(addr) => settings.gpu_va_base = addr,
                Some(addr) => warn!("Ignoring gpu_va_base 0x{:X}: not page aligned", addr),
                None => warn!("Ignoring invalid gpu_va_base: {}", base),
            }
        }
    }

    settings
}
