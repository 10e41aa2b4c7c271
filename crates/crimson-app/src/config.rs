// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::Path;

use crimson_render_vk::{PresentModePreference, VkConfig};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub present_mode: PresentModeCfg,
    #[serde(default = "default_validation")]
    pub validation: bool,
    #[serde(default = "default_descriptor_budget")]
    pub descriptor_budget: u32,
    #[serde(default = "default_overlay")]
    pub overlay: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    Fifo,
    #[default]
    Mailbox,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub render: RenderCfg,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            present_mode: PresentModeCfg::Mailbox,
            validation: default_validation(),
            descriptor_budget: default_descriptor_budget(),
            overlay: default_overlay(),
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.1, 0.1, 0.15, 1.0]
}
fn default_validation() -> bool {
    cfg!(debug_assertions)
}
fn default_descriptor_budget() -> u32 {
    1000
}
fn default_overlay() -> bool {
    true
}

impl RenderCfg {
    pub fn to_vk(self) -> VkConfig {
        VkConfig {
            clear_color: self.clear_color,
            present_mode: match self.present_mode {
                PresentModeCfg::Fifo => PresentModePreference::Fifo,
                PresentModeCfg::Mailbox => PresentModePreference::Mailbox,
            },
            validation: self.validation,
            descriptor_budget: self.descriptor_budget.max(1),
            overlay: self.overlay,
        }
    }
}

pub fn parse_cfg(src: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(src)
}

/// Missing file means defaults. A file that does not parse is reported and
/// also falls back to defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match parse_cfg(&s) {
            Ok(cfg) => {
                info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("ignoring {}: {e}", path.display());
                AppCfg::default()
            }
        },
        Err(_) => AppCfg::default(),
    }
}
