use camino::Utf8Path;
use eyre::{Result, WrapErr};
use serde::Deserialize;

use crate::driver::StrobePolicy;
use crate::monitor::Vantage;
use crate::responder::SlaveTiming;
use crate::signals::{BusWidths, SignalMap};

/// Per-test configuration. Every section and field is optional; an empty
/// file yields [`Config::default`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub agent: AgentConfig,
    pub bus: BusWidths,
    pub signals: SignalMap,
    pub responder: SlaveTiming,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub name: String,
    pub has_driver: bool,
    pub has_monitor: bool,
    pub vantage: Vantage,
    pub strobe_policy: StrobePolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "wb4s".into(),
            has_driver: true,
            has_monitor: true,
            vantage: Vantage::Responder,
            strobe_policy: StrobePolicy::ReleaseWhenAccepted,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).wrap_err("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path))?;
        Self::from_toml_str(&text).wrap_err_with(|| format!("in config file {}", path))
    }

    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;
        self.signals.validate()
    }
}
