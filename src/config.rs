use crate::host::ContainerKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "SchedulerConfig::default_tick_interval")]
    pub tick_interval_secs: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "NamingConfig::default_hitbox_suffix")]
    pub hitbox_suffix: String,
    #[serde(default = "NamingConfig::default_constraint_suffix")]
    pub constraint_suffix: String,
    #[serde(default = "NamingConfig::default_actives_container")]
    pub actives_container: String,
    #[serde(default = "NamingConfig::default_passives_container")]
    pub passives_container: String,
    #[serde(default = "NamingConfig::default_constraints_container")]
    pub constraints_container: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MassConfig {
    /// kg per cubic unit.
    #[serde(default = "MassConfig::default_density")]
    pub density: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RigConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub mass: MassConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct RigConfigOverrides {
    pub tick_interval_secs: Option<f32>,
    pub density: Option<f32>,
    pub log_filter: Option<String>,
}

impl SchedulerConfig {
    fn default_tick_interval() -> f32 {
        0.1
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval_secs: Self::default_tick_interval() }
    }
}

impl NamingConfig {
    fn default_hitbox_suffix() -> String {
        " [Hitbox]".to_string()
    }

    fn default_constraint_suffix() -> String {
        " [Head]".to_string()
    }

    fn default_actives_container() -> String {
        "Actives".to_string()
    }

    fn default_passives_container() -> String {
        "Passives".to_string()
    }

    fn default_constraints_container() -> String {
        "Constraints".to_string()
    }

    pub fn hitbox_name(&self, bone: &str) -> String {
        format!("{bone}{}", self.hitbox_suffix)
    }

    pub fn constraint_name(&self, bone: &str) -> String {
        format!("{bone}{}", self.constraint_suffix)
    }

    pub fn container_name(&self, kind: ContainerKind) -> &str {
        match kind {
            ContainerKind::Actives => &self.actives_container,
            ContainerKind::Passives => &self.passives_container,
            ContainerKind::Constraints => &self.constraints_container,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            hitbox_suffix: Self::default_hitbox_suffix(),
            constraint_suffix: Self::default_constraint_suffix(),
            actives_container: Self::default_actives_container(),
            passives_container: Self::default_passives_container(),
            constraints_container: Self::default_constraints_container(),
        }
    }
}

impl MassConfig {
    const fn default_density() -> f32 {
        1.0
    }
}

impl Default for MassConfig {
    fn default() -> Self {
        Self { density: Self::default_density() }
    }
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: Self::default_filter() }
    }
}

impl RigConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &RigConfigOverrides) {
        if let Some(interval) = overrides.tick_interval_secs {
            self.scheduler.tick_interval_secs = interval;
        }
        if let Some(density) = overrides.density {
            self.mass.density = density;
        }
        if let Some(filter) = &overrides.log_filter {
            self.logging.filter = filter.clone();
        }
    }
}

impl RigConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.tick_interval_secs.is_none() && self.density.is_none() && self.log_filter.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.tick_interval_secs.is_some() {
            fields.push("tick_interval");
        }
        if self.density.is_some() {
            fields.push("density");
        }
        if self.log_filter.is_some() {
            fields.push("log");
        }
        fields
    }
}
