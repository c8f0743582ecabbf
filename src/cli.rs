use crate::config::RigConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};

/// Flags shared by the `rig_tool` subcommands, plus the positional arguments left over.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOverrides {
    tick_interval: Option<f32>,
    density: Option<f32>,
    log: Option<String>,
    config: Option<String>,
    pub positional: Vec<String>,
}

impl CliOverrides {
    /// Parses arguments that follow the subcommand name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        while let Some(raw) = iter.next() {
            let arg = raw.as_ref();
            let Some(key) = arg.strip_prefix("--") else {
                overrides.positional.push(arg.to_string());
                continue;
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "tick-interval" => {
                    let interval = value
                        .parse::<f32>()
                        .with_context(|| format!("Invalid tick interval '{value}'"))?;
                    if !(interval.is_finite() && interval > 0.0) {
                        bail!("Tick interval must be a positive number of seconds, got '{value}'");
                    }
                    overrides.tick_interval = Some(interval);
                }
                "density" => {
                    let density =
                        value.parse::<f32>().with_context(|| format!("Invalid density '{value}'"))?;
                    if !(density.is_finite() && density > 0.0) {
                        bail!("Density must be positive, got '{value}'");
                    }
                    overrides.density = Some(density);
                }
                "log" => overrides.log = Some(value),
                "config" => overrides.config = Some(value),
                _ => bail!(
                    "Unknown flag '{arg}'. Supported flags: --config, --tick-interval, --density, --log."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn into_config_overrides(self) -> RigConfigOverrides {
        RigConfigOverrides {
            tick_interval_secs: self.tick_interval,
            density: self.density,
            log_filter: self.log,
        }
    }

    #[cfg(test)]
    pub fn as_tuple(&self) -> (Option<f32>, Option<f32>, Option<&str>) {
        (self.tick_interval, self.density, self.log.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interval_density_and_log() {
        let args = ["rig.json", "--tick-interval", "0.25", "--density", "2.5", "--log", "debug"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.as_tuple(), (Some(0.25), Some(2.5), Some("debug")));
        assert_eq!(overrides.positional, vec!["rig.json".to_string()]);
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["--density", "1.0", "--density", "3.0"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.as_tuple(), (None, Some(3.0), None));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["--density"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliOverrides::parse(["--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }

    #[test]
    fn rejects_non_positive_interval() {
        let err = CliOverrides::parse(["--tick-interval", "0"]).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn config_path_is_kept_apart_from_overrides() {
        let overrides = CliOverrides::parse(["--config", "rig.cfg.json", "a.json"]).expect("parse");
        assert_eq!(overrides.config_path(), Some("rig.cfg.json"));
        let config = overrides.into_config_overrides();
        assert!(config.is_empty());
    }
}
