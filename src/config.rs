use crate::app_dirs::AppDirs;
use crate::catalog::ItemSet;
use crate::error::{Result, SpotError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Delays of the round sequence, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timing {
    pub demo_display_secs: f64,
    pub demo_gap_secs: f64,
    pub settle_secs: f64,
    pub retry_delay_secs: f64,
    pub pulse_fade_in_secs: f64,
    pub pulse_half_period_secs: f64,
    pub tick_secs: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            demo_display_secs: 5.0,
            demo_gap_secs: 3.0,
            settle_secs: 3.0,
            retry_delay_secs: 4.0,
            pulse_fade_in_secs: 1.0,
            pulse_half_period_secs: 0.5,
            tick_secs: 1.0,
        }
    }
}

impl Timing {
    pub fn demo_display(&self) -> Duration {
        secs(self.demo_display_secs)
    }

    pub fn demo_gap(&self) -> Duration {
        secs(self.demo_gap_secs)
    }

    pub fn settle(&self) -> Duration {
        secs(self.settle_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        secs(self.retry_delay_secs)
    }

    pub fn tick(&self) -> Duration {
        secs(self.tick_secs)
    }

    fn all(&self) -> [(&'static str, f64); 7] {
        [
            ("demo_display_secs", self.demo_display_secs),
            ("demo_gap_secs", self.demo_gap_secs),
            ("settle_secs", self.settle_secs),
            ("retry_delay_secs", self.retry_delay_secs),
            ("pulse_fade_in_secs", self.pulse_fade_in_secs),
            ("pulse_half_period_secs", self.pulse_half_period_secs),
            ("tick_secs", self.tick_secs),
        ]
    }
}

/// Thresholds that shape scoring and escalation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Rules {
    /// Consecutive expired windows in one round before it is auto-passed.
    pub auto_pass_limit: u8,
    pub miss_penalty: u32,
    pub intro_pulse_repeats: u32,
    pub pulse_repeats: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            auto_pass_limit: 3,
            miss_penalty: 20,
            intro_pulse_repeats: 5,
            pulse_repeats: 9,
        }
    }
}

impl Rules {
    pub fn pulse_repeats_for(&self, level: u8) -> u32 {
        if level <= 1 {
            self.intro_pulse_repeats
        } else {
            self.pulse_repeats
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub item_set: String,
    pub seed: Option<u64>,
    pub timing: Timing,
    pub rules: Rules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            item_set: "healthcare".to_string(),
            seed: None,
            timing: Timing::default(),
            rules: Rules::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if let Some((name, value)) = self
            .timing
            .all()
            .into_iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(SpotError::Config(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
        if self.timing.tick_secs <= 0.0 {
            return Err(SpotError::Config("tick_secs must be positive".into()));
        }
        if !(1..=3).contains(&self.rules.auto_pass_limit) {
            return Err(SpotError::Config(format!(
                "auto_pass_limit must be between 1 and 3, got {}",
                self.rules.auto_pass_limit
            )));
        }
        if self.rules.intro_pulse_repeats == 0 || self.rules.pulse_repeats == 0 {
            return Err(SpotError::Config("pulse repeats must be at least 1".into()));
        }
        ItemSet::load(&self.item_set)?;
        Ok(())
    }
}

fn secs(v: f64) -> Duration {
    if v.is_finite() && v > 0.0 {
        Duration::from_secs_f64(v)
    } else {
        Duration::ZERO
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
