//! Named rate limit tiers and their window settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Default window length shared by all tiers.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// A named rate limit profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Restrictive tier for mutating procedures
    Strict,
    /// Moderate tier for aggregate reads
    Normal,
    /// Permissive tier for cheap reads
    Lenient,
}

impl Tier {
    /// Every tier, in order of decreasing strictness.
    pub const ALL: [Tier; 3] = [Tier::Strict, Tier::Normal, Tier::Lenient];

    /// Cache key namespace for this tier.
    pub fn prefix(&self) -> &'static str {
        match self {
            Tier::Strict => "strict",
            Tier::Normal => "normal",
            Tier::Lenient => "lenient",
        }
    }

    /// Pick the tier for an RPC procedure named `<router>.<action>`.
    ///
    /// Mutations are strict, `data.*` aggregate queries are normal and every
    /// other query is lenient.
    pub fn for_procedure(procedure: &str) -> Tier {
        let (router, action) = procedure.rsplit_once('.').unwrap_or(("", procedure));

        let is_mutation = ["create", "update", "delete"]
            .iter()
            .any(|verb| action.starts_with(verb));

        if is_mutation {
            Tier::Strict
        } else if router == "data" || router.ends_with(".data") {
            Tier::Normal
        } else {
            Tier::Lenient
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Window length and call ceiling for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Calls allowed per window
    pub max: u32,
}

impl TierConfig {
    /// Create a tier configuration.
    pub fn new(window_ms: u64, max: u32) -> Self {
        Self { window_ms, max }
    }
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

/// Settings for the three standing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Strict tier settings
    #[serde(default = "default_strict")]
    pub strict: TierConfig,
    /// Normal tier settings
    #[serde(default = "default_normal")]
    pub normal: TierConfig,
    /// Lenient tier settings
    #[serde(default = "default_lenient")]
    pub lenient: TierConfig,
}

impl TierLimits {
    /// Settings for `tier`.
    pub fn get(&self, tier: Tier) -> TierConfig {
        match tier {
            Tier::Strict => self.strict,
            Tier::Normal => self.normal,
            Tier::Lenient => self.lenient,
        }
    }

    /// Mutable settings for `tier`.
    pub fn get_mut(&mut self, tier: Tier) -> &mut TierConfig {
        match tier {
            Tier::Strict => &mut self.strict,
            Tier::Normal => &mut self.normal,
            Tier::Lenient => &mut self.lenient,
        }
    }

    /// Replace zero `max` or `window_ms` values with the tier's default.
    pub fn sanitize(&mut self) {
        let defaults = TierLimits::default();
        for tier in Tier::ALL {
            let fallback = defaults.get(tier);
            let config = self.get_mut(tier);
            if config.max == 0 {
                warn!(tier = %tier, default = fallback.max, "Tier max must be positive, using default");
                config.max = fallback.max;
            }
            if config.window_ms == 0 {
                warn!(
                    tier = %tier,
                    default = fallback.window_ms,
                    "Tier window must be positive, using default"
                );
                config.window_ms = fallback.window_ms;
            }
        }
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            strict: default_strict(),
            normal: default_normal(),
            lenient: default_lenient(),
        }
    }
}

fn default_strict() -> TierConfig {
    TierConfig::new(DEFAULT_WINDOW_MS, 20)
}

fn default_normal() -> TierConfig {
    TierConfig::new(DEFAULT_WINDOW_MS, 60)
}

fn default_lenient() -> TierConfig {
    TierConfig::new(DEFAULT_WINDOW_MS, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_prefixes() {
        assert_eq!(Tier::Strict.prefix(), "strict");
        assert_eq!(Tier::Normal.prefix(), "normal");
        assert_eq!(Tier::Lenient.prefix(), "lenient");
        assert_eq!(Tier::Normal.to_string(), "normal");
    }

    #[test]
    fn test_default_limits() {
        let limits = TierLimits::default();
        assert_eq!(limits.strict, TierConfig::new(60_000, 20));
        assert_eq!(limits.normal, TierConfig::new(60_000, 60));
        assert_eq!(limits.lenient, TierConfig::new(60_000, 100));
    }

    #[test]
    fn test_procedure_tiers() {
        assert_eq!(Tier::for_procedure("user.create"), Tier::Strict);
        assert_eq!(Tier::for_procedure("user.delete"), Tier::Strict);
        assert_eq!(Tier::for_procedure("hobby.create"), Tier::Strict);
        assert_eq!(Tier::for_procedure("hobby.updateName"), Tier::Strict);
        assert_eq!(Tier::for_procedure("data.getUsersWithHobbies"), Tier::Normal);
        assert_eq!(Tier::for_procedure("user.getAll"), Tier::Lenient);
        assert_eq!(Tier::for_procedure("hobby.getByUserId"), Tier::Lenient);
        assert_eq!(Tier::for_procedure("ping"), Tier::Lenient);
    }

    #[test]
    fn test_sanitize_replaces_zero_values() {
        let mut limits = TierLimits {
            strict: TierConfig::new(60_000, 0),
            normal: TierConfig::new(0, 7),
            lenient: TierConfig::new(1_000, 3),
        };
        limits.sanitize();

        assert_eq!(limits.strict, TierConfig::new(60_000, 20));
        assert_eq!(limits.normal, TierConfig::new(60_000, 7));
        assert_eq!(limits.lenient, TierConfig::new(1_000, 3));
    }

    #[test]
    fn test_tier_config_deserialize_with_default_window() {
        let config: TierConfig = serde_json::from_str(r#"{"max": 5}"#).unwrap();
        assert_eq!(config, TierConfig::new(DEFAULT_WINDOW_MS, 5));

        let tier: Tier = serde_json::from_str(r#""lenient""#).unwrap();
        assert_eq!(tier, Tier::Lenient);
    }
}
