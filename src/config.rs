//! Binding policy
//!
//! Reads `NOSQL_PARAMS_IGNORE_UNKNOWN` and `NOSQL_PARAMS_ALLOW_REBIND` from
//! the environment. Accepted values: `1`/`true`/`yes`/`on` and
//! `0`/`false`/`no`/`off`. Anything else keeps the default.

use serde::{Deserialize, Serialize};

pub const ENV_IGNORE_UNKNOWN: &str = "NOSQL_PARAMS_IGNORE_UNKNOWN";
pub const ENV_ALLOW_REBIND: &str = "NOSQL_PARAMS_ALLOW_REBIND";

/// How [`Params`](crate::Params) reacts to unusual binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Skip binds for unregistered names instead of failing with `NotFound`
    pub ignore_unknown: bool,
    /// Replace an already bound value instead of failing with `AlreadyBound`
    pub allow_rebind: bool,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            ignore_unknown: false,
            allow_rebind: true,
        }
    }
}

impl BindConfig {
    /// Strict defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            ignore_unknown: lookup(ENV_IGNORE_UNKNOWN)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.ignore_unknown),
            allow_rebind: lookup(ENV_ALLOW_REBIND)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.allow_rebind),
        }
    }

    pub fn with_ignore_unknown(mut self, ignore: bool) -> Self {
        self.ignore_unknown = ignore;
        self
    }

    pub fn with_allow_rebind(mut self, allow: bool) -> Self {
        self.allow_rebind = allow;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(value = other, "ignoring unrecognized boolean flag");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_strict_on_unknown() {
        let cfg = BindConfig::default();
        assert!(!cfg.ignore_unknown);
        assert!(cfg.allow_rebind);
    }

    #[test]
    fn lookup_overrides() {
        let cfg = BindConfig::from_lookup(lookup_from(&[
            (ENV_IGNORE_UNKNOWN, "yes"),
            (ENV_ALLOW_REBIND, "0"),
        ]));
        assert!(cfg.ignore_unknown);
        assert!(!cfg.allow_rebind);
    }

    #[test]
    fn garbage_keeps_default() {
        let cfg = BindConfig::from_lookup(lookup_from(&[(ENV_IGNORE_UNKNOWN, "maybe")]));
        assert_eq!(cfg, BindConfig::default());
    }

    #[test]
    fn builder() {
        let cfg = BindConfig::default()
            .with_ignore_unknown(true)
            .with_allow_rebind(false);
        assert!(cfg.ignore_unknown);
        assert!(!cfg.allow_rebind);
    }
}
