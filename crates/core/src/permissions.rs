//! Capability gating for mutating and privileged operations.
//!
//! Every capability defaults to off. Write is the parent of CMDB write and
//! scripting; Now Assist and ATF are independent of it.

use crate::error::{ErrorKind, NowError, NowResult};
use serde::{Deserialize, Serialize};

pub const WRITE_ENABLED: &str = "WRITE_ENABLED";
pub const CMDB_WRITE_ENABLED: &str = "CMDB_WRITE_ENABLED";
pub const SCRIPTING_ENABLED: &str = "SCRIPTING_ENABLED";
pub const NOW_ASSIST_ENABLED: &str = "NOW_ASSIST_ENABLED";
pub const ATF_ENABLED: &str = "ATF_ENABLED";

/// The capability a tool requires before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTier {
    /// Read-only, always allowed
    Read,
    /// Creates, updates or deletes records
    Write,
    /// Mutates the CMDB
    CmdbWrite,
    /// Creates or edits server-side code
    Scripting,
    /// Calls AI / generative endpoints
    NowAssist,
    /// Executes automated tests on the instance
    Atf,
}

/// Resolved capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub cmdb_write: bool,
    #[serde(default)]
    pub scripting: bool,
    #[serde(default)]
    pub now_assist: bool,
    #[serde(default)]
    pub atf: bool,
}

/// A flag is on only when its value is the text `true`, compared
/// case-insensitively after trimming.
pub fn flag_enabled(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl Capabilities {
    /// Everything enabled. Intended for tests and trusted local setups.
    pub fn all() -> Self {
        Self {
            write: true,
            cmdb_write: true,
            scripting: true,
            now_assist: true,
            atf: true,
        }
    }

    /// Resolve flags through a lookup function. Unset flags are off.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut caps = Self::default();
        caps.apply_lookup(lookup);
        caps
    }

    /// Override each flag whose variable the lookup returns; flags it
    /// returns nothing for keep their current value.
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, flag) in [
            (WRITE_ENABLED, &mut self.write),
            (CMDB_WRITE_ENABLED, &mut self.cmdb_write),
            (SCRIPTING_ENABLED, &mut self.scripting),
            (NOW_ASSIST_ENABLED, &mut self.now_assist),
            (ATF_ENABLED, &mut self.atf),
        ] {
            if let Some(value) = lookup(key) {
                *flag = flag_enabled(&value);
            }
        }
    }

    pub fn is_write_enabled(&self) -> bool {
        self.write
    }

    pub fn is_cmdb_write_enabled(&self) -> bool {
        self.write && self.cmdb_write
    }

    pub fn is_scripting_enabled(&self) -> bool {
        self.write && self.scripting
    }

    pub fn is_now_assist_enabled(&self) -> bool {
        self.now_assist
    }

    pub fn is_atf_enabled(&self) -> bool {
        self.atf
    }

    pub fn require_write(&self) -> NowResult<()> {
        if self.is_write_enabled() {
            return Ok(());
        }
        Err(NowError::new(
            ErrorKind::WriteNotEnabled,
            "Write operations are disabled. Set WRITE_ENABLED=true to enable.",
        ))
    }

    pub fn require_cmdb_write(&self) -> NowResult<()> {
        if self.is_cmdb_write_enabled() {
            return Ok(());
        }
        Err(NowError::new(
            ErrorKind::CmdbWriteNotEnabled,
            "CMDB write operations are disabled. Set WRITE_ENABLED=true and CMDB_WRITE_ENABLED=true to enable.",
        ))
    }

    pub fn require_scripting(&self) -> NowResult<()> {
        if self.is_scripting_enabled() {
            return Ok(());
        }
        Err(NowError::new(
            ErrorKind::ScriptingNotEnabled,
            "Scripting operations are disabled. Set WRITE_ENABLED=true and SCRIPTING_ENABLED=true to enable.",
        ))
    }

    pub fn require_now_assist(&self) -> NowResult<()> {
        if self.is_now_assist_enabled() {
            return Ok(());
        }
        Err(NowError::new(
            ErrorKind::NowAssistNotEnabled,
            "Now Assist / AI features are disabled. Set NOW_ASSIST_ENABLED=true to enable.",
        ))
    }

    pub fn require_atf(&self) -> NowResult<()> {
        if self.is_atf_enabled() {
            return Ok(());
        }
        Err(NowError::new(
            ErrorKind::AtfNotEnabled,
            "ATF test execution is disabled. Set ATF_ENABLED=true to enable.",
        ))
    }

    /// Check the capability backing a tool tier.
    pub fn require(&self, tier: ToolTier) -> NowResult<()> {
        match tier {
            ToolTier::Read => Ok(()),
            ToolTier::Write => self.require_write(),
            ToolTier::CmdbWrite => self.require_cmdb_write(),
            ToolTier::Scripting => self.require_scripting(),
            ToolTier::NowAssist => self.require_now_assist(),
            ToolTier::Atf => self.require_atf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn caps(pairs: &[(&str, &str)]) -> Capabilities {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Capabilities::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_everything_off_by_default() {
        let caps = caps(&[]);
        assert_eq!(caps, Capabilities::default());
        assert!(caps.require(ToolTier::Read).is_ok());
        assert_eq!(
            caps.require_write().unwrap_err().kind(),
            ErrorKind::WriteNotEnabled
        );
        assert_eq!(
            caps.require_atf().unwrap_err().kind(),
            ErrorKind::AtfNotEnabled
        );
    }

    #[test]
    fn test_flag_parsing_is_case_insensitive() {
        assert!(caps(&[(WRITE_ENABLED, "TRUE")]).is_write_enabled());
        assert!(caps(&[(WRITE_ENABLED, "True")]).is_write_enabled());
        assert!(!caps(&[(WRITE_ENABLED, "1")]).is_write_enabled());
        assert!(!caps(&[(WRITE_ENABLED, "yes")]).is_write_enabled());
        assert!(!caps(&[(WRITE_ENABLED, "")]).is_write_enabled());
    }

    #[test]
    fn test_apply_lookup_keeps_unset_flags() {
        let mut caps = Capabilities {
            write: true,
            atf: true,
            ..Capabilities::default()
        };
        caps.apply_lookup(|key| match key {
            ATF_ENABLED => Some("false".to_string()),
            NOW_ASSIST_ENABLED => Some(" True ".to_string()),
            _ => None,
        });

        assert!(caps.write);
        assert!(!caps.atf);
        assert!(caps.now_assist);
        assert!(!caps.scripting);
    }

    #[test]
    fn test_cmdb_write_needs_write() {
        let caps = caps(&[(CMDB_WRITE_ENABLED, "true")]);
        let err = caps.require_cmdb_write().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CmdbWriteNotEnabled);
        assert!(err.message().contains("WRITE_ENABLED=true and CMDB_WRITE_ENABLED=true"));

        let caps = super::Capabilities::from_lookup(|key| {
            matches!(key, WRITE_ENABLED | CMDB_WRITE_ENABLED).then(|| "true".to_string())
        });
        assert!(caps.require_cmdb_write().is_ok());
    }

    #[test]
    fn test_scripting_needs_write() {
        let only_scripting = caps(&[(SCRIPTING_ENABLED, "true")]);
        assert_eq!(
            only_scripting.require_scripting().unwrap_err().kind(),
            ErrorKind::ScriptingNotEnabled
        );

        let both = caps(&[(WRITE_ENABLED, "true"), (SCRIPTING_ENABLED, "true")]);
        assert!(both.require_scripting().is_ok());
        assert!(both.require(ToolTier::Scripting).is_ok());
    }

    #[test]
    fn test_now_assist_and_atf_are_independent_of_write() {
        let caps = caps(&[(NOW_ASSIST_ENABLED, "true"), (ATF_ENABLED, "true")]);
        assert!(!caps.is_write_enabled());
        assert!(caps.require_now_assist().is_ok());
        assert!(caps.require_atf().is_ok());
        assert_eq!(
            caps.require(ToolTier::Write).unwrap_err().message(),
            "Write operations are disabled. Set WRITE_ENABLED=true to enable."
        );
    }

    #[test]
    fn test_all_enables_every_tier() {
        let caps = Capabilities::all();
        for tier in [
            ToolTier::Read,
            ToolTier::Write,
            ToolTier::CmdbWrite,
            ToolTier::Scripting,
            ToolTier::NowAssist,
            ToolTier::Atf,
        ] {
            assert!(caps.require(tier).is_ok(), "{:?} should be allowed", tier);
        }
    }
}
