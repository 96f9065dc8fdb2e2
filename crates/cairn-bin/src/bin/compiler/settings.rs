//! Layered settings for the `compiler` binary.
//!
//! `defaults/cairn.default.toml` is embedded so the documented defaults and
//! the runtime ones cannot drift. Files and command line overrides are
//! layered on top by [`Loader`] before deserializing into [`Settings`].

use std::path::Path;

use cairn::config::BuildConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;

const DEFAULT_TOML: &str = include_str!("../../../defaults/cairn.default.toml");

/// Picked up from the working directory when present.
pub const LOCAL_SETTINGS_FILE: &str = "cairn.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub build: BuildConfig,
}

#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a settings file that must exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer a settings file, skipped when absent.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cairn::config::ConflictPolicy;

    use super::*;

    #[test]
    fn defaults_match_build_config() {
        let settings = Loader::new().build().expect("defaults to deserialize");
        assert_eq!(settings.build, BuildConfig::default());
    }

    #[test]
    fn overrides_win() {
        let settings = Loader::new()
            .set_override("build.conflict_policy", "prefer-shift")
            .expect("override to apply")
            .set_override("build.max_states", 16i64)
            .expect("override to apply")
            .build()
            .expect("settings to build");
        assert_eq!(settings.build.conflict_policy, ConflictPolicy::PreferShift);
        assert_eq!(settings.build.max_states, 16);
        assert_eq!(settings.build.max_rules, 1024);
    }

    #[test]
    fn missing_required_file_fails() {
        let result = Loader::new().with_file("does/not/exist/cairn.toml").build();
        assert!(result.is_err());
    }
}
