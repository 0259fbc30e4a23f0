//! Configuration file parsing for `braggi.toml`.
//!
//! Everything here is optional; command-line flags override the file.
//!
//! ```toml
//! [build]
//! opt-level = 2
//! color = false
//! ```

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Default optimization level when no `-O` flag is given.
    #[serde(default)]
    pub opt_level: u8,
    /// ANSI colors in rendered diagnostics.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_color() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            opt_level: 0,
            color: true,
        }
    }
}

/// Load `braggi.toml` from the current directory, falling back to defaults
/// when the file is absent or malformed (a malformed file is reported).
pub fn load() -> Config {
    load_from(Path::new("braggi.toml"))
}

pub fn load_from(path: &Path) -> Config {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("braggi: ignoring malformed {}: {}", path.display(), err);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.build.opt_level, 0);
        assert!(config.build.color);
    }

    #[test]
    fn parses_build_table() {
        let config: Config = toml::from_str("[build]\nopt-level = 2\ncolor = false\n").unwrap();
        assert_eq!(config.build.opt_level, 2);
        assert!(!config.build.color);
    }
}
