//! Layered TOML settings.
//!
//! ```text
//! <config_dir>/defaults.toml            required
//! <config_dir>/domains/<domain>.toml    optional
//! <config_dir>/main.toml                optional, user layer
//! ```
//!
//! Later layers win. Tables merge key by key; scalars and arrays are replaced
//! whole. Dates are written as strings (`start_date = "2024-01-01"`).

use crate::error::CliResult;
use cadence_core::{ConfigError, GenerationConfig};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use toml::{Table, Value};
use tracing::{debug, info};

pub const DEFAULTS_FILE: &str = "defaults.toml";
pub const USER_FILE: &str = "main.toml";
pub const DOMAINS_DIR: &str = "domains";

/// Where the run's seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// Set in the user layer
    User,
    /// Derived from the clock because the user layer left it unset
    Generated,
}

/// Merged configuration plus the seed that will drive the run.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub config: GenerationConfig,
    pub seed: u64,
    pub seed_source: SeedSource,
}

#[derive(Debug, Clone)]
pub struct Settings {
    config_dir: PathBuf,
}

impl Settings {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load_defaults(&self) -> CliResult<Table> {
        let path = self.config_dir.join(DEFAULTS_FILE);
        read_table(&path)?.ok_or_else(|| {
            ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: "defaults file not found".to_string(),
            }
            .into()
        })
    }

    pub fn load_domain(&self, domain: &str) -> CliResult<Option<Table>> {
        read_table(&self.config_dir.join(DOMAINS_DIR).join(format!("{}.toml", domain)))
    }

    pub fn load_user(&self) -> CliResult<Option<Table>> {
        read_table(&self.config_dir.join(USER_FILE))
    }

    /// Merge every layer for `domain`, seeding from the clock when the user
    /// layer has no seed.
    pub fn resolve(&self, domain: &str) -> CliResult<ResolvedSettings> {
        self.resolve_with_seed(domain, time_seed())
    }

    /// As [`resolve`](Self::resolve), with `generated_seed` used when the user
    /// layer has no seed.
    pub fn resolve_with_seed(&self, domain: &str, generated_seed: u64) -> CliResult<ResolvedSettings> {
        let mut merged = self.load_defaults()?;
        if let Some(layer) = self.load_domain(domain)? {
            debug!(domain, "Domain settings layer found");
            merge_tables(&mut merged, layer);
        }
        let user = self.load_user()?.unwrap_or_default();
        let user_sets_seed = user.contains_key("seed");
        merge_tables(&mut merged, user);

        let mut config: GenerationConfig =
            Value::Table(merged)
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::LoadFailed {
                    path: self.config_dir.display().to_string(),
                    reason: e.to_string(),
                })?;

        let (seed, seed_source) = match config.seed {
            Some(seed) if user_sets_seed => (seed, SeedSource::User),
            _ => (generated_seed, SeedSource::Generated),
        };
        config.seed = Some(seed);

        match seed_source {
            SeedSource::User => info!(seed, "Using user seed"),
            SeedSource::Generated => info!(seed, "Random seed generated"),
        }

        Ok(ResolvedSettings {
            config,
            seed,
            seed_source,
        })
    }
}

/// Merge `over` into `base`. Nested tables merge; anything else replaces.
pub fn merge_tables(base: &mut Table, over: Table) {
    for (key, value) in over {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Seconds since the Unix epoch.
pub fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn read_table(path: &Path) -> CliResult<Option<Table>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let table = toml::from_str::<Table>(&contents).map_err(|e| ConfigError::LoadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use cadence_core::{CadenceError, OutputFormat, ProfilePreset};
    use std::fs;

    const DEFAULTS: &str = r#"
start_date = "2024-01-01"
end_date = "2024-12-31"
daily_avg_transactions = 1000
seed = 42

[batching]
max_target_rows = 4000000

[profile]
weekly_weights = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
"#;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn parse(s: &str) -> Table {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_merge_nested_tables() {
        let mut base = parse("a = 1\n[t]\nx = 1\ny = 2\n");
        merge_tables(&mut base, parse("[t]\ny = 3\nz = 4\n"));
        assert_eq!(base, parse("a = 1\n[t]\nx = 1\ny = 3\nz = 4\n"));
    }

    #[test]
    fn test_merge_replaces_arrays_and_scalars() {
        let mut base = parse("list = [1, 2, 3]\nname = \"a\"\n");
        merge_tables(&mut base, parse("list = [9]\nname = \"b\"\n"));
        assert_eq!(base, parse("list = [9]\nname = \"b\"\n"));
    }

    #[test]
    fn test_merge_scalar_over_table() {
        let mut base = parse("[t]\nx = 1\n");
        merge_tables(&mut base, parse("t = 5\n"));
        assert_eq!(base, parse("t = 5\n"));
    }

    #[test]
    fn test_layers_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DEFAULTS_FILE, DEFAULTS);
        write(
            dir.path(),
            "domains/timeline.toml",
            "daily_avg_transactions = 2000\n[profile]\npreset = \"retail\"\n",
        );
        write(
            dir.path(),
            USER_FILE,
            "daily_avg_transactions = 3000\noutput_format = \"memory\"\n",
        );

        let resolved = Settings::new(dir.path())
            .resolve_with_seed("timeline", 7)
            .unwrap();
        let config = resolved.config;
        assert_eq!(config.daily_avg_transactions, 3000);
        assert_eq!(config.output_format, OutputFormat::Memory);
        assert_eq!(config.profile.preset, Some(ProfilePreset::Retail));
        assert_eq!(config.profile.weekly_weights.as_ref().map(Vec::len), Some(7));
        assert_eq!(config.batching.max_target_rows, 4_000_000);
        assert_eq!(config.batching.min_target_rows, 500_000);
    }

    #[test]
    fn test_default_seed_is_replaced_when_user_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DEFAULTS_FILE, DEFAULTS);

        let resolved = Settings::new(dir.path())
            .resolve_with_seed("timeline", 99)
            .unwrap();
        assert_eq!(resolved.seed, 99);
        assert_eq!(resolved.seed_source, SeedSource::Generated);
        assert_eq!(resolved.config.seed, Some(99));
    }

    #[test]
    fn test_user_seed_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DEFAULTS_FILE, DEFAULTS);
        write(dir.path(), USER_FILE, "seed = 123\n");

        let resolved = Settings::new(dir.path())
            .resolve_with_seed("timeline", 99)
            .unwrap();
        assert_eq!(resolved.seed, 123);
        assert_eq!(resolved.seed_source, SeedSource::User);
    }

    #[test]
    fn test_missing_defaults_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::new(dir.path()).resolve_with_seed("timeline", 1).unwrap_err();
        assert!(matches!(
            err,
            CliError::Cadence(CadenceError::Config(ConfigError::LoadFailed { .. }))
        ));
    }

    #[test]
    fn test_malformed_layer_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DEFAULTS_FILE, DEFAULTS);
        write(dir.path(), USER_FILE, "daily_avg_transactions = [\n");

        let err = Settings::new(dir.path()).resolve_with_seed("timeline", 1).unwrap_err();
        assert!(err.to_string().contains(USER_FILE));
    }

    #[test]
    fn test_unknown_policy_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), DEFAULTS_FILE, DEFAULTS);
        write(dir.path(), USER_FILE, "[batching]\nmax_rows = 1\n");

        assert!(Settings::new(dir.path()).resolve_with_seed("timeline", 1).is_err());
    }
}
