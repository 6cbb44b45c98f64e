use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::persist::PersistOptions;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RowsmithConfig {
    pub database: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub options: PersistOptions,
}

impl RowsmithConfig {
    /// Config written by `init-config`
    pub fn starter() -> Self {
        Self {
            database: Some(default_database_path().display().to_string()),
            schema: Some("schema.toml".to_string()),
            options: PersistOptions::default(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("rowsmith.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".rowsmith").join("rowsmith.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RowsmithConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RowsmithConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RowsmithConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("rowsmith.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowsmith.toml");
        let config = RowsmithConfig {
            options: PersistOptions::new().disable_unmapped_key_warnings(),
            ..RowsmithConfig::starter()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.schema.as_deref(), Some("schema.toml"));
        assert!(!loaded.options.warn_unmapped_keys);
        assert!(loaded.options.foreign_collection_cleanup);
    }

    #[test]
    fn test_options_section_is_optional() {
        let config: RowsmithConfig = toml::from_str("database = \"app.db\"").unwrap();
        assert_eq!(config.database.as_deref(), Some("app.db"));
        assert_eq!(config.options, PersistOptions::default());
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("rowsmith.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
