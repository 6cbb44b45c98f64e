use crate::{emit_success, OutputMode};
use owo_colors::OwoColorize;
use rowsmith::config::{self, RowsmithConfig};
use rowsmith::document::{resolve_array, resolve_object};
use rowsmith::schema::load_schema;
use rowsmith::ui::{self, Icons};
use rowsmith::{Identity, MetadataResolver, PersistOptions, Persister, SqliteStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `ROWSMITH_QUIET=1` drops the per-row identity lines from `import`
fn is_quiet() -> bool {
    *QUIET.get_or_init(|| quiet_flag(std::env::var("ROWSMITH_QUIET").ok().as_deref()))
}

fn quiet_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Config file values, overridden by command-line flags
pub struct Settings {
    config: Option<RowsmithConfig>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = config::load_config(path)?;
        if let (Some(path), None) = (path, &config) {
            anyhow::bail!("config file {} not found", path.display());
        }
        Ok(Self { config })
    }

    pub fn options(&self) -> PersistOptions {
        self.config.as_ref().map(|c| c.options).unwrap_or_default()
    }

    pub fn schema(&self, flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
        flag.or_else(|| self.config.as_ref()?.schema.as_ref().map(PathBuf::from))
            .ok_or_else(|| anyhow::anyhow!("no schema given (use --schema or set `schema` in rowsmith.toml)"))
    }

    pub fn database(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.config.as_ref()?.database.as_ref().map(PathBuf::from))
            .unwrap_or_else(config::default_database_path)
    }
}

pub struct ImportRequest {
    pub file: PathBuf,
    pub entity: String,
    pub path: Option<String>,
    pub schema: PathBuf,
    pub database: PathBuf,
    pub options: PersistOptions,
}

fn open_store(database: &Path) -> anyhow::Result<SqliteStore> {
    config::ensure_db_dir(database)?;
    Ok(SqliteStore::open(database)?)
}

fn load_resolver(schema: &Path) -> anyhow::Result<MetadataResolver> {
    let registry = load_schema(schema)?;
    tracing::debug!("loaded {} entities from {}", registry.len(), schema.display());
    Ok(MetadataResolver::new(registry))
}

/// Pick the payload: the node at `path`, or the whole document
fn select_payload<'a>(document: &'a Value, path: Option<&str>) -> rowsmith::Result<&'a Value> {
    match path {
        None | Some("") => Ok(document),
        Some(path) => resolve_array(document, path).or_else(|_| resolve_object(document, path)),
    }
}

pub fn run_import(output_mode: OutputMode, request: &ImportRequest) -> anyhow::Result<()> {
    let started = Instant::now();
    let contents = std::fs::read_to_string(&request.file)?;
    let document: Value = serde_json::from_str(&contents)?;
    let payload = select_payload(&document, request.path.as_deref())?;

    let resolver = load_resolver(&request.schema)?;
    let store = open_store(&request.database)?;
    store.create_tables(&resolver)?;

    let persister = Persister::with_options(&store, &resolver, request.options);
    let ids: Vec<Identity> = if payload.is_array() {
        persister.persist_array(&request.entity, payload)?
    } else {
        vec![persister.persist_object(&request.entity, payload)?]
    };

    if output_mode.is_human() {
        ui::header(&format!("Imported {}", request.file.display()));
        ui::status(Icons::DATABASE, "Database", &request.database.display().to_string());
        if !request.options.foreign_collection_cleanup {
            ui::warn("stale one-to-many members were kept (--no-cleanup)");
        }
        if !is_quiet() {
            ui::section(&request.entity);
            for id in &ids {
                ui::identity_line(&request.entity, id);
            }
        }
        println!();
        ui::success(&format!("{} {} persisted", ids.len(), request.entity));
        ui::summary_row("Elapsed", &format!("{:.2?}", started.elapsed()));
    } else {
        let data = serde_json::json!({
            "entity": request.entity,
            "ids": ids,
        });
        emit_success(output_mode, "import", data)?;
    }
    Ok(())
}

pub fn run_init(output_mode: OutputMode, schema: &Path, database: &Path) -> anyhow::Result<()> {
    let resolver = load_resolver(schema)?;
    let store = open_store(database)?;
    let created = store.create_tables(&resolver)?;

    if output_mode.is_human() {
        ui::status(Icons::SCHEMA, "Schema", &schema.display().to_string());
        ui::status(Icons::DATABASE, "Database", &database.display().to_string());
        ui::success(&format!("{} tables ready", created));
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "tables": created }))?;
    }
    Ok(())
}

pub fn run_describe(output_mode: OutputMode, schema: &Path, entity: &str) -> anyhow::Result<()> {
    let resolver = load_resolver(schema)?;
    let descriptor = resolver.describe(entity)?;

    if output_mode.is_human() {
        ui::info("Entity", &descriptor.type_name.bold().to_string());
        ui::info("Table", &descriptor.table);
        let bases: Vec<&str> = descriptor.layers.iter().skip(1).map(|l| l.owner.as_str()).collect();
        if !bases.is_empty() {
            ui::info("Bases", &ui::dim(&bases.join(", ")));
        }
        println!("{}", ui::fields_table(&descriptor));
    } else {
        let fields: Vec<Value> = descriptor
            .fields()
            .map(|field| {
                serde_json::json!({
                    "name": field.name,
                    "column": field.column,
                    "map_from": field.map_from,
                    "kind": field.kind.as_str(),
                    "declared_in": field.declared_in,
                })
            })
            .collect();
        let data = serde_json::json!({
            "entity": descriptor.type_name,
            "table": descriptor.table,
            "fields": fields,
        });
        emit_success(output_mode, "describe", data)?;
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, schema: &Path, database: &Path) -> anyhow::Result<()> {
    if !database.exists() {
        anyhow::bail!("database {} does not exist (run `rowsmith init` first)", database.display());
    }
    let resolver = load_resolver(schema)?;
    let store = open_store(database)?;
    let stats = store.stats(&resolver)?;
    tracing::debug!("{}", stats);

    if output_mode.is_human() {
        println!("{} Rowsmith Statistics {}", Icons::STATS, ui::muted(&format!("({})", database.display())));
        println!("{}", ui::stats_table(&stats.tables));
        ui::summary_row("Total rows", &stats.total_rows().to_string());
    } else {
        let tables: serde_json::Map<String, Value> = stats
            .tables
            .iter()
            .map(|(table, rows)| (table.clone(), Value::from(*rows)))
            .collect();
        let data = serde_json::json!({
            "tables": tables,
            "total": stats.total_rows(),
        });
        emit_success(output_mode, "stats", data)?;
    }
    Ok(())
}

pub fn run_init_config(output_mode: OutputMode, path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    config::write_config(&path, &RowsmithConfig::starter(), force)?;

    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", path.display()));
        ui::summary_row("Next", "point `schema` at your schema file and run `rowsmith init`");
    } else {
        emit_success(output_mode, "init-config", serde_json::json!({ "path": path.display().to_string() }))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_flag_values() {
        assert!(quiet_flag(Some("1")));
        assert!(quiet_flag(Some("TRUE")));
        assert!(!quiet_flag(Some("0")));
        assert!(!quiet_flag(None));
    }

    #[test]
    fn test_select_payload_falls_back_to_object() {
        let document = serde_json::json!({ "data": { "users": [{ "id": 1 }], "owner": { "id": 2 } } });
        assert!(select_payload(&document, Some("data.users")).unwrap().is_array());
        assert!(select_payload(&document, Some("data.owner")).unwrap().is_object());
        assert_eq!(select_payload(&document, None).unwrap(), &document);
    }
}
