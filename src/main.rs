pub mod config;
pub mod db {
    pub mod error;
    pub mod models;
}
pub mod models {
    pub mod requests;
}
pub mod schema;
pub mod services {
    pub mod audit;
    pub mod devices;
    pub mod guards;
    pub mod integrity;
    pub mod measurements;
    pub mod residents;
    pub mod structure;
    pub mod tags;
    pub mod tasks;
}

use crate::config::Config;
use crate::services::integrity;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{error, info};
use std::path::{Path, PathBuf};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

pub fn run() -> Result<(), String> {
    let cfg = Config::from_env()?;
    info!("Config loaded (integrity_audit_enabled={})", cfg.integrity_audit_enabled);

    let mut conn = PgConnection::establish(&cfg.database_url)
        .map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    apply_database_migrations(&mut conn)?;

    if cfg.integrity_audit_enabled {
        let report = integrity::run_audit(&mut conn)
            .map_err(|e| format!("integrity audit failed: {}", e))?;
        integrity::log_report(&report);
        if !report.is_clean() {
            return Err(format!(
                "integrity audit found {} issue(s)",
                report.finding_count()
            ));
        }
    } else {
        info!("Integrity audit disabled via INTEGRITY_AUDIT_ENABLED=0");
    }

    Ok(())
}

fn configure_env_from_cli() -> Result<Option<PathBuf>, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut env_file: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                env_file = Some(PathBuf::from(value));
            }
            Some(s) if s.starts_with("--env-file=") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                env_file = Some(PathBuf::from(path_str));
            }
            Some("--") => break,
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    if let Some(path) = env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        Ok(Some(path))
    } else {
        let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
        let default_path = cwd.join(".env");
        if default_path.is_file() {
            load_env_file(&default_path)?;
            Ok(Some(default_path))
        } else {
            Ok(None)
        }
    }
}

fn load_env_file(path: &Path) -> Result<(), String> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read {} at line {}: {}", path.display(), index + 1, e))?;
        match parse_env_assignment(&line) {
            Ok(Some((key, value))) => {
                // Values already present in the process environment win.
                if std::env::var_os(&key).is_none() {
                    // Updating process-level environment variables is unsafe on some targets.
                    unsafe {
                        std::env::set_var(key, value);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                return Err(format!("{}:{}: {}", path.display(), index + 1, e));
            }
        }
    }

    Ok(())
}

fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let without_export = trimmed
        .strip_prefix("export ")
        .map(|s| s.trim_start())
        .unwrap_or(trimmed);

    let mut parts = without_export.splitn(2, '=');
    let key = parts
        .next()
        .map(str::trim)
        .ok_or_else(|| "missing environment variable name".to_string())?;
    let value_part = parts.next().ok_or_else(|| "missing '=' in assignment".to_string())?;

    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(|c| c.is_whitespace()) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let trimmed_value = value_part.trim();
    let value = if let Some(inner) = trimmed_value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        inner.to_string()
    } else if let Some(inner) = trimmed_value
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
    {
        inner.to_string()
    } else {
        trimmed_value
            .splitn(2, '#')
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string()
    };

    Ok(Some((key.to_string(), value)))
}

fn main() {
    let loaded_env = match configure_env_from_cli() {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(path) = loaded_env.as_ref() {
        info!("Environment loaded from .env file: {}", path.display());
    }

    info!(
        "residences-core {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert_eq!(parse_env_assignment(""), Ok(None));
        assert_eq!(parse_env_assignment("  # comment"), Ok(None));
    }

    #[test]
    fn plain_assignment_parses() {
        assert_eq!(
            parse_env_assignment("DATABASE_URL=postgres://x"),
            Ok(Some(("DATABASE_URL".to_string(), "postgres://x".to_string())))
        );
    }

    #[test]
    fn quoted_values_keep_inner_text() {
        assert_eq!(
            parse_env_assignment("A=\"hello world\""),
            Ok(Some(("A".to_string(), "hello world".to_string())))
        );
        assert_eq!(
            parse_env_assignment("B='x # not a comment'"),
            Ok(Some(("B".to_string(), "x # not a comment".to_string())))
        );
    }

    #[test]
    fn unquoted_trailing_comment_is_stripped() {
        assert_eq!(
            parse_env_assignment("C=value # note"),
            Ok(Some(("C".to_string(), "value".to_string())))
        );
    }

    #[test]
    fn export_prefix_is_accepted() {
        assert_eq!(
            parse_env_assignment("export D=1"),
            Ok(Some(("D".to_string(), "1".to_string())))
        );
    }

    #[test]
    fn missing_equals_is_an_error() {
        assert!(parse_env_assignment("JUSTAKEY").is_err());
    }
}
