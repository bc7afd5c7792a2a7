use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reportstore::SyncStatusPolicy;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Xlsx {
        data_dir: PathBuf,
        artifact_name: String,
    },
    Sheets {
        sheet_id: String,
        sheet_tab: String,
        drive_folder_id: String,
        access_token: String,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend: StoreBackend,
    pub sync_status: SyncStatusPolicy,
    pub write_timeout: Duration,
    pub body_limit_bytes: usize,
    pub diagnostics: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{port}"));

        let backend = match env_or("STORE_BACKEND", "xlsx").as_str() {
            "xlsx" => StoreBackend::Xlsx {
                data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
                artifact_name: env_or("ARTIFACT_NAME", "reportes.xlsx"),
            },
            "sheets" => StoreBackend::Sheets {
                sheet_id: get("SHEET_ID")?,
                sheet_tab: env_or("SHEET_TAB", "Hoja 1"),
                drive_folder_id: get("DRIVE_FOLDER_ID")?,
                access_token: get("GOOGLE_ACCESS_TOKEN")?,
            },
            other => bail!("STORE_BACKEND must be xlsx or sheets, got {other:?}"),
        };

        let sync_status = match env_or("SYNC_STATUS_MODE", "forced").as_str() {
            "forced" => SyncStatusPolicy::Forced(env_or("SYNC_STATUS_DEFAULT", "synced")),
            "preserve" => {
                SyncStatusPolicy::PreserveOrDefault(env_or("SYNC_STATUS_DEFAULT", "pending"))
            }
            other => bail!("SYNC_STATUS_MODE must be forced or preserve, got {other:?}"),
        };

        let write_timeout = Duration::from_secs(parse_num("WRITE_TIMEOUT_SECS", 30)?);
        let body_limit_bytes = parse_num("BODY_LIMIT_MB", 50)? as usize * 1024 * 1024;
        let diagnostics = std::env::var("ENABLE_DIAGNOSTICS")
            .ok()
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
            .unwrap_or(true);

        if write_timeout.is_zero() {
            bail!("WRITE_TIMEOUT_SECS must be greater than zero");
        }
        if let StoreBackend::Xlsx { artifact_name, .. } = &backend {
            if artifact_name.contains('/') || artifact_name.contains('\\') {
                bail!("ARTIFACT_NAME must be a bare file name");
            }
        }

        Ok(Self {
            bind_addr,
            backend,
            sync_status,
            write_timeout,
            body_limit_bytes,
            diagnostics,
        })
    }

    /// Local-file configuration with defaults; handy for tests and tooling.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            backend: StoreBackend::Xlsx {
                data_dir: data_dir.into(),
                artifact_name: "reportes.xlsx".to_string(),
            },
            sync_status: SyncStatusPolicy::default(),
            write_timeout: Duration::from_secs(30),
            body_limit_bytes: 50 * 1024 * 1024,
            diagnostics: true,
        }
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_num(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{key} must be a whole number, got {v:?}")),
        Err(_) => Ok(default),
    }
}
