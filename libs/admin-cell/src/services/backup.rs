use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use tokio::fs;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{AdminError, BackupInfo, BackupReport};

const FILE_PREFIX: &str = "medibook-";
const FILE_EXTENSION: &str = ".dump";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// `pg_dump` snapshots in custom format, named by creation time.
#[cfg_attr(test, derive(Debug))]
pub struct BackupService {
    database_url: String,
    backup_dir: PathBuf,
    retention_days: i64,
    pg_dump: String,
}

impl BackupService {
    pub fn new(config: &AppConfig) -> Result<Self, AdminError> {
        if !config.is_backup_configured() {
            return Err(AdminError::BackupNotConfigured);
        }
        Ok(Self {
            database_url: config.database_url.clone(),
            backup_dir: PathBuf::from(&config.backup_dir),
            retention_days: config.backup_retention_days,
            pg_dump: "pg_dump".to_string(),
        })
    }

    /// Overrides the `pg_dump` executable.
    pub fn with_pg_dump(mut self, program: impl Into<String>) -> Self {
        self.pg_dump = program.into();
        self
    }

    pub fn file_name_for(created_at: DateTime<Utc>) -> String {
        format!("{}{}{}", FILE_PREFIX, created_at.format(TIMESTAMP_FORMAT), FILE_EXTENSION)
    }

    pub fn parse_file_name(file_name: &str) -> Option<DateTime<Utc>> {
        let stamp = file_name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXTENSION)?;
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    #[instrument(skip(self))]
    pub async fn create_backup(&self) -> Result<BackupReport, AdminError> {
        fs::create_dir_all(&self.backup_dir).await?;

        let created_at = Utc::now();
        let file_name = Self::file_name_for(created_at);
        let path = self.backup_dir.join(&file_name);

        let output = Command::new(&self.pg_dump)
            .arg("--format=custom")
            .arg("--no-owner")
            .arg(format!("--file={}", path.display()))
            .arg(&self.database_url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AdminError::BackupFailed(format!("could not run {}: {}", self.pg_dump, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("pg_dump exited with {}: {}", output.status, stderr);
            remove_partial(&path).await;
            return Err(AdminError::BackupFailed(stderr));
        }

        let size_bytes = fs::metadata(&path).await?.len();
        info!("Backup {} written ({} bytes)", file_name, size_bytes);

        let pruned = self.prune(created_at).await?;
        Ok(BackupReport {
            backup: BackupInfo {
                file_name,
                size_bytes,
                created_at,
            },
            pruned,
        })
    }

    /// Newest first. Files not named like backups are skipped.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, AdminError> {
        let mut backups = Vec::new();

        let mut entries = match fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(created_at) = Self::parse_file_name(&file_name) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                file_name,
                size_bytes: metadata.len(),
                created_at,
            });
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Deletes backups older than the retention period as of `now`.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<usize, AdminError> {
        let cutoff = now - Duration::days(self.retention_days);
        let mut removed = 0;

        for backup in self.list_backups().await? {
            if backup.created_at >= cutoff {
                continue;
            }
            match fs::remove_file(self.backup_dir.join(&backup.file_name)).await {
                Ok(()) => {
                    info!("Pruned backup {}", backup.file_name);
                    removed += 1;
                }
                Err(e) => warn!("Failed to prune backup {}: {}", backup.file_name, e),
            }
        }
        Ok(removed)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial backup {}: {}", path.display(), e);
        }
    }
}
