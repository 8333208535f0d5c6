//! Full backup and restore of a Managed HSM.
//!
//! Both are long-running operations: `begin_*` starts the job and returns its
//! first status, `get_*_status` reads the current status, and
//! [`poll_until_complete`] waits for a terminal state.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsdk_keyvault_admin::backup::{self, BackupStorageCredential, OperationKind};
//! use std::time::Duration;
//! # use azsdk_core::client::AzureClient;
//!
//! # async fn example(client: &AzureClient) -> azsdk_core::AzureResult<()> {
//! let credential = BackupStorageCredential::sas("sv=2022-11-02&sr=c&sig=...");
//! let started = backup::begin_backup(
//!     client,
//!     "https://myaccount.blob.core.windows.net/backups",
//!     &credential,
//! )
//! .await?;
//!
//! let done = backup::poll_until_complete(
//!     client,
//!     OperationKind::Backup,
//!     &started.job_id,
//!     Duration::from_secs(5),
//! )
//! .await?;
//!
//! // The folder URL is what a later restore needs.
//! println!("backup written to {:?}", done.azure_storage_blob_container_uri);
//! # Ok(())
//! # }
//! ```

use azsdk_core::client::AzureClient;
use azsdk_core::error::{AzureError, AzureResult};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::models::KeyVaultErrorDetail;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the HSM authenticates to the storage container.
#[derive(Clone)]
pub enum BackupStorageCredential {
    /// A SAS token for the container.
    Sas(SecretString),
    /// The HSM's managed identity.
    ManagedIdentity,
}

impl BackupStorageCredential {
    pub fn sas(token: impl Into<String>) -> Self {
        Self::Sas(SecretString::from(token.into().trim_start_matches('?').to_string()))
    }
}

impl std::fmt::Debug for BackupStorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sas(_) => f.write_str("Sas([REDACTED])"),
            Self::ManagedIdentity => f.write_str("ManagedIdentity"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SasTokenParameters<'a> {
    storage_resource_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    use_managed_identity: bool,
}

impl<'a> SasTokenParameters<'a> {
    fn new(storage_resource_uri: &'a str, credential: &'a BackupStorageCredential) -> Self {
        match credential {
            BackupStorageCredential::Sas(token) => Self {
                storage_resource_uri,
                token: Some(token.expose_secret()),
                use_managed_identity: false,
            },
            BackupStorageCredential::ManagedIdentity => Self {
                storage_resource_uri,
                token: None,
                use_managed_identity: true,
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreBody<'a> {
    sas_token_parameters: SasTokenParameters<'a>,
    folder_to_restore: &'a str,
}

/// Which long-running operation a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Backup,
    Restore,
}

impl OperationKind {
    fn status_path(&self, job_id: &str) -> String {
        match self {
            Self::Backup => format!("/backup/{}/pending", job_id),
            Self::Restore => format!("/restore/{}/pending", job_id),
        }
    }
}

/// Status of a backup or restore job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// Whether the job has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// State of a backup or restore job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultOperation {
    pub status: OperationStatus,
    #[serde(default)]
    pub status_details: Option<String>,
    #[serde(default)]
    pub error: Option<KeyVaultErrorDetail>,
    pub job_id: String,
    /// Unix seconds.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub end_time: Option<i64>,
    /// Folder holding the backup (backup jobs only).
    #[serde(default)]
    pub azure_storage_blob_container_uri: Option<String>,
}

impl KeyVaultOperation {
    /// Convert a failed or canceled job into an error.
    fn into_result(self) -> AzureResult<Self> {
        match self.status {
            OperationStatus::Failed | OperationStatus::Canceled => {
                let (code, message) = match self.error {
                    Some(detail) => (detail.code, detail.message),
                    None => (None, None),
                };
                Err(AzureError::Api {
                    code: code.unwrap_or_else(|| format!("{:?}", self.status)),
                    message: message
                        .or(self.status_details)
                        .unwrap_or_else(|| format!("job {} did not succeed", self.job_id)),
                })
            }
            _ => Ok(self),
        }
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

fn validate_job_id(job_id: &str) -> AzureResult<()> {
    if job_id.is_empty() || job_id.contains('/') {
        return Err(AzureError::Builder(format!("invalid job id '{}'", job_id)));
    }
    Ok(())
}

/// Split a backup folder URL into its container URL and folder name.
fn split_folder_url(folder_url: &str) -> AzureResult<(String, String)> {
    let invalid = || {
        AzureError::Builder(format!(
            "'{}' is not a backup folder URL (expected https://<account>/<container>/<folder>)",
            folder_url
        ))
    };

    let mut url = Url::parse(folder_url.trim_end_matches('/')).map_err(|_| invalid())?;
    let folder = match url.path_segments().map(|s| s.collect::<Vec<_>>()) {
        Some(segments) if segments.len() >= 2 && segments.iter().all(|s| !s.is_empty()) => {
            segments[segments.len() - 1].to_string()
        }
        _ => return Err(invalid()),
    };
    url.path_segments_mut().map_err(|_| invalid())?.pop();
    Ok((url.to_string(), folder))
}

/// Start a full backup into a blob container.
///
/// # Tracing
///
/// Emits a span named `azsdk::keyvault::begin_backup`.
#[tracing::instrument(name = "azsdk::keyvault::begin_backup", skip(client, credential))]
pub async fn begin_backup(
    client: &AzureClient,
    container_url: &str,
    credential: &BackupStorageCredential,
) -> AzureResult<KeyVaultOperation> {
    let body = SasTokenParameters::new(container_url, credential);
    let response = client.post_json("/backup", &body).await?;
    let operation: KeyVaultOperation = response.json().await?;
    tracing::debug!(job_id = %operation.job_id, status = ?operation.status, "backup started");
    Ok(operation)
}

/// Read the status of a backup job.
#[tracing::instrument(name = "azsdk::keyvault::get_backup_status", skip(client))]
pub async fn get_backup_status(client: &AzureClient, job_id: &str) -> AzureResult<KeyVaultOperation> {
    get_status(client, OperationKind::Backup, job_id).await
}

/// Start a full restore from a backup folder.
///
/// `folder_url` is the folder a backup job reported in
/// `azure_storage_blob_container_uri`.
#[tracing::instrument(name = "azsdk::keyvault::begin_restore", skip(client, credential))]
pub async fn begin_restore(
    client: &AzureClient,
    folder_url: &str,
    credential: &BackupStorageCredential,
) -> AzureResult<KeyVaultOperation> {
    let (container_url, folder) = split_folder_url(folder_url)?;
    let body = RestoreBody {
        sas_token_parameters: SasTokenParameters::new(&container_url, credential),
        folder_to_restore: &folder,
    };
    let response = client.put_json("/restore", &body).await?;
    let operation: KeyVaultOperation = response.json().await?;
    tracing::debug!(job_id = %operation.job_id, status = ?operation.status, "restore started");
    Ok(operation)
}

/// Read the status of a restore job.
#[tracing::instrument(name = "azsdk::keyvault::get_restore_status", skip(client))]
pub async fn get_restore_status(client: &AzureClient, job_id: &str) -> AzureResult<KeyVaultOperation> {
    get_status(client, OperationKind::Restore, job_id).await
}

async fn get_status(
    client: &AzureClient,
    kind: OperationKind,
    job_id: &str,
) -> AzureResult<KeyVaultOperation> {
    validate_job_id(job_id)?;
    let response = client.get(&kind.status_path(job_id)).await?;
    Ok(response.json().await?)
}

/// Poll a job until it stops.
///
/// # Errors
///
/// A job that ends `Failed` or `Canceled` is returned as
/// [`AzureError::Api`] carrying the service's error code and message.
#[tracing::instrument(
    name = "azsdk::keyvault::poll_until_complete",
    skip(client),
    fields(job_id = %job_id)
)]
pub async fn poll_until_complete(
    client: &AzureClient,
    kind: OperationKind,
    job_id: &str,
    poll_interval: Duration,
) -> AzureResult<KeyVaultOperation> {
    loop {
        let operation = get_status(client, kind, job_id).await?;

        if operation.status.is_terminal() {
            tracing::debug!(status = ?operation.status, "job reached terminal state");
            return operation.into_result();
        }

        tracing::trace!(status = ?operation.status, "job still running");
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mount_challenge, setup_mock_client};
    use serde_json::json;
    use tracing_test::traced_test;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONTAINER: &str = "https://acct.blob.core.windows.net/backups";
    const FOLDER: &str = "https://acct.blob.core.windows.net/backups/mhsm-test-2024010203040506";

    #[test]
    fn folder_url_split() {
        assert_eq!(
            split_folder_url(FOLDER).unwrap(),
            (CONTAINER.to_string(), "mhsm-test-2024010203040506".to_string())
        );
        assert_eq!(
            split_folder_url(&format!("{}/", FOLDER)).unwrap().1,
            "mhsm-test-2024010203040506"
        );
        assert!(split_folder_url(CONTAINER).is_err());
        assert!(split_folder_url("backups").is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let debug = format!("{:?}", BackupStorageCredential::sas("?sig=secret"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn failed_job_becomes_api_error() {
        let operation: KeyVaultOperation = serde_json::from_value(json!({
            "status": "Failed",
            "jobId": "j1",
            "error": {"code": "StorageAccessDenied", "message": "SAS token expired"}
        }))
        .unwrap();

        match operation.into_result().unwrap_err() {
            AzureError::Api { code, message } => {
                assert_eq!(code, "StorageAccessDenied");
                assert_eq!(message, "SAS token expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn backup_then_poll_to_success() {
        let server = MockServer::start().await;
        mount_challenge(&server).await;

        Mock::given(method("POST"))
            .and(path("/backup"))
            .and(body_json(json!({
                "storageResourceUri": CONTAINER,
                "token": "sv=1&sig=abc",
                "useManagedIdentity": false
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "status": "InProgress", "jobId": "job-1", "startTime": 1700000000
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/backup/job-1/pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "InProgress", "jobId": "job-1"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/backup/job-1/pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Succeeded",
                "jobId": "job-1",
                "endTime": 1700000060,
                "azureStorageBlobContainerUri": FOLDER
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let started = begin_backup(&client, CONTAINER, &BackupStorageCredential::sas("?sv=1&sig=abc"))
            .await
            .expect("should start");
        assert_eq!(started.status, OperationStatus::InProgress);

        let done = poll_until_complete(&client, OperationKind::Backup, &started.job_id, Duration::from_millis(1))
            .await
            .expect("should succeed");

        assert_eq!(done.status, OperationStatus::Succeeded);
        assert_eq!(done.azure_storage_blob_container_uri.as_deref(), Some(FOLDER));
        assert_eq!(done.end_time, Some(1700000060));
        assert!(logs_contain("backup started"));
        assert!(logs_contain("job reached terminal state"));
    }

    #[tokio::test]
    async fn restore_with_managed_identity_fails() {
        let server = MockServer::start().await;
        mount_challenge(&server).await;

        Mock::given(method("PUT"))
            .and(path("/restore"))
            .and(body_json(json!({
                "sasTokenParameters": {"storageResourceUri": CONTAINER, "useManagedIdentity": true},
                "folderToRestore": "mhsm-test-2024010203040506"
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "status": "InProgress", "jobId": "r-1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/restore/r-1/pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "jobId": "r-1",
                "statusDetails": "Restore failed",
                "error": {"code": "InvalidBackup", "message": "backup folder is incomplete"}
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let started = begin_restore(&client, FOLDER, &BackupStorageCredential::ManagedIdentity)
            .await
            .expect("should start");

        let status = get_restore_status(&client, &started.job_id).await.unwrap();
        assert_eq!(status.status, OperationStatus::Failed);

        let err = poll_until_complete(&client, OperationKind::Restore, "r-1", Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AzureError::Api { ref code, .. } if code == "InvalidBackup"));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let server = MockServer::start().await;
        mount_challenge(&server).await;

        Mock::given(method("GET"))
            .and(path("/backup/missing/pending"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "JobNotFound", "message": "no such job"}
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = get_backup_status(&client, "missing").await.unwrap_err();

        assert!(err.is_not_found());
    }
}
