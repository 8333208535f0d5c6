//! Managed HSM account settings.

use azsdk_core::client::AzureClient;
use azsdk_core::error::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};

/// Value type of a setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyVaultSettingType {
    Boolean,
    #[serde(other)]
    Unknown,
}

/// An account setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyVaultSetting {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub setting_type: Option<KeyVaultSettingType>,
}

impl KeyVaultSetting {
    /// A boolean setting.
    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
            setting_type: Some(KeyVaultSettingType::Boolean),
        }
    }

    /// The value as a boolean, if the setting is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self.setting_type {
            Some(KeyVaultSettingType::Boolean) | None => self.value.parse().ok(),
            Some(KeyVaultSettingType::Unknown) => None,
        }
    }
}

#[derive(Deserialize)]
struct SettingsList {
    #[serde(default)]
    settings: Vec<KeyVaultSetting>,
}

#[derive(Serialize)]
struct UpdateSettingBody<'a> {
    value: &'a str,
}

fn setting_path(name: &str) -> AzureResult<String> {
    if name.is_empty() || name.contains('/') {
        return Err(AzureError::Builder(format!("invalid setting name '{}'", name)));
    }
    Ok(format!("/settings/{}", name))
}

/// List all account settings.
#[tracing::instrument(name = "azsdk::keyvault::list_settings", skip(client))]
pub async fn list_settings(client: &AzureClient) -> AzureResult<Vec<KeyVaultSetting>> {
    let response = client.get("/settings").await?;
    let list: SettingsList = response.json().await?;
    Ok(list.settings)
}

/// Get a single setting.
#[tracing::instrument(name = "azsdk::keyvault::get_setting", skip(client))]
pub async fn get_setting(client: &AzureClient, name: &str) -> AzureResult<KeyVaultSetting> {
    let response = client.get(&setting_path(name)?).await?;
    Ok(response.json().await?)
}

/// Update a setting and return its new state.
#[tracing::instrument(
    name = "azsdk::keyvault::update_setting",
    skip(client, setting),
    fields(name = %setting.name)
)]
pub async fn update_setting(
    client: &AzureClient,
    setting: &KeyVaultSetting,
) -> AzureResult<KeyVaultSetting> {
    let body = UpdateSettingBody {
        value: &setting.value,
    };
    let response = client.patch_json(&setting_path(&setting.name)?, &body).await?;
    let updated: KeyVaultSetting = response.json().await?;
    tracing::debug!(value = %updated.value, "setting updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mount_challenge, setup_mock_client, TEST_BEARER};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PURGE_SETTING: &str = "AllowKeyManagementOperationsThroughARM";

    #[test]
    fn boolean_values() {
        assert_eq!(KeyVaultSetting::boolean("x", true).as_bool(), Some(true));

        let setting: KeyVaultSetting =
            serde_json::from_value(json!({"name": "x", "value": "false", "type": "boolean"})).unwrap();
        assert_eq!(setting.as_bool(), Some(false));

        let setting: KeyVaultSetting =
            serde_json::from_value(json!({"name": "x", "value": "5", "type": "integer"})).unwrap();
        assert_eq!(setting.setting_type, Some(KeyVaultSettingType::Unknown));
        assert_eq!(setting.as_bool(), None);
    }

    #[tokio::test]
    async fn list_and_get_settings() {
        let server = MockServer::start().await;
        mount_challenge(&server).await;

        Mock::given(method("GET"))
            .and(path("/settings"))
            .and(header("authorization", TEST_BEARER))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "settings": [{"name": PURGE_SETTING, "value": "false", "type": "boolean"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/settings/{}", PURGE_SETTING)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": PURGE_SETTING, "value": "false", "type": "boolean"
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);

        let all = list_settings(&client).await.expect("should list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, PURGE_SETTING);

        let one = get_setting(&client, PURGE_SETTING).await.expect("should get");
        assert_eq!(one.as_bool(), Some(false));
    }

    #[tokio::test]
    async fn update_sends_value_only() {
        let server = MockServer::start().await;
        mount_challenge(&server).await;

        Mock::given(method("PATCH"))
            .and(path(format!("/settings/{}", PURGE_SETTING)))
            .and(body_json(json!({"value": "true"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": PURGE_SETTING, "value": "true", "type": "boolean"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let updated = update_setting(&client, &KeyVaultSetting::boolean(PURGE_SETTING, true))
            .await
            .expect("should update");

        assert_eq!(updated.as_bool(), Some(true));
    }

    #[tokio::test]
    async fn unknown_setting_is_not_found() {
        let server = MockServer::start().await;
        mount_challenge(&server).await;

        Mock::given(method("GET"))
            .and(path("/settings/Nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "SettingNotFound", "message": "Setting Nope was not found"}
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = get_setting(&client, "Nope").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(get_setting(&client, "a/b").await.is_err());
    }
}
