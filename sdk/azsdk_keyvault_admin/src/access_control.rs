//! Role-based access control for Managed HSM.
//!
//! Role definitions describe a set of permitted data actions; role
//! assignments bind a definition to a principal at a scope.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsdk_keyvault_admin::access_control::{
//!     self, KeyVaultPermission, KeyVaultRoleAssignmentCreateRequest, KeyVaultRoleDefinitionRequest,
//!     KeyVaultRoleScope,
//! };
//! # use azsdk_core::client::AzureClient;
//!
//! # async fn example(client: &AzureClient) -> azsdk_core::AzureResult<()> {
//! let request = KeyVaultRoleDefinitionRequest::builder()
//!     .role_name("Key reader")
//!     .permission(KeyVaultPermission::default().data_action("Microsoft.KeyVault/managedHsm/keys/read/action"))
//!     .assignable_scope(KeyVaultRoleScope::Keys)
//!     .build()?;
//! let definition = access_control::set_role_definition(client, &KeyVaultRoleScope::Global, &request).await?;
//!
//! let assignment = KeyVaultRoleAssignmentCreateRequest::builder()
//!     .role_definition_id(&definition.id)
//!     .principal_id("4871f6a6-374f-4b6b-8b0c-f5d84db823f6")
//!     .build()?;
//! access_control::create_role_assignment(client, &KeyVaultRoleScope::Keys, &assignment).await?;
//! # Ok(())
//! # }
//! ```

use azsdk_core::client::AzureClient;
use azsdk_core::error::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Scope at which roles are defined and assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyVaultRoleScope {
    /// The whole HSM (`/`).
    Global,
    /// All keys (`/keys`).
    Keys,
    /// Any other scope, e.g. `/keys/my-key`.
    Custom(String),
}

impl KeyVaultRoleScope {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => "/",
            Self::Keys => "/keys",
            Self::Custom(scope) => scope,
        }
    }
}

impl From<String> for KeyVaultRoleScope {
    fn from(scope: String) -> Self {
        match scope.as_str() {
            "/" => Self::Global,
            "/keys" => Self::Keys,
            _ if scope.starts_with('/') => Self::Custom(scope),
            _ => Self::Custom(format!("/{}", scope)),
        }
    }
}

impl From<&str> for KeyVaultRoleScope {
    fn from(scope: &str) -> Self {
        Self::from(scope.to_string())
    }
}

impl From<KeyVaultRoleScope> for String {
    fn from(scope: KeyVaultRoleScope) -> Self {
        scope.as_str().to_string()
    }
}

impl fmt::Display for KeyVaultRoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role definitions
// ---------------------------------------------------------------------------

/// Whether a role ships with the service or was defined by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyVaultRoleType {
    #[serde(rename = "AKVBuiltInRole")]
    BuiltIn,
    #[serde(rename = "CustomRole")]
    Custom,
}

/// Actions a role allows or denies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultPermission {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub not_actions: Vec<String>,
    #[serde(default)]
    pub data_actions: Vec<String>,
    #[serde(default)]
    pub not_data_actions: Vec<String>,
}

impl KeyVaultPermission {
    /// Allow a data action such as `Microsoft.KeyVault/managedHsm/keys/read/action`.
    pub fn data_action(mut self, action: impl Into<String>) -> Self {
        self.data_actions.push(action.into());
        self
    }

    /// Deny a data action.
    pub fn not_data_action(mut self, action: impl Into<String>) -> Self {
        self.not_data_actions.push(action.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty()
            && self.not_actions.is_empty()
            && self.data_actions.is_empty()
            && self.not_data_actions.is_empty()
    }
}

/// Properties of a role definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultRoleDefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub role_type: Option<KeyVaultRoleType>,
    #[serde(default)]
    pub permissions: Vec<KeyVaultPermission>,
    #[serde(default)]
    pub assignable_scopes: Vec<KeyVaultRoleScope>,
}

/// A role definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyVaultRoleDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: KeyVaultRoleDefinitionProperties,
}

impl KeyVaultRoleDefinition {
    pub fn role_name(&self) -> Option<&str> {
        self.properties.role_name.as_deref()
    }

    pub fn role_type(&self) -> Option<KeyVaultRoleType> {
        self.properties.role_type
    }

    pub fn permissions(&self) -> &[KeyVaultPermission] {
        &self.properties.permissions
    }

    pub fn assignable_scopes(&self) -> &[KeyVaultRoleScope] {
        &self.properties.assignable_scopes
    }
}

/// A request to create or update a custom role definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultRoleDefinitionRequest {
    /// Definition name; a GUID.
    pub name: String,
    pub properties: KeyVaultRoleDefinitionProperties,
}

impl KeyVaultRoleDefinitionRequest {
    pub fn builder() -> KeyVaultRoleDefinitionRequestBuilder {
        KeyVaultRoleDefinitionRequestBuilder::default()
    }
}

/// Builder for [`KeyVaultRoleDefinitionRequest`].
#[derive(Debug, Default)]
pub struct KeyVaultRoleDefinitionRequestBuilder {
    name: Option<String>,
    role_name: Option<String>,
    description: Option<String>,
    permissions: Vec<KeyVaultPermission>,
    assignable_scopes: Vec<KeyVaultRoleScope>,
}

impl KeyVaultRoleDefinitionRequestBuilder {
    /// Definition name. Must be a GUID; a new one is generated if unset.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name of the role.
    pub fn role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn permission(mut self, permission: KeyVaultPermission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn assignable_scope(mut self, scope: impl Into<KeyVaultRoleScope>) -> Self {
        self.assignable_scopes.push(scope.into());
        self
    }

    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns [`AzureError::Builder`] if the name is not a GUID or a
    /// permission entry is empty.
    pub fn build(self) -> AzureResult<KeyVaultRoleDefinitionRequest> {
        let name = match self.name {
            Some(name) => {
                Uuid::parse_str(&name).map_err(|_| {
                    AzureError::Builder(format!("role definition name '{}' is not a GUID", name))
                })?;
                name
            }
            None => Uuid::new_v4().to_string(),
        };

        if self.permissions.iter().any(KeyVaultPermission::is_empty) {
            return Err(AzureError::Builder(
                "permission entries must contain at least one action".into(),
            ));
        }

        Ok(KeyVaultRoleDefinitionRequest {
            name,
            properties: KeyVaultRoleDefinitionProperties {
                role_name: self.role_name,
                description: self.description,
                role_type: Some(KeyVaultRoleType::Custom),
                permissions: self.permissions,
                assignable_scopes: self.assignable_scopes,
            },
        })
    }
}

#[derive(Serialize)]
struct PropertiesEnvelope<'a, T> {
    properties: &'a T,
}

// ---------------------------------------------------------------------------
// Role assignments
// ---------------------------------------------------------------------------

/// Properties of a role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultRoleAssignmentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<KeyVaultRoleScope>,
    pub role_definition_id: String,
    pub principal_id: String,
}

/// A role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyVaultRoleAssignment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub properties: KeyVaultRoleAssignmentProperties,
}

/// A request to assign a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultRoleAssignmentCreateRequest {
    /// Assignment name; a GUID.
    pub name: String,
    pub role_definition_id: String,
    pub principal_id: String,
}

impl KeyVaultRoleAssignmentCreateRequest {
    pub fn builder() -> KeyVaultRoleAssignmentCreateRequestBuilder {
        KeyVaultRoleAssignmentCreateRequestBuilder::default()
    }
}

/// Builder for [`KeyVaultRoleAssignmentCreateRequest`].
#[derive(Debug, Default)]
pub struct KeyVaultRoleAssignmentCreateRequestBuilder {
    name: Option<String>,
    role_definition_id: Option<String>,
    principal_id: Option<String>,
}

impl KeyVaultRoleAssignmentCreateRequestBuilder {
    /// Assignment name. A new GUID is generated if unset.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// **Required.** Full ID of the role definition to assign.
    pub fn role_definition_id(mut self, id: impl Into<String>) -> Self {
        self.role_definition_id = Some(id.into());
        self
    }

    /// **Required.** Object ID of the user, group, or service principal.
    pub fn principal_id(mut self, id: impl Into<String>) -> Self {
        self.principal_id = Some(id.into());
        self
    }

    pub fn build(self) -> AzureResult<KeyVaultRoleAssignmentCreateRequest> {
        let role_definition_id = self
            .role_definition_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AzureError::Builder("role_definition_id is required".into()))?;
        let principal_id = self
            .principal_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AzureError::Builder("principal_id is required".into()))?;

        Ok(KeyVaultRoleAssignmentCreateRequest {
            name: self.name.unwrap_or_else(|| Uuid::new_v4().to_string()),
            role_definition_id,
            principal_id,
        })
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

const ROLE_DEFINITIONS: &str = "roleDefinitions";
const ROLE_ASSIGNMENTS: &str = "roleAssignments";

fn scoped_path(scope: &KeyVaultRoleScope, collection: &str, name: Option<&str>) -> AzureResult<String> {
    let mut path = format!(
        "{}/providers/Microsoft.Authorization/{}",
        scope.as_str().trim_end_matches('/'),
        collection
    );
    if let Some(name) = name {
        if name.is_empty() || name.contains('/') {
            return Err(AzureError::Builder(format!("invalid name '{}'", name)));
        }
        path.push('/');
        path.push_str(name);
    }
    Ok(path)
}

/// Treat a missing resource as already deleted.
fn ignore_not_found(result: AzureResult<reqwest::Response>) -> AzureResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            tracing::debug!("resource already absent");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// List role definitions at a scope.
///
/// # Tracing
///
/// Emits a span named `azsdk::keyvault::list_role_definitions` with field `scope`.
#[tracing::instrument(name = "azsdk::keyvault::list_role_definitions", skip(client), fields(scope = %scope))]
pub async fn list_role_definitions(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
) -> AzureResult<Vec<KeyVaultRoleDefinition>> {
    let definitions: Vec<KeyVaultRoleDefinition> =
        client.list_all(&scoped_path(scope, ROLE_DEFINITIONS, None)?).await?;
    tracing::debug!(count = definitions.len(), "listed role definitions");
    Ok(definitions)
}

/// Get a role definition by name.
#[tracing::instrument(name = "azsdk::keyvault::get_role_definition", skip(client), fields(scope = %scope))]
pub async fn get_role_definition(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
    name: &str,
) -> AzureResult<KeyVaultRoleDefinition> {
    let response = client.get(&scoped_path(scope, ROLE_DEFINITIONS, Some(name))?).await?;
    Ok(response.json().await?)
}

/// Create or update a custom role definition.
#[tracing::instrument(
    name = "azsdk::keyvault::set_role_definition",
    skip(client, request),
    fields(scope = %scope, name = %request.name)
)]
pub async fn set_role_definition(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
    request: &KeyVaultRoleDefinitionRequest,
) -> AzureResult<KeyVaultRoleDefinition> {
    let path = scoped_path(scope, ROLE_DEFINITIONS, Some(&request.name))?;
    let body = PropertiesEnvelope {
        properties: &request.properties,
    };
    let response = client.put_json(&path, &body).await?;
    let definition: KeyVaultRoleDefinition = response.json().await?;
    tracing::debug!(id = %definition.id, "role definition saved");
    Ok(definition)
}

/// Delete a role definition. Deleting one that does not exist succeeds.
#[tracing::instrument(name = "azsdk::keyvault::delete_role_definition", skip(client), fields(scope = %scope))]
pub async fn delete_role_definition(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
    name: &str,
) -> AzureResult<()> {
    let path = scoped_path(scope, ROLE_DEFINITIONS, Some(name))?;
    ignore_not_found(client.delete(&path).await)
}

/// List role assignments at a scope.
#[tracing::instrument(name = "azsdk::keyvault::list_role_assignments", skip(client), fields(scope = %scope))]
pub async fn list_role_assignments(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
) -> AzureResult<Vec<KeyVaultRoleAssignment>> {
    client.list_all(&scoped_path(scope, ROLE_ASSIGNMENTS, None)?).await
}

/// Get a role assignment by name.
#[tracing::instrument(name = "azsdk::keyvault::get_role_assignment", skip(client), fields(scope = %scope))]
pub async fn get_role_assignment(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
    name: &str,
) -> AzureResult<KeyVaultRoleAssignment> {
    let response = client.get(&scoped_path(scope, ROLE_ASSIGNMENTS, Some(name))?).await?;
    Ok(response.json().await?)
}

/// Assign a role to a principal.
///
/// # Errors
///
/// Returns [`AzureError::ResourceExists`] if an assignment with the same
/// name already exists.
#[tracing::instrument(
    name = "azsdk::keyvault::create_role_assignment",
    skip(client, request),
    fields(scope = %scope, name = %request.name)
)]
pub async fn create_role_assignment(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
    request: &KeyVaultRoleAssignmentCreateRequest,
) -> AzureResult<KeyVaultRoleAssignment> {
    let path = scoped_path(scope, ROLE_ASSIGNMENTS, Some(&request.name))?;
    let body = serde_json::json!({
        "properties": {
            "roleDefinitionId": request.role_definition_id,
            "principalId": request.principal_id,
        }
    });
    let response = client.put_json(&path, &body).await?;
    Ok(response.json().await?)
}

/// Remove a role assignment. Deleting one that does not exist succeeds.
#[tracing::instrument(name = "azsdk::keyvault::delete_role_assignment", skip(client), fields(scope = %scope))]
pub async fn delete_role_assignment(
    client: &AzureClient,
    scope: &KeyVaultRoleScope,
    name: &str,
) -> AzureResult<()> {
    let path = scoped_path(scope, ROLE_ASSIGNMENTS, Some(name))?;
    ignore_not_found(client.delete(&path).await)
}
