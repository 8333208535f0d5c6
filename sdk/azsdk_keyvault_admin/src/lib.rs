//! # azsdk_keyvault_admin
//!
//! Administration of Azure Key Vault and Managed HSM.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azsdk_core::auth::AzureCredential;
//! use azsdk_keyvault_admin::access_control::{self, KeyVaultRoleScope};
//! use azsdk_keyvault_admin::models::keyvault_client_builder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = keyvault_client_builder("https://myhsm.managedhsm.azure.net")
//!         .credential(AzureCredential::developer_tools()?)
//!         .build()?;
//!
//!     for role in access_control::list_role_definitions(&client, &KeyVaultRoleScope::Global).await? {
//!         println!("{} {:?}", role.name, role.role_name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`access_control`] - Role definitions and role assignments
//! - [`settings`] - Account settings
//! - [`backup`] - Full backup and restore
//!
//! Every request authenticates through a bearer challenge: the first request
//! to a vault learns the token audience from `WWW-Authenticate` and later
//! requests reuse it.

pub mod access_control;
pub mod backup;
pub mod models;
pub mod settings;
