//! ExeMeta desktop client core
//!
//! Browser login over a loopback callback, the pending upload batch, and
//! the controller that ties them together behind a command channel.

pub mod auth;
pub mod batch;
pub mod controller;
pub mod error;
pub mod intake;
pub mod services;

pub use crate::controller::{
    AppController, ClientSnapshot, Command, ControllerHandle, ControllerServices, SendReadiness,
};
pub use crate::error::{ClientError, ClientResult};

use crate::auth::{AuthServices, KeyringTokenStore, TokenStore};
use crate::batch::JsonItemSerializer;
use crate::intake::UnsupportedShortcuts;
use crate::services::{FileFactsExtractor, RemoteApi, SystemBrowser};
use exmeta_common::config::{load_toml_config, ClientConfig};
use std::path::Path;
use std::sync::Arc;

/// Load the TOML bootstrap file and resolve the effective configuration
pub fn load_config(
    cli_base_url: Option<&str>,
    config_path: Option<&Path>,
) -> ClientResult<ClientConfig> {
    let toml_config = load_toml_config(config_path)?;
    Ok(ClientConfig::resolve(cli_base_url, &toml_config))
}

/// Production wiring: OS keyring, system browser, remote API
pub fn default_services(config: &ClientConfig) -> ClientResult<ControllerServices> {
    let api = Arc::new(RemoteApi::new(config.routes.clone())?);
    let store: Arc<dyn TokenStore> = Arc::new(KeyringTokenStore::new()?);

    Ok(ControllerServices {
        auth: AuthServices {
            store,
            identity: api.clone(),
            browser: Arc::new(SystemBrowser),
        },
        transport: api,
        serializer: Arc::new(JsonItemSerializer),
        extractor: Arc::new(FileFactsExtractor),
        shortcuts: Arc::new(UnsupportedShortcuts),
    })
}
