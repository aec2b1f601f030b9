//! External collaborators: remote API, browser, metadata extraction

pub mod api_client;
pub mod browser;
pub mod file_facts;
pub mod identity;

pub use api_client::{ApiError, RemoteApi, UploadResponse};
pub use browser::{BrowserLauncher, SystemBrowser};
pub use file_facts::FileFactsExtractor;
pub use identity::IdentityProvider;
