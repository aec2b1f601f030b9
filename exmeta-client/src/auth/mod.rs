//! Browser login, loopback callback and session lifecycle

pub mod callback;
pub mod login;
pub mod manager;
pub mod port;
pub mod session;
pub mod token_store;
pub mod waiter;

pub use callback::{await_callback, extract_token, CallbackError, CallbackListener};
pub use login::{AuthError, AuthEvent, LoginFlow, LoginResult};
pub use manager::{AuthServices, AuthSessionManager, AuthSettings, LoginReport, LoginStart};
pub use port::{allocate_port, PortError};
pub use session::{AuthSession, ValidatedLogin};
pub use token_store::{KeyringTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use waiter::{AuthGate, LoginWaiter};
