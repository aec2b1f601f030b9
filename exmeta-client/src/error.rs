//! Error type returned through the controller handle

use crate::auth::StoreError;
use crate::batch::{BatchError, UploadError};
use crate::intake::IntakeError;
use crate::services::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Remote API unavailable: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Common(#[from] exmeta_common::Error),

    /// The controller task has stopped
    #[error("Client controller is not running")]
    ControllerGone,
}

pub type ClientResult<T> = Result<T, ClientError>;
