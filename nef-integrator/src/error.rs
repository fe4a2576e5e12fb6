use nef_core::NefError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum IntegratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model error: {0}")]
    Model(#[from] NefError),
    #[error("probe '{0}' recorded no data")]
    MissingProbe(&'static str),
}

pub type IntegratorResult<T, E = IntegratorError> = core::result::Result<T, E>;
