use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AssetFlowError {
    #[error("controller is no longer running")]
    ControllerClosed,

    #[error("no builder registered for id {0}")]
    UnknownBuilder(Uuid),

    #[error("failed to relocate product {path}: {source}")]
    ProductRelocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("product path {0} exceeds the maximum path length")]
    ProductPathTooLong(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssetFlowError>;
