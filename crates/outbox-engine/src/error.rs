use outbox_db::LockError;

use crate::ident::InvalidIdentifier;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Identifier(#[from] InvalidIdentifier),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Identifier(#[from] InvalidIdentifier),
    #[error(transparent)]
    Migration(#[from] outbox_migrate::MigrationError),
    #[error("stored event column was not valid utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("{0}; additionally failed to release the relay lock: {1}")]
    Joined(Box<EngineError>, Box<LockError>),
    #[error("app_id must be non-empty")]
    EmptyAppId,
}

impl EngineError {
    pub(crate) fn joined(primary: EngineError, unlock: LockError) -> Self {
        EngineError::Joined(Box::new(primary), Box::new(unlock))
    }
}
