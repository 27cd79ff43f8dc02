use thiserror::Error;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
