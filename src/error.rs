#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Key: {0}")]
    Key(#[from] crate::keys::KeyError),
    #[error("Store: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("Authenticator: {0}")]
    Authenticator(#[from] crate::webauthn::AuthenticatorError),
    #[error("{0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
