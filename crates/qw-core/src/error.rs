use thiserror::Error;

/// One upstream record is unusable. Scoped to that record; the rest of the
/// batch is unaffected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("feature missing id")]
    MissingId,
    #[error("feature {id} missing time")]
    MissingTime { id: String },
    #[error("feature not decodable: {message}")]
    Undecodable { message: String },
}

/// Whole-request failure while talking to the upstream feed. Scoped to one
/// poll cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {message}")]
    Request { message: String },
    #[error("unexpected status: {status}")]
    Status { status: u16 },
    #[error("decode failed: {message}")]
    Decode { message: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schema creation failed: {message}")]
    Schema { message: String },
    #[error("write failed: {message}")]
    Write { message: String },
    #[error("store unreachable after {attempts} attempts: {message}")]
    Unreachable { attempts: u32, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid table name: {name}")]
    InvalidTableName { name: String },
    #[error("invalid duration: {message}")]
    InvalidDuration { message: String },
}

#[derive(Debug, Error)]
pub enum QuakewatchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
