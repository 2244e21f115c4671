use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaMismatch { found: u32, supported: u32 },

    #[error("store error: {0}")]
    Store(#[from] commitclub_store::StoreError),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for commitclub_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(key) => commitclub_store::StoreError::NotFound(key),
            LmdbError::Serialization(msg) => commitclub_store::StoreError::Serialization(msg),
            LmdbError::Store(inner) => inner,
            other => commitclub_store::StoreError::Backend(other.to_string()),
        }
    }
}
