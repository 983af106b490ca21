use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate key {0}")]
    DuplicateKey(u32),
    #[error("page number {0} is out of bounds (limit {1})")]
    PageOutOfBounds(u32, usize),
    #[error("page {0} is not resident in the cache")]
    PageNotLoaded(u32),
    #[error("cell index {0} out of range for node")]
    CellOutOfBounds(u32),
    #[error("invalid node type byte {0}")]
    InvalidNodeType(u8),
    #[error("corrupt page: {0}")]
    CorruptPage(&'static str),
    #[error("corrupt database file: {0}")]
    CorruptFile(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
