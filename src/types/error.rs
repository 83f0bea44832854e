use std::fmt;

use thiserror::Error;

use crate::types::OffsetNumber;

/// How far a page error must propagate before someone may recover from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The buffer may already be inconsistent; the owner must stop the process.
    Fatal,
    /// The operation was refused before touching the page; abort the enclosing unit of work.
    Recoverable,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "PANIC"),
            Severity::Recoverable => write!(f, "ERROR"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Invalid page buffer size: {expected} bytes, got {actual} bytes")]
    InvalidBufferSize { expected: usize, actual: usize },

    #[error("Invalid page init parameters: page_size={page_size}, special_size={special_size}")]
    InvalidInitParams {
        page_size: usize,
        special_size: usize,
    },

    #[error("Invalid page header: {reason}")]
    InvalidHeader { reason: String },

    #[error("corrupted page pointers: lower = {lower}, upper = {upper}, special = {special}")]
    CorruptedPointers {
        lower: u16,
        upper: u16,
        special: u16,
        severity: Severity,
    },

    #[error("corrupted item pointer: offset = {offset}, size = {size}")]
    CorruptedItemPointer { offset: u16, size: u16 },

    #[error("corrupted item lengths: total {total}, available space {available}")]
    CorruptedItemLengths { total: usize, available: usize },

    #[error("invalid index offnum: {offnum} (max: {max})")]
    InvalidOffsetNumber {
        offnum: OffsetNumber,
        max: OffsetNumber,
    },

    #[error("incorrect index offsets supplied: matched {matched} of {supplied}")]
    IncorrectOffsets { supplied: usize, matched: usize },
}

impl PageError {
    pub fn severity(&self) -> Severity {
        match self {
            PageError::InvalidInitParams { .. } => Severity::Fatal,
            PageError::CorruptedPointers { severity, .. } => *severity,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// True for errors that mean the page bytes themselves are damaged.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            PageError::InvalidHeader { .. }
                | PageError::CorruptedPointers { .. }
                | PageError::CorruptedItemPointer { .. }
                | PageError::CorruptedItemLengths { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PageError>;
