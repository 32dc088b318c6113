// Copyright 2026 TiKV Project Authors. Licensed under MIT or Apache-2.0.

//! Error types for `crcfold`.
//!
//! Computing a CRC never fails. Only configuring the dispatch layer can.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("dispatch tier already selected; configuration must be installed before first use")]
    AlreadyInitialized,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
