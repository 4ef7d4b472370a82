// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error as DeriveError;

#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum TxError {
    /// The attempt has already been invalidated and must re-execute.
    #[error("transaction conflicts, should retry")]
    Retry,

    /// A foreign transaction holds the variable's write-lock.
    #[error("transactable variable is locked")]
    LockPresent,

    /// The variable committed past the attempt's read version.
    #[error("transactable variable is stale")]
    StaleObject,

    /// The variable changed between the two samples of a read.
    #[error("transactable variable changed during read")]
    VersionMismatch,

    /// A failure raised by the user block, handed through untouched.
    #[error("transaction failed: {0}")]
    Inner(String),
}

impl TxError {
    /// Returns `true` for the conflict signals that re-enter the driver
    /// loop instead of surfacing to the caller.
    pub fn is_retry(&self) -> bool {
        !matches!(self, TxError::Inner(_))
    }
}
