use thiserror::Error;

/// Errors raised by the ledger gateway and the identity provisioner.
///
/// Unlike ingestion errors these are always surfaced to the immediate
/// caller, classified so the caller can decide whether a retry makes
/// sense. `is_retryable()` encodes that classification.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The connection profile is missing or unreadable. Fatal at startup.
    #[error("ledger connection profile missing or unreadable at `{path}`: {reason}")]
    ProfileMissing { path: String, reason: String },
    /// The connection profile parsed but does not describe the configured
    /// organization, peer or certificate authority.
    #[error("ledger connection profile invalid: {0}")]
    ProfileInvalid(String),
    /// The named identity has no credential in the wallet. Fatal: the
    /// provisioner must run (and succeed) before gateway calls are made.
    #[error("identity `{0}` is not enrolled")]
    IdentityNotEnrolled(String),
    /// Network-level failure talking to the ledger. Retryable.
    #[error("ledger transport failure: {0}")]
    Transport(String),
    /// The invocation timed out. Retryable.
    #[error("ledger call timed out after {0} ms")]
    Timeout(u64),
    /// The contract rejected the invocation. Non-retryable business error
    /// carrying the ledger's rejection detail.
    #[error("contract rejected `{function}`: {detail}")]
    ContractRejected { function: String, detail: String },
    /// Identity provisioning against the certificate authority failed.
    /// Fatal at startup; requires operator intervention, never retried.
    #[error("identity provisioning failed for `{identity}`: {reason}")]
    Provisioning { identity: String, reason: String },
    /// Wallet storage failure (credential file unreadable/unwritable).
    #[error("wallet error: {0}")]
    Wallet(String),
}

impl LedgerError {
    /// Whether the caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Transport(_) | LedgerError::Timeout(_))
    }
}
