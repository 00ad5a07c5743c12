//! Errors surfaced to the walkthrough driver.

use anchor_lang::prelude::Pubkey;
use std::io;
use tip_jar::error::TipJarError;

/// A ledger call that did not commit.
///
/// Every variant means the call left the jar and all balances exactly as
/// they were before it.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// A principal other than the jar owner tried to withdraw
    #[error("unauthorized: {caller} does not own tip jar {jar}")]
    Unauthorized { caller: Pubkey, jar: Pubkey },

    /// Moving custodied funds to the owner failed
    #[error("transfer of {amount} lamports to {to} failed")]
    TransferFailure { to: Pubkey, amount: u64 },

    /// The caller cannot fund the tip or the jar's rent reserve
    #[error("insufficient funds: {caller} holds {available} lamports, needs {required}")]
    InsufficientCallerFunds {
        caller: Pubkey,
        available: u64,
        required: u64,
    },

    #[error("no tip jar at {0}")]
    UnknownJar(Pubkey),

    #[error("tip jar {0} already exists")]
    JarExists(Pubkey),

    /// The commit clock cannot advance past its current value
    #[error("commit clock exhausted at {0}")]
    ClockExhausted(i64),

    /// Any other error raised by the program
    #[error("ledger rejected call: {0}")]
    Ledger(String),
}

impl EnvError {
    /// Translates a program error raised while `caller` acted on `jar`.
    pub fn from_program(err: anchor_lang::error::Error, caller: &Pubkey, jar: &Pubkey) -> Self {
        match error_code(&err) {
            Some(code) if code == u32::from(TipJarError::Unauthorized) => Self::Unauthorized {
                caller: *caller,
                jar: *jar,
            },
            _ => Self::Ledger(err.to_string()),
        }
    }
}

/// Failure of a scripted walkthrough step that cannot be skipped.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}

fn error_code(err: &anchor_lang::error::Error) -> Option<u32> {
    match err {
        anchor_lang::error::Error::AnchorError(err) => Some(err.error_code_number),
        anchor_lang::error::Error::ProgramError(_) => None,
    }
}
