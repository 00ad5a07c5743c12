use anchor_lang::prelude::*;

#[error_code]
pub enum TipJarError {
    #[msg("Unauthorized - only the jar owner can withdraw")]
    Unauthorized,

    #[msg("Transfer of custodied funds failed")]
    TransferFailure,

    #[msg("Arithmetic overflow")]
    ArithmeticOverflow,
}
