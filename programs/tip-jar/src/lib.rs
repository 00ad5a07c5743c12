use anchor_lang::prelude::*;

pub mod error;
pub mod instructions;
pub mod state;

use instructions::*;

declare_id!("8kTJ6vBZ18SSAPKawsdZWiSn6DXvwTgTLepbtiyWZrYF");

/// Tip Jar Program
///
/// A creator opens a jar, anyone can drop a tip into it together with a name
/// and a message, and only the creator can empty it:
/// - Jar creation (one jar per creator wallet)
/// - Tips with an attached comment, logged in acceptance order
/// - Withdrawal of everything the jar holds
///
/// The comment log lives in the jar account itself. Clients read it by
/// fetching the account and deserializing `TipJar`, which works for a log of
/// any length; there is no view instruction.
///
/// # Security Considerations
///
/// `withdraw_all` is the only instruction that moves funds out of the jar and
/// is gated on `tip_jar.owner`. The jar's bookkeeping is settled before any
/// lamports leave the account, and the lamport move is a direct balance edit
/// on the program-owned PDA, so no foreign code runs mid-withdrawal.
///
/// The jar PDA is derived from the stored owner rather than from the signer,
/// so a wrong signer is rejected with `Unauthorized` instead of a seeds
/// mismatch.
#[program]
pub mod tip_jar {
    use super::*;

    /// Open a tip jar
    ///
    /// The signer becomes the jar's owner for the jar's whole lifetime.
    pub fn initialize_jar(ctx: Context<InitializeJar>) -> Result<()> {
        instructions::initialize_jar::initialize_jar(ctx)
    }

    /// Tip the jar's owner and leave a comment
    ///
    /// Moves `value` lamports from the tipper into the jar, plus the rent for
    /// the grown account, and appends a `TipRecord`. `name` and `message` are
    /// stored verbatim; a zero-value tip is still recorded.
    pub fn submit_tip(
        ctx: Context<SubmitTip>,
        name: String,
        message: String,
        value: u64,
    ) -> Result<()> {
        instructions::submit_tip::submit_tip(ctx, name, message, value)
    }

    /// Withdraw everything the jar custodies
    ///
    /// Only the jar owner can withdraw. Succeeds as a no-op on an empty jar.
    pub fn withdraw_all(ctx: Context<WithdrawAll>) -> Result<()> {
        instructions::withdraw_all::withdraw_all(ctx)
    }
}
