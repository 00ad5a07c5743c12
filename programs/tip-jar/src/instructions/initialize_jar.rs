use anchor_lang::prelude::*;

use crate::state::TipJar;

/// Opens a tip jar owned by the signer
///
/// Each creator can only have one jar, derived from their wallet address.
/// The jar starts with an empty comment log and nothing in custody.
pub fn initialize_jar(ctx: Context<InitializeJar>) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    ctx.accounts
        .tip_jar
        .set_inner(TipJar::new(owner, ctx.bumps.tip_jar));

    emit!(TipJarCreated {
        owner,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct InitializeJar<'info> {
    /// The creator opening the jar
    #[account(mut)]
    pub owner: Signer<'info>,

    /// The creator's jar account, sized for an empty log
    #[account(
        init,
        payer = owner,
        space = TipJar::BASE_SPACE,
        seeds = [TipJar::SEED_PREFIX, owner.key().as_ref()],
        bump,
    )]
    pub tip_jar: Account<'info, TipJar>,

    pub system_program: Program<'info, System>,
}

#[event]
pub struct TipJarCreated {
    pub owner: Pubkey,
    pub timestamp: i64,
}
