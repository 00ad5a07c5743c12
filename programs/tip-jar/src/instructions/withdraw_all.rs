use anchor_lang::prelude::*;

use crate::error::TipJarError;
use crate::state::TipJar;

/// Withdraws everything the jar custodies to its owner
///
/// Only the owner can withdraw. The jar's bookkeeping is settled first and
/// the lamports move afterwards; if the move fails the whole transaction is
/// rolled back, bookkeeping included. An empty jar is a successful no-op.
pub fn withdraw_all(ctx: Context<WithdrawAll>) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    let jar = &mut ctx.accounts.tip_jar;
    let amount = jar.settle_withdrawal(&owner)?;

    if amount > 0 {
        // The jar keeps its rent reserve; only custodied lamports leave
        let jar_info = jar.to_account_info();
        let remaining = TipJar::balance_after_payout(
            &Rent::get()?,
            jar_info.lamports(),
            jar_info.data_len(),
            amount,
        )?;

        let owner_info = ctx.accounts.owner.to_account_info();
        let credited = owner_info
            .lamports()
            .checked_add(amount)
            .ok_or(TipJarError::ArithmeticOverflow)?;

        **jar_info.try_borrow_mut_lamports()? = remaining;
        **owner_info.try_borrow_mut_lamports()? = credited;
    }

    emit!(TipsWithdrawn {
        owner,
        amount,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct WithdrawAll<'info> {
    /// The jar owner withdrawing the tips
    #[account(mut)]
    pub owner: Signer<'info>,

    /// The owner's jar
    #[account(
        mut,
        seeds = [TipJar::SEED_PREFIX, tip_jar.owner.as_ref()],
        bump = tip_jar.bump,
        has_one = owner @ TipJarError::Unauthorized,
    )]
    pub tip_jar: Account<'info, TipJar>,
}

#[event]
pub struct TipsWithdrawn {
    pub owner: Pubkey,
    pub amount: u64,
    pub timestamp: i64,
}
