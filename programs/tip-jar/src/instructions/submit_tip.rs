use anchor_lang::prelude::*;
use anchor_lang::system_program;

use crate::error::TipJarError;
use crate::state::{TipJar, TipRecord};

/// Tips the jar owner and appends the comment to the jar's log
///
/// The tipper is the signer, so a record can never name anyone else as its
/// sender. `name` and `message` are stored as given, empty strings included.
/// A zero-value tip is still recorded.
///
/// The jar account grows by exactly one record and the tipper pays the rent
/// for the extra bytes on top of the tip, so the jar always holds its rent
/// reserve plus the custodied tips.
pub fn submit_tip(
    ctx: Context<SubmitTip>,
    name: String,
    message: String,
    value: u64,
) -> Result<()> {
    let clock = Clock::get()?;
    let jar_info = ctx.accounts.tip_jar.to_account_info();
    let data_len = jar_info.data_len();
    let added = TipRecord::space_for(&name, &message);
    let top_up = TipJar::rent_top_up(&Rent::get()?, data_len, added)?;
    let amount = value
        .checked_add(top_up)
        .ok_or(TipJarError::ArithmeticOverflow)?;

    // Transfer the tip and the extra rent from tipper into the jar
    if amount > 0 {
        system_program::transfer(
            CpiContext::new(
                ctx.accounts.system_program.to_account_info(),
                system_program::Transfer {
                    from: ctx.accounts.tipper.to_account_info(),
                    to: jar_info.clone(),
                },
            ),
            amount,
        )?;
    }
    jar_info.resize(data_len + added)?;

    let tipper = ctx.accounts.tipper.key();
    let jar = &mut ctx.accounts.tip_jar;
    let index = jar.record_tip(
        TipRecord {
            timestamp: clock.unix_timestamp,
            name,
            from: tipper,
            message,
        },
        value,
    )?;

    emit!(TipSubmitted {
        owner: jar.owner,
        from: tipper,
        value,
        rent: top_up,
        index,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct SubmitTip<'info> {
    /// The user sending the tip
    #[account(mut)]
    pub tipper: Signer<'info>,

    /// The jar receiving the tip
    #[account(
        mut,
        seeds = [TipJar::SEED_PREFIX, tip_jar.owner.as_ref()],
        bump = tip_jar.bump,
    )]
    pub tip_jar: Account<'info, TipJar>,

    pub system_program: Program<'info, System>,
}

#[event]
pub struct TipSubmitted {
    pub owner: Pubkey,
    pub from: Pubkey,
    pub value: u64,
    /// Lamports paid for the jar's extra space
    pub rent: u64,
    /// Position of the new record in the jar's log
    pub index: u64,
    pub timestamp: i64,
}
