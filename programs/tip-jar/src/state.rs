use anchor_lang::prelude::*;

use crate::error::TipJarError;

/// A creator's tip jar: who may withdraw, what it holds, and every comment left in it
#[account]
#[derive(Debug)]
pub struct TipJar {
    /// The creator's wallet address - the only wallet allowed to withdraw
    pub owner: Pubkey,
    /// Total lifetime tips in lamports
    pub total_tipped: u64,
    /// Total amount withdrawn in lamports
    pub total_withdrawn: u64,
    /// PDA bump seed
    pub bump: u8,
    /// Comment log, append-only, in acceptance order
    pub comments: Vec<TipRecord>,
}

/// One accepted tip and the comment that came with it
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct TipRecord {
    /// Timestamp of the tip
    pub timestamp: i64,
    /// Name the tipper signed the comment with
    pub name: String,
    /// Wallet that sent the tip
    pub from: Pubkey,
    /// Free-form comment
    pub message: String,
}

impl TipJar {
    pub const SEED_PREFIX: &'static [u8] = b"tip_jar";

    /// Size of a jar with an empty log
    pub const BASE_SPACE: usize = 8  // discriminator
        + 32  // owner
        + 8   // total_tipped
        + 8   // total_withdrawn
        + 1   // bump
        + 4; // comments length prefix

    pub fn new(owner: Pubkey, bump: u8) -> Self {
        Self {
            owner,
            total_tipped: 0,
            total_withdrawn: 0,
            bump,
            comments: Vec::new(),
        }
    }

    /// Account size needed to hold the current log
    pub fn space(&self) -> usize {
        self.comments
            .iter()
            .fold(Self::BASE_SPACE, |space, record| space + record.space())
    }

    pub fn comments(&self) -> &[TipRecord] {
        &self.comments
    }

    /// Lamports held on behalf of the owner, pending withdrawal
    pub fn custodied(&self) -> Result<u64> {
        Ok(self
            .total_tipped
            .checked_sub(self.total_withdrawn)
            .ok_or(TipJarError::ArithmeticOverflow)?)
    }

    /// Appends `record` and credits `value` to the jar.
    ///
    /// Returns the record's position in the log. Nothing is modified on error.
    pub fn record_tip(&mut self, record: TipRecord, value: u64) -> Result<u64> {
        let total_tipped = self
            .total_tipped
            .checked_add(value)
            .ok_or(TipJarError::ArithmeticOverflow)?;
        let index = u64::try_from(self.comments.len())
            .map_err(|_| TipJarError::ArithmeticOverflow)?;

        self.comments.push(record);
        self.total_tipped = total_tipped;

        Ok(index)
    }

    /// Settles a full withdrawal for `caller` and returns the amount to pay out.
    ///
    /// The custodied balance is zero once this returns; the caller moves the
    /// lamports afterwards within the same transaction.
    pub fn settle_withdrawal(&mut self, caller: &Pubkey) -> Result<u64> {
        require_keys_eq!(*caller, self.owner, TipJarError::Unauthorized);

        let amount = self.custodied()?;
        self.total_withdrawn = self
            .total_withdrawn
            .checked_add(amount)
            .ok_or(TipJarError::ArithmeticOverflow)?;

        Ok(amount)
    }

    /// Lamports the tipper adds so the jar stays rent exempt after its data
    /// grows from `data_len` by `added` bytes
    pub fn rent_top_up(rent: &Rent, data_len: usize, added: usize) -> Result<u64> {
        let grown = data_len
            .checked_add(added)
            .ok_or(TipJarError::ArithmeticOverflow)?;
        Ok(rent
            .minimum_balance(grown)
            .saturating_sub(rent.minimum_balance(data_len)))
    }

    /// Jar lamports left once `amount` is paid out.
    ///
    /// Fails with `TransferFailure` if the payout would reach into the rent
    /// reserve for `data_len` bytes.
    pub fn balance_after_payout(
        rent: &Rent,
        lamports: u64,
        data_len: usize,
        amount: u64,
    ) -> Result<u64> {
        let remaining = lamports
            .checked_sub(amount)
            .ok_or(TipJarError::TransferFailure)?;
        require!(
            remaining >= rent.minimum_balance(data_len),
            TipJarError::TransferFailure
        );
        Ok(remaining)
    }
}

impl TipRecord {
    /// Serialized size of a record carrying `name` and `message`
    pub fn space_for(name: &str, message: &str) -> usize {
        8 // timestamp
            + 4 + name.len()
            + 32 // from
            + 4 + message.len()
    }

    pub fn space(&self) -> usize {
        Self::space_for(&self.name, &self.message)
    }
}
