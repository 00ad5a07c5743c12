//! The scripted walkthrough: open a jar, let several wallets tip into it,
//! have the owner empty it, and replay the comment log.
//!
//! The driver issues one call at a time and waits for it to commit or fail
//! before the next. It keeps no state of its own; every figure it reports is
//! read back from the environment.

use crate::{
    config::{Scenario, LAMPORTS_PER_SOL},
    environment::{ExecutionEnvironment, LocalEnvironment},
    error::SimError,
};
use anchor_lang::prelude::Pubkey;
use std::io::{self, Write};
use tip_jar::state::TipRecord;
use tracing::{info, warn};

/// One tip the walkthrough submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedTip {
    pub tipper: Pubkey,
    pub name: String,
    pub message: String,
    pub value: u64,
}

/// Sequential driver over an [ExecutionEnvironment], writing a plain-text
/// report to `out`.
pub struct Orchestrator<E, W> {
    env: E,
    out: W,
}

impl<E: ExecutionEnvironment, W: Write> Orchestrator<E, W> {
    pub fn new(env: E, out: W) -> Self {
        Self { env, out }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn into_parts(self) -> (E, W) {
        (self.env, self.out)
    }

    /// Opens a jar for `owner`.
    pub fn deploy(&mut self, owner: &Pubkey) -> Result<Pubkey, SimError> {
        let jar = self.env.create_jar(owner)?;
        info!(owner = %owner, jar = %jar, "deployed tip jar");
        writeln!(self.out, "TipJar deployed to: {jar}")?;
        Ok(jar)
    }

    /// Writes one balance line per principal. A failed query shows as zero.
    pub fn print_balances(&mut self, principals: &[Pubkey]) -> io::Result<()> {
        for (idx, principal) in principals.iter().enumerate() {
            let lamports = self.env.balance(principal).unwrap_or_else(|err| {
                warn!(principal = %principal, error = %err, "balance query failed");
                0
            });
            writeln!(self.out, "Address {idx} balance: {} SOL", format_sol(lamports))?;
        }
        Ok(())
    }

    /// Submits `tips` in order and returns how many committed.
    ///
    /// A tip that fails is logged and skipped; the remaining tips still run.
    pub fn tip_sequence(&mut self, jar: &Pubkey, tips: &[ScriptedTip]) -> usize {
        let mut accepted = 0;
        for tip in tips {
            match self
                .env
                .submit_tip(jar, &tip.tipper, &tip.name, &tip.message, tip.value)
            {
                Ok(()) => {
                    accepted += 1;
                    info!(tipper = %tip.tipper, name = %tip.name, value = tip.value, "tip submitted");
                }
                Err(err) => {
                    warn!(tipper = %tip.tipper, name = %tip.name, error = %err, "skipping tip");
                }
            }
        }
        accepted
    }

    /// Empties `jar` into `owner` when it custodies any tips.
    ///
    /// The jar's rent reserve does not count as funds. Returns the increase
    /// of the owner's balance, as read back from the environment.
    pub fn withdraw_if_funded(&mut self, jar: &Pubkey, owner: &Pubkey) -> Result<u64, SimError> {
        let before = self.env.balance(owner)?;
        let held = self.env.custodied(jar)?;
        writeln!(self.out, "current balance of owner: {} SOL", format_sol(before))?;
        writeln!(self.out, "tips held in jar: {} SOL", format_sol(held))?;

        if held > 0 {
            writeln!(self.out, "withdrawing funds..")?;
            self.env.withdraw_all(jar, owner)?;
        } else {
            writeln!(self.out, "no funds to withdraw!")?;
        }

        let after = self.env.balance(owner)?;
        writeln!(self.out, "current balance of owner: {} SOL", format_sol(after))?;

        let withdrawn = after.saturating_sub(before);
        info!(owner = %owner, withdrawn, "withdrawal finished");
        Ok(withdrawn)
    }

    /// Writes the jar's comment log and returns the number of records.
    pub fn print_comments(&mut self, jar: &Pubkey) -> Result<usize, SimError> {
        let comments = self.env.get_comments(jar)?;
        for record in &comments {
            writeln!(self.out, "{}", format_comment(record))?;
        }
        Ok(comments.len())
    }

    /// Runs the whole walkthrough and returns the jar address.
    ///
    /// Failed tips and a failed withdrawal are logged and the walkthrough
    /// carries on; only a failed deployment or report write stops it.
    pub fn run(&mut self, owner: &Pubkey, tips: &[ScriptedTip]) -> Result<Pubkey, SimError> {
        let jar = self.deploy(owner)?;

        let mut principals = vec![*owner];
        principals.extend(tips.iter().map(|tip| tip.tipper));
        principals.push(jar);

        writeln!(self.out, "== start ==")?;
        self.print_balances(&principals)?;

        let accepted = self.tip_sequence(&jar, tips);
        info!(accepted, scripted = tips.len(), "tips done");
        writeln!(self.out, "== tips ==")?;
        self.print_balances(&principals)?;

        writeln!(self.out, "== withdraw ==")?;
        match self.withdraw_if_funded(&jar, owner) {
            Ok(_) => {}
            Err(SimError::Env(err)) => warn!(error = %err, "withdrawal failed"),
            Err(err) => return Err(err),
        }
        self.print_balances(&principals)?;

        writeln!(self.out, "== comments ==")?;
        self.print_comments(&jar)?;

        Ok(jar)
    }
}

/// Formats lamports as a decimal SOL amount: `10000.0`, `1.5`, `0.000000001`.
pub fn format_sol(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let fraction = lamports % LAMPORTS_PER_SOL;
    if fraction == 0 {
        return format!("{whole}.0");
    }
    let digits = format!("{fraction:09}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

pub fn format_comment(record: &TipRecord) -> String {
    format!(
        "At {}, {} ({}) commented: \"{}\"",
        record.timestamp, record.name, record.from, record.message
    )
}

/// Actors and environment for a [Scenario].
pub struct Stage {
    pub env: LocalEnvironment,
    pub owner: Pubkey,
    pub tips: Vec<ScriptedTip>,
}

/// Funds an owner and one tipper per scripted tip in a fresh local
/// environment.
pub fn stage(scenario: &Scenario) -> Stage {
    let mut env = LocalEnvironment::new(scenario.genesis_timestamp);

    let owner = actor(0);
    env.airdrop(owner, scenario.starting_balance);

    let tips = scenario
        .tips
        .iter()
        .zip(1u64..)
        .map(|(script, index)| {
            let tipper = actor(index);
            env.airdrop(tipper, scenario.starting_balance);
            ScriptedTip {
                tipper,
                name: script.name.clone(),
                message: script.message.clone(),
                value: scenario.amount_of(script),
            }
        })
        .collect();

    Stage { env, owner, tips }
}

/// Deterministic wallet address for the `index`-th actor.
pub fn actor(index: u64) -> Pubkey {
    let mut bytes = [0xA5; 32];
    bytes[..8].copy_from_slice(&index.to_le_bytes());
    Pubkey::new_from_array(bytes)
}
