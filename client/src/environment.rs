//! The execution environment the walkthrough drives.
//!
//! [ExecutionEnvironment] is everything the driver needs from the chain:
//! serialized ledger calls, caller identity, a commit clock, value transfer
//! and balance queries. [LocalEnvironment] provides all of it in process by
//! running the program's own `TipJar` state transitions over in-memory
//! accounts.

use crate::error::EnvError;
use anchor_lang::prelude::{AccountDeserialize, AccountSerialize, Pubkey, Rent};
use std::collections::{BTreeMap, BTreeSet};
use tip_jar::state::{TipJar, TipRecord};
use tracing::debug;

/// Calls a driver can issue. Each mutating call either commits fully or
/// returns an error and changes nothing.
pub trait ExecutionEnvironment {
    /// Lamports held by `principal` (a wallet or a jar account).
    fn balance(&self, principal: &Pubkey) -> Result<u64, EnvError>;

    /// Lamports `jar` holds on behalf of its owner. Excludes the jar's rent
    /// reserve.
    fn custodied(&self, jar: &Pubkey) -> Result<u64, EnvError>;

    /// Opens a jar owned by `owner` and returns the jar's address.
    fn create_jar(&mut self, owner: &Pubkey) -> Result<Pubkey, EnvError>;

    /// `tipper` tips `value` lamports into `jar` with a signed comment.
    fn submit_tip(
        &mut self,
        jar: &Pubkey,
        tipper: &Pubkey,
        name: &str,
        message: &str,
        value: u64,
    ) -> Result<(), EnvError>;

    /// The jar's comment log, oldest first.
    fn get_comments(&self, jar: &Pubkey) -> Result<Vec<TipRecord>, EnvError>;

    /// `caller` empties `jar`.
    fn withdraw_all(&mut self, jar: &Pubkey, caller: &Pubkey) -> Result<(), EnvError>;
}

/// Derives the jar address of `owner`.
pub fn jar_address(owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[TipJar::SEED_PREFIX, owner.as_ref()], &tip_jar::ID)
}

/// Decodes raw jar account data, discriminator included.
pub fn decode_jar(data: &[u8]) -> Result<TipJar, EnvError> {
    TipJar::try_deserialize(&mut &data[..]).map_err(|err| EnvError::Ledger(err.to_string()))
}

/// Reads the comment log out of raw jar account data.
///
/// This is how a client reads the log from a cluster: fetch the jar account
/// and decode it. The log has no size limit on this path.
pub fn fetch_comments(data: &[u8]) -> Result<Vec<TipRecord>, EnvError> {
    Ok(decode_jar(data)?.comments)
}

fn encode_jar(jar: &TipJar) -> Result<Vec<u8>, EnvError> {
    let mut data = Vec::with_capacity(jar.space());
    jar.try_serialize(&mut data)
        .map_err(|err| EnvError::Ledger(err.to_string()))?;
    Ok(data)
}

/// In-process environment.
///
/// Calls are serialized by `&mut self`. Each call stages its changes on
/// copies and commits them together, and only a committed call advances the
/// clock (by one second, starting from the genesis timestamp).
///
/// Jar accounts are stored as serialized account data and are kept rent
/// exempt the way the program keeps them: the owner funds the reserve of the
/// empty jar and every tipper pays for the bytes their record adds. A jar's
/// lamports are always its reserve plus its custodied tips.
#[derive(Debug, Clone)]
pub struct LocalEnvironment {
    clock: i64,
    rent: Rent,
    balances: BTreeMap<Pubkey, u64>,
    jars: BTreeMap<Pubkey, Vec<u8>>,
    rejecting: BTreeSet<Pubkey>,
}

impl LocalEnvironment {
    pub fn new(genesis_timestamp: i64) -> Self {
        Self {
            clock: genesis_timestamp,
            rent: Rent::default(),
            balances: BTreeMap::new(),
            jars: BTreeMap::new(),
            rejecting: BTreeSet::new(),
        }
    }

    /// Credits `lamports` to `principal` out of thin air.
    pub fn airdrop(&mut self, principal: Pubkey, lamports: u64) {
        let balance = self.balances.entry(principal).or_default();
        *balance = balance.saturating_add(lamports);
    }

    /// Makes every later transfer to `principal` fail.
    pub fn reject_deposits(&mut self, principal: Pubkey) {
        self.rejecting.insert(principal);
    }

    /// Timestamp of the last committed call.
    pub fn now(&self) -> i64 {
        self.clock
    }

    pub fn rent(&self) -> &Rent {
        &self.rent
    }

    /// Raw account data of the jar at `address`.
    pub fn account_data(&self, address: &Pubkey) -> Option<&[u8]> {
        self.jars.get(address).map(Vec::as_slice)
    }

    /// Decoded state of the jar at `address`.
    pub fn jar(&self, address: &Pubkey) -> Result<TipJar, EnvError> {
        let data = self
            .account_data(address)
            .ok_or(EnvError::UnknownJar(*address))?;
        decode_jar(data)
    }

    fn lamports(&self, principal: &Pubkey) -> u64 {
        self.balances.get(principal).copied().unwrap_or_default()
    }

    /// Timestamp the next committed call is stamped with.
    fn next_tick(&self) -> Result<i64, EnvError> {
        self.clock
            .checked_add(1)
            .ok_or(EnvError::ClockExhausted(self.clock))
    }

    fn credit(&self, principal: &Pubkey, lamports: u64) -> Result<u64, EnvError> {
        self.lamports(principal)
            .checked_add(lamports)
            .ok_or_else(|| EnvError::Ledger(format!("balance of {principal} overflows")))
    }

    fn debit(&self, caller: &Pubkey, required: u64) -> Result<u64, EnvError> {
        let available = self.lamports(caller);
        available
            .checked_sub(required)
            .ok_or(EnvError::InsufficientCallerFunds {
                caller: *caller,
                available,
                required,
            })
    }
}

impl ExecutionEnvironment for LocalEnvironment {
    fn balance(&self, principal: &Pubkey) -> Result<u64, EnvError> {
        Ok(self.lamports(principal))
    }

    fn custodied(&self, jar: &Pubkey) -> Result<u64, EnvError> {
        self.jar(jar)?
            .custodied()
            .map_err(|err| EnvError::Ledger(err.to_string()))
    }

    fn create_jar(&mut self, owner: &Pubkey) -> Result<Pubkey, EnvError> {
        let (address, bump) = jar_address(owner);
        if self.jars.contains_key(&address) {
            return Err(EnvError::JarExists(address));
        }
        let timestamp = self.next_tick()?;

        let data = encode_jar(&TipJar::new(*owner, bump))?;
        let reserve = self.rent.minimum_balance(data.len());
        let owner_balance = self.debit(owner, reserve)?;
        let jar_balance = self.credit(&address, reserve)?;

        self.balances.insert(*owner, owner_balance);
        self.balances.insert(address, jar_balance);
        self.jars.insert(address, data);
        self.clock = timestamp;
        debug!(owner = %owner, jar = %address, reserve, "created tip jar");
        Ok(address)
    }

    fn submit_tip(
        &mut self,
        jar: &Pubkey,
        tipper: &Pubkey,
        name: &str,
        message: &str,
        value: u64,
    ) -> Result<(), EnvError> {
        let mut staged = self.jar(jar)?;
        let timestamp = self.next_tick()?;

        let record = TipRecord {
            timestamp,
            name: name.to_string(),
            from: *tipper,
            message: message.to_string(),
        };
        let top_up = TipJar::rent_top_up(&self.rent, staged.space(), record.space())
            .map_err(|err| EnvError::from_program(err, tipper, jar))?;
        let required = value
            .checked_add(top_up)
            .ok_or_else(|| EnvError::Ledger(format!("tip of {value} lamports overflows")))?;
        let tipper_balance = self.debit(tipper, required)?;
        let jar_balance = self.credit(jar, required)?;

        let index = staged
            .record_tip(record, value)
            .map_err(|err| EnvError::from_program(err, tipper, jar))?;
        let data = encode_jar(&staged)?;

        self.balances.insert(*tipper, tipper_balance);
        self.balances.insert(*jar, jar_balance);
        self.jars.insert(*jar, data);
        self.clock = timestamp;
        debug!(jar = %jar, tipper = %tipper, value, rent = top_up, index, "committed tip");
        Ok(())
    }

    fn get_comments(&self, jar: &Pubkey) -> Result<Vec<TipRecord>, EnvError> {
        let data = self.account_data(jar).ok_or(EnvError::UnknownJar(*jar))?;
        fetch_comments(data)
    }

    fn withdraw_all(&mut self, jar: &Pubkey, caller: &Pubkey) -> Result<(), EnvError> {
        let mut staged = self.jar(jar)?;
        let timestamp = self.next_tick()?;
        let amount = staged
            .settle_withdrawal(caller)
            .map_err(|err| EnvError::from_program(err, caller, jar))?;
        let data = encode_jar(&staged)?;

        if amount > 0 {
            let owner = staged.owner;
            let failure = || EnvError::TransferFailure { to: owner, amount };
            if self.rejecting.contains(&owner) {
                return Err(failure());
            }
            let jar_balance =
                TipJar::balance_after_payout(&self.rent, self.lamports(jar), data.len(), amount)
                    .map_err(|_| failure())?;
            let owner_balance = self.credit(&owner, amount).map_err(|_| failure())?;

            self.balances.insert(*jar, jar_balance);
            self.balances.insert(owner, owner_balance);
        }

        self.jars.insert(*jar, data);
        self.clock = timestamp;
        debug!(jar = %jar, amount, "committed withdrawal");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LAMPORTS_PER_SOL;
    use proptest::prelude::*;

    const GENESIS: i64 = 1_700_000_000;

    fn principal(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    /// Environment with a jar for `owner`; the owner and every tipper start
    /// with `lamports`.
    fn funded(owner: Pubkey, tippers: &[Pubkey], lamports: u64) -> (LocalEnvironment, Pubkey) {
        let mut env = LocalEnvironment::new(GENESIS);
        env.airdrop(owner, lamports);
        for tipper in tippers {
            env.airdrop(*tipper, lamports);
        }
        let jar = env.create_jar(&owner).unwrap();
        (env, jar)
    }

    fn reserve(env: &LocalEnvironment, jar: &Pubkey) -> u64 {
        env.rent().minimum_balance(env.jar(jar).unwrap().space())
    }

    #[test]
    fn jar_lives_at_owner_pda() {
        let owner = principal(1);
        let (env, jar) = funded(owner, &[], LAMPORTS_PER_SOL);
        let base = env.rent().minimum_balance(TipJar::BASE_SPACE);

        assert_eq!(jar, jar_address(&owner).0);
        assert_eq!(env.jar(&jar).unwrap().owner, owner);
        assert_eq!(env.account_data(&jar).unwrap().len(), TipJar::BASE_SPACE);
        assert_eq!(env.balance(&jar).unwrap(), base);
        assert_eq!(env.balance(&owner).unwrap(), LAMPORTS_PER_SOL - base);
        assert_eq!(env.custodied(&jar).unwrap(), 0);
        assert_eq!(env.now(), GENESIS + 1);
    }

    #[test]
    fn owner_must_fund_rent_reserve() {
        let owner = principal(1);
        let mut env = LocalEnvironment::new(GENESIS);
        env.airdrop(owner, 10);

        let err = env.create_jar(&owner).unwrap_err();
        let base = env.rent().minimum_balance(TipJar::BASE_SPACE);
        assert!(matches!(
            err,
            EnvError::InsufficientCallerFunds { available: 10, required, .. } if required == base
        ));
        assert!(env.account_data(&jar_address(&owner).0).is_none());
        assert_eq!(env.balance(&owner).unwrap(), 10);
        assert_eq!(env.now(), GENESIS);
    }

    #[test]
    fn second_jar_for_same_owner_is_rejected() {
        let owner = principal(1);
        let (mut env, jar) = funded(owner, &[], LAMPORTS_PER_SOL);
        assert!(matches!(env.create_jar(&owner), Err(EnvError::JarExists(a)) if a == jar));
        assert_eq!(env.now(), GENESIS + 1);
    }

    #[test]
    fn tip_moves_funds_and_stamps_commit_time() {
        let (owner, tipper) = (principal(1), principal(2));
        let (mut env, jar) = funded(owner, &[tipper], LAMPORTS_PER_SOL);
        let top_up = env.rent().minimum_balance(
            TipJar::BASE_SPACE + TipRecord::space_for("Ric", "Great Content, keep going"),
        ) - env.rent().minimum_balance(TipJar::BASE_SPACE);

        env.submit_tip(&jar, &tipper, "Ric", "Great Content, keep going", 1)
            .unwrap();

        assert_eq!(env.balance(&tipper).unwrap(), LAMPORTS_PER_SOL - 1 - top_up);
        assert_eq!(env.balance(&jar).unwrap(), reserve(&env, &jar) + 1);
        assert_eq!(env.custodied(&jar).unwrap(), 1);
        let comments = env.get_comments(&jar).unwrap();
        assert_eq!(
            comments,
            vec![TipRecord {
                timestamp: GENESIS + 2,
                name: "Ric".to_string(),
                from: tipper,
                message: "Great Content, keep going".to_string(),
            }]
        );
    }

    #[test]
    fn unfunded_tip_changes_nothing() {
        let (owner, tipper) = (principal(1), principal(2));
        let (mut env, jar) = funded(owner, &[], LAMPORTS_PER_SOL);
        let top_up = env
            .rent()
            .minimum_balance(TipJar::BASE_SPACE + TipRecord::space_for("Ric", "hi"))
            - env.rent().minimum_balance(TipJar::BASE_SPACE);
        // enough for the tip itself but not for the rent on top of it
        env.airdrop(tipper, top_up + 5);
        let (before, held) = (env.now(), env.balance(&jar).unwrap());

        let err = env.submit_tip(&jar, &tipper, "Ric", "hi", 6).unwrap_err();
        assert!(matches!(
            err,
            EnvError::InsufficientCallerFunds { available, required, .. }
                if available == top_up + 5 && required == top_up + 6
        ));
        assert_eq!(env.balance(&tipper).unwrap(), top_up + 5);
        assert_eq!(env.balance(&jar).unwrap(), held);
        assert_eq!(env.account_data(&jar).unwrap().len(), TipJar::BASE_SPACE);
        assert!(env.get_comments(&jar).unwrap().is_empty());
        assert_eq!(env.now(), before);
    }

    #[test]
    fn tip_to_unknown_jar_fails() {
        let mut env = LocalEnvironment::new(GENESIS);
        env.airdrop(principal(2), 5);
        let err = env
            .submit_tip(&principal(9), &principal(2), "a", "b", 1)
            .unwrap_err();
        assert!(matches!(err, EnvError::UnknownJar(_)));
        assert_eq!(env.balance(&principal(2)).unwrap(), 5);
    }

    #[test]
    fn comments_are_read_from_account_data() {
        let (owner, tipper) = (principal(1), principal(2));
        let (mut env, jar) = funded(owner, &[tipper], LAMPORTS_PER_SOL);
        for idx in 0..40 {
            env.submit_tip(&jar, &tipper, "Fran", &format!("such cool, much nice #{idx}"), 1)
                .unwrap();
        }

        // far beyond what a single return-data buffer could carry
        let data = env.account_data(&jar).unwrap();
        assert!(data.len() > 1024);
        let comments = fetch_comments(data).unwrap();
        assert_eq!(comments.len(), 40);
        assert_eq!(comments, env.get_comments(&jar).unwrap());
        assert_eq!(comments[39].message, "such cool, much nice #39");

        assert!(matches!(fetch_comments(&data[8..]), Err(EnvError::Ledger(_))));
    }

    #[test]
    fn stranger_cannot_withdraw() {
        let (owner, tipper) = (principal(1), principal(2));
        let (mut env, jar) = funded(owner, &[tipper], LAMPORTS_PER_SOL);
        env.submit_tip(&jar, &tipper, "Ric", "hi", 4).unwrap();
        let held = env.balance(&jar).unwrap();

        let err = env.withdraw_all(&jar, &tipper).unwrap_err();
        assert!(matches!(err, EnvError::Unauthorized { caller, .. } if caller == tipper));
        assert_eq!(env.balance(&jar).unwrap(), held);
        assert_eq!(env.custodied(&jar).unwrap(), 4);
        assert_eq!(env.get_comments(&jar).unwrap().len(), 1);
    }

    #[test]
    fn owner_withdraws_everything_once() {
        let (owner, tipper) = (principal(1), principal(2));
        let (mut env, jar) = funded(owner, &[tipper], LAMPORTS_PER_SOL);
        env.submit_tip(&jar, &tipper, "Ric", "hi", 3).unwrap();
        env.submit_tip(&jar, &tipper, "Ric", "again", 4).unwrap();
        let before = env.balance(&owner).unwrap();

        env.withdraw_all(&jar, &owner).unwrap();
        assert_eq!(env.balance(&owner).unwrap(), before + 7);
        assert_eq!(env.balance(&jar).unwrap(), reserve(&env, &jar));
        assert_eq!(env.custodied(&jar).unwrap(), 0);

        env.withdraw_all(&jar, &owner).unwrap();
        assert_eq!(env.balance(&owner).unwrap(), before + 7);
        assert_eq!(env.get_comments(&jar).unwrap().len(), 2);
    }

    #[test]
    fn rejected_transfer_rolls_back_withdrawal() {
        let (owner, tipper) = (principal(1), principal(2));
        let (mut env, jar) = funded(owner, &[tipper], LAMPORTS_PER_SOL);
        env.submit_tip(&jar, &tipper, "Ric", "hi", 3).unwrap();
        env.reject_deposits(owner);
        let (before, held, owned) = (
            env.now(),
            env.balance(&jar).unwrap(),
            env.balance(&owner).unwrap(),
        );

        let err = env.withdraw_all(&jar, &owner).unwrap_err();
        assert!(matches!(err, EnvError::TransferFailure { amount: 3, .. }));
        assert_eq!(env.custodied(&jar).unwrap(), 3);
        assert_eq!(env.jar(&jar).unwrap().total_withdrawn, 0);
        assert_eq!(env.balance(&jar).unwrap(), held);
        assert_eq!(env.balance(&owner).unwrap(), owned);
        assert_eq!(env.now(), before);
    }

    #[test]
    fn empty_withdrawal_to_rejecting_owner_succeeds() {
        let owner = principal(1);
        let (mut env, jar) = funded(owner, &[], LAMPORTS_PER_SOL);
        env.reject_deposits(owner);
        env.withdraw_all(&jar, &owner).unwrap();
    }

    #[test]
    fn exhausted_clock_rejects_calls_without_side_effects() {
        let (owner, tipper) = (principal(1), principal(2));
        let mut env = LocalEnvironment::new(i64::MAX - 1);
        env.airdrop(owner, LAMPORTS_PER_SOL);
        env.airdrop(tipper, LAMPORTS_PER_SOL);
        let jar = env.create_jar(&owner).unwrap();
        assert_eq!(env.now(), i64::MAX);
        let held = env.balance(&jar).unwrap();

        let err = env.submit_tip(&jar, &tipper, "Ric", "hi", 1).unwrap_err();
        assert!(matches!(err, EnvError::ClockExhausted(i64::MAX)));
        assert!(matches!(
            env.withdraw_all(&jar, &owner),
            Err(EnvError::ClockExhausted(_))
        ));
        assert_eq!(env.balance(&tipper).unwrap(), LAMPORTS_PER_SOL);
        assert_eq!(env.balance(&jar).unwrap(), held);
        assert!(env.get_comments(&jar).unwrap().is_empty());

        let mut late = LocalEnvironment::new(i64::MAX);
        late.airdrop(owner, LAMPORTS_PER_SOL);
        assert!(matches!(late.create_jar(&owner), Err(EnvError::ClockExhausted(_))));
        assert_eq!(late.balance(&owner).unwrap(), LAMPORTS_PER_SOL);
    }

    #[derive(Debug, Clone)]
    enum Call {
        Tip { tipper: u8, value: u64 },
        Withdraw { by_owner: bool },
    }

    fn call() -> impl Strategy<Value = Call> {
        prop_oneof![
            4 => (0u8..3, 0u64..40).prop_map(|(tipper, value)| Call::Tip { tipper, value }),
            1 => any::<bool>().prop_map(|by_owner| Call::Withdraw { by_owner }),
        ]
    }

    proptest! {
        #[test]
        fn funds_are_conserved_and_log_is_ordered(calls in prop::collection::vec(call(), 0..40)) {
            const START: u64 = 10 * LAMPORTS_PER_SOL;
            let owner = principal(1);
            let tippers = [principal(2), principal(3), principal(4)];
            let (mut env, jar) = funded(owner, &tippers, START);
            let base = env.rent().minimum_balance(TipJar::BASE_SPACE);

            let mut accepted = Vec::new();
            let mut tipped = 0u64;
            let mut withdrawn = 0u64;

            for call in calls {
                match call {
                    Call::Tip { tipper, value } => {
                        let tipper = tippers[usize::from(tipper)];
                        if env.submit_tip(&jar, &tipper, "n", "m", value).is_ok() {
                            accepted.push(tipper);
                            tipped += value;
                        }
                    }
                    Call::Withdraw { by_owner } => {
                        let caller = if by_owner { owner } else { tippers[0] };
                        let before = env.custodied(&jar).unwrap();
                        let result = env.withdraw_all(&jar, &caller);
                        prop_assert_eq!(result.is_ok(), by_owner);
                        if by_owner {
                            withdrawn += before;
                            prop_assert_eq!(env.custodied(&jar).unwrap(), 0);
                        }
                    }
                }

                // the jar never holds less than its reserve plus custody
                prop_assert_eq!(
                    env.balance(&jar).unwrap(),
                    reserve(&env, &jar) + env.custodied(&jar).unwrap()
                );
            }

            prop_assert_eq!(env.custodied(&jar).unwrap(), tipped - withdrawn);
            prop_assert_eq!(env.balance(&owner).unwrap(), START - base + withdrawn);

            // whatever is left can always be paid out
            env.withdraw_all(&jar, &owner).unwrap();
            prop_assert_eq!(env.balance(&jar).unwrap(), reserve(&env, &jar));
            prop_assert_eq!(env.balance(&owner).unwrap(), START - base + tipped);

            let total: u64 = tippers.iter().map(|t| env.balance(t).unwrap()).sum::<u64>()
                + env.balance(&owner).unwrap()
                + env.balance(&jar).unwrap();
            prop_assert_eq!(total, 4 * START);

            let senders: Vec<_> = env.get_comments(&jar).unwrap().iter().map(|c| c.from).collect();
            prop_assert_eq!(senders, accepted);
        }
    }
}
