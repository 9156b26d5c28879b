#![no_std]
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, Address, Env, Symbol,
    Vec,
};

/// Centralized contract error codes. Auth failures are signaled by host panic (require_auth).
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u32)]
pub enum IfoError {
    /// Rejected pool parameters (start_ledger >= end_ledger, or a non-positive amount).
    InvalidConfiguration = 1,
    /// Pool parameters were already set.
    AlreadyInitialized = 2,
    /// Pool is not initialized (no config stored).
    NotInitialized = 3,
    /// Current ledger is outside the [start_ledger, end_ledger) sale window.
    SaleNotActive = 4,
    /// Participant has not posted the collateral stake.
    CollateralRequired = 5,
    /// Participant already posted the collateral stake.
    AlreadyCollateralized = 6,
    /// Participant's token balance is below the required transfer amount.
    InsufficientBalance = 7,
    /// Amount is invalid (non-positive where positive is required).
    InvalidAmount = 8,
    /// Harvest attempted before end_ledger.
    HarvestNotYetAllowed = 9,
    /// Participant already harvested; the claim is one-shot.
    AlreadyHarvested = 10,
    /// Pool escrow does not hold enough tokens to settle the transfer.
    EscrowShortfall = 11,
    /// Admin parameter edits are only allowed before start_ledger.
    SaleAlreadyStarted = 12,
}

// ── Event symbols ────────────────────────────────────────────
const EVENT_INIT: Symbol = symbol_short!("init");
const EVENT_COLLATERAL: Symbol = symbol_short!("collat");
const EVENT_DEPOSIT: Symbol = symbol_short!("deposit");
const EVENT_HARVEST: Symbol = symbol_short!("harvest");
const EVENT_OFFERING_SET: Symbol = symbol_short!("offer_set");
const EVENT_RAISING_SET: Symbol = symbol_short!("raise_set");
const EVENT_FINAL_WITHDRAW: Symbol = symbol_short!("final_wd");

/// Denominator for `get_user_allocation`: shares are reported in
/// parts-per-million of the total raised.
const ALLOCATION_PRECISION: i128 = 1_000_000;

// ── Data structures ──────────────────────────────────────────

/// Sale parameters, fixed at initialization. The offering and raising targets
/// may be adjusted by the admin until the sale window opens; everything else
/// is immutable.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct PoolConfig {
    pub raising_token: Address,
    pub offering_token: Address,
    pub collateral_token: Address,
    pub start_ledger: u32,
    pub end_ledger: u32,
    pub raising_amount: i128,
    pub offering_amount: i128,
    pub collateral_amount: i128,
    pub admin: Address,
}

/// Per-participant sale state. Created implicitly on first interaction.
/// `has_collateral` is set true exactly once; `amount` only grows while the
/// window is open; `harvested` flips false -> true exactly once.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantAccount {
    pub has_collateral: bool,
    pub amount: i128,
    pub harvested: bool,
}

/// Storage keys. `Config` and `TotalRaised` are pool-wide singletons;
/// `Participant` holds per-address state; `ParticipantCount`/`ParticipantItem`
/// index depositors in first-deposit order for the paged registry query.
#[contracttype]
pub enum DataKey {
    Config,
    Participant(Address),
    TotalRaised,
    ParticipantCount,
    ParticipantItem(u32),
}

/// Maximum number of participants returned in a single page.
const MAX_PAGE_LIMIT: u32 = 20;

// ── Contract ─────────────────────────────────────────────────
#[contract]
pub struct IfoPool;

#[contractimpl]
impl IfoPool {
    fn load_config(env: &Env) -> Result<PoolConfig, IfoError> {
        env.storage()
            .persistent()
            .get(&DataKey::Config)
            .ok_or(IfoError::NotInitialized)
    }

    fn load_participant(env: &Env, participant: &Address) -> ParticipantAccount {
        env.storage()
            .persistent()
            .get(&DataKey::Participant(participant.clone()))
            .unwrap_or(ParticipantAccount {
                has_collateral: false,
                amount: 0,
                harvested: false,
            })
    }

    fn save_participant(env: &Env, participant: &Address, account: &ParticipantAccount) {
        env.storage()
            .persistent()
            .set(&DataKey::Participant(participant.clone()), account);
    }

    /// Collateral postings and deposits are accepted only while the current
    /// ledger is inside `[start_ledger, end_ledger)`.
    fn require_sale_window(config: &PoolConfig, current: u32) -> Result<(), IfoError> {
        if current < config.start_ledger || current >= config.end_ledger {
            return Err(IfoError::SaleNotActive);
        }
        Ok(())
    }

    /// Pro-rata payout math shared by `harvest` and the preview queries.
    ///
    /// Returns `(offering_payout, raising_refund)`:
    /// - undersubscribed (`total_raised <= raising_amount`): the deposit buys
    ///   its full share of the offering at the target price, no refund;
    /// - oversubscribed: the deposit is scaled down to its share of the
    ///   actual total, and the unused raising tokens come back as refund.
    ///
    /// Floor division throughout. The same rule applies to every participant,
    /// so summed payouts never exceed the configured offering amount; rounding
    /// dust stays in escrow.
    fn payout_for(
        deposit_amount: i128,
        total_raised: i128,
        raising_amount: i128,
        offering_amount: i128,
    ) -> (i128, i128) {
        if deposit_amount <= 0 || raising_amount <= 0 || offering_amount <= 0 {
            return (0, 0);
        }
        if total_raised <= raising_amount {
            let payout = deposit_amount
                .checked_mul(offering_amount)
                .expect("math overflow")
                .checked_div(raising_amount)
                .expect("division overflow");
            return (payout, 0);
        }
        let payout = deposit_amount
            .checked_mul(offering_amount)
            .expect("math overflow")
            .checked_div(total_raised)
            .expect("division overflow");
        let kept = deposit_amount
            .checked_mul(raising_amount)
            .expect("math overflow")
            .checked_div(total_raised)
            .expect("division overflow");
        (payout, deposit_amount - kept)
    }

    // ── Initialization ────────────────────────────────────────

    /// Set the pool parameters. Argument order mirrors the deployment wiring:
    /// tokens, window, targets, admin, collateral.
    ///
    /// The offering escrow is funded out-of-band: the operator transfers
    /// `offering_amount` of the offering token to the contract address before
    /// the window closes. An underfunded escrow surfaces as `EscrowShortfall`
    /// at harvest time.
    ///
    /// # Errors
    /// - `AlreadyInitialized`: a config is already stored
    /// - `InvalidConfiguration`: `start_ledger >= end_ledger`, a non-positive
    ///   raising/offering amount, or a negative collateral amount
    // This entrypoint shape mirrors the deployment parameter list directly,
    // so we allow this specific arity.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        env: Env,
        raising_token: Address,
        offering_token: Address,
        start_ledger: u32,
        end_ledger: u32,
        offering_amount: i128,
        raising_amount: i128,
        admin: Address,
        collateral_token: Address,
        collateral_amount: i128,
    ) -> Result<(), IfoError> {
        if env.storage().persistent().has(&DataKey::Config) {
            return Err(IfoError::AlreadyInitialized);
        }
        if start_ledger >= end_ledger
            || raising_amount <= 0
            || offering_amount <= 0
            || collateral_amount < 0
        {
            return Err(IfoError::InvalidConfiguration);
        }

        let config = PoolConfig {
            raising_token: raising_token.clone(),
            offering_token: offering_token.clone(),
            collateral_token,
            start_ledger,
            end_ledger,
            raising_amount,
            offering_amount,
            collateral_amount,
            admin: admin.clone(),
        };
        env.storage().persistent().set(&DataKey::Config, &config);
        env.storage().persistent().set(&DataKey::TotalRaised, &0_i128);

        env.events().publish(
            (EVENT_INIT, admin),
            (raising_token, offering_token, start_ledger, end_ledger),
        );
        Ok(())
    }

    /// Return the pool parameters, if initialized.
    pub fn get_config(env: Env) -> Option<PoolConfig> {
        env.storage().persistent().get(&DataKey::Config)
    }

    // ── Collateral gate ───────────────────────────────────────

    /// Post the flat collateral stake. Required once per participant before
    /// any deposit, and only possible while the sale window is open.
    ///
    /// Transfers `collateral_amount` of the collateral token from
    /// `participant` into escrow and marks the account collateralized.
    /// A zero collateral amount marks the account without a transfer.
    ///
    /// # Errors
    /// - `SaleNotActive`: current ledger outside `[start_ledger, end_ledger)`
    /// - `AlreadyCollateralized`: the stake was already posted
    /// - `InsufficientBalance`: participant holds less than the stake
    pub fn deposit_collateral(env: Env, participant: Address) -> Result<(), IfoError> {
        participant.require_auth();
        let config = Self::load_config(&env)?;
        Self::require_sale_window(&config, env.ledger().sequence())?;

        let mut account = Self::load_participant(&env, &participant);
        if account.has_collateral {
            return Err(IfoError::AlreadyCollateralized);
        }

        if config.collateral_amount > 0 {
            let collateral = token::Client::new(&env, &config.collateral_token);
            if collateral.balance(&participant) < config.collateral_amount {
                return Err(IfoError::InsufficientBalance);
            }
            collateral.transfer(
                &participant,
                &env.current_contract_address(),
                &config.collateral_amount,
            );
        }

        account.has_collateral = true;
        Self::save_participant(&env, &participant, &account);

        env.events()
            .publish((EVENT_COLLATERAL, participant), config.collateral_amount);
        Ok(())
    }

    /// Returns `true` if `participant` has posted the collateral stake.
    pub fn has_collateral(env: Env, participant: Address) -> bool {
        Self::load_participant(&env, &participant).has_collateral
    }

    // ── Deposits ──────────────────────────────────────────────

    /// Deposit `amount` of the raising token into the sale.
    ///
    /// Repeatable while the window is open; deposits accumulate. There is no
    /// per-participant cap: oversubscription is resolved at harvest, not at
    /// deposit time. Zero and negative amounts are rejected.
    ///
    /// # Errors
    /// - `SaleNotActive`: current ledger outside `[start_ledger, end_ledger)`
    /// - `CollateralRequired`: no collateral stake posted
    /// - `InvalidAmount`: `amount <= 0`
    /// - `InsufficientBalance`: participant holds less than `amount`
    pub fn deposit(env: Env, participant: Address, amount: i128) -> Result<(), IfoError> {
        participant.require_auth();
        let config = Self::load_config(&env)?;
        Self::require_sale_window(&config, env.ledger().sequence())?;

        let mut account = Self::load_participant(&env, &participant);
        if !account.has_collateral {
            return Err(IfoError::CollateralRequired);
        }
        if amount <= 0 {
            return Err(IfoError::InvalidAmount);
        }

        let raising = token::Client::new(&env, &config.raising_token);
        if raising.balance(&participant) < amount {
            return Err(IfoError::InsufficientBalance);
        }
        raising.transfer(&participant, &env.current_contract_address(), &amount);

        // First deposit appends the participant to the registry.
        if account.amount == 0 {
            let count: u32 = env
                .storage()
                .persistent()
                .get(&DataKey::ParticipantCount)
                .unwrap_or(0);
            env.storage()
                .persistent()
                .set(&DataKey::ParticipantItem(count), &participant);
            env.storage()
                .persistent()
                .set(&DataKey::ParticipantCount, &(count + 1));
        }

        account.amount = account.amount.checked_add(amount).expect("math overflow");
        Self::save_participant(&env, &participant, &account);

        let total = Self::total_raised(env.clone())
            .checked_add(amount)
            .expect("math overflow");
        env.storage().persistent().set(&DataKey::TotalRaised, &total);

        env.events()
            .publish((EVENT_DEPOSIT, participant), (amount, total));
        Ok(())
    }

    /// Return `participant`'s cumulative raising-token deposit.
    pub fn get_deposit(env: Env, participant: Address) -> i128 {
        Self::load_participant(&env, &participant).amount
    }

    /// Return the running total of all deposits.
    pub fn total_raised(env: Env) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::TotalRaised)
            .unwrap_or(0)
    }

    /// Return `participant`'s share of the pool in parts-per-million of the
    /// total raised (floor division). Defined as 0 while nothing has been
    /// raised.
    pub fn get_user_allocation(env: Env, participant: Address) -> i128 {
        let total = Self::total_raised(env.clone());
        if total == 0 {
            return 0;
        }
        Self::load_participant(&env, &participant)
            .amount
            .checked_mul(ALLOCATION_PRECISION)
            .expect("math overflow")
            .checked_div(total)
            .expect("division overflow")
    }

    // ── Allocation arithmetic ─────────────────────────────────

    /// Compute `(offering_payout, raising_refund)` for a deposit against the
    /// given pool totals. Pure arithmetic over the four scalar inputs, no
    /// storage access; exposed for off-chain verification.
    pub fn compute_payout(
        _env: Env,
        deposit_amount: i128,
        total_raised: i128,
        raising_amount: i128,
        offering_amount: i128,
    ) -> (i128, i128) {
        Self::payout_for(deposit_amount, total_raised, raising_amount, offering_amount)
    }

    /// Preview the offering tokens `participant` would receive from a harvest
    /// at the current totals. 0 if the pool is not initialized.
    pub fn get_offering_payout(env: Env, participant: Address) -> i128 {
        let config = match Self::load_config(&env) {
            Ok(config) => config,
            Err(_) => return 0,
        };
        let account = Self::load_participant(&env, &participant);
        Self::payout_for(
            account.amount,
            Self::total_raised(env.clone()),
            config.raising_amount,
            config.offering_amount,
        )
        .0
    }

    /// Preview the raising-token refund `participant` would receive from a
    /// harvest at the current totals. Non-zero only when oversubscribed.
    pub fn get_refund(env: Env, participant: Address) -> i128 {
        let config = match Self::load_config(&env) {
            Ok(config) => config,
            Err(_) => return 0,
        };
        let account = Self::load_participant(&env, &participant);
        Self::payout_for(
            account.amount,
            Self::total_raised(env.clone()),
            config.raising_amount,
            config.offering_amount,
        )
        .1
    }

    // ── Harvest ───────────────────────────────────────────────

    /// One-shot claim after the window closes: pays the pro-rata offering
    /// share, any oversubscription refund, and returns the collateral stake.
    ///
    /// The collateral comes back in full regardless of sale outcome, including
    /// for stakers who never deposited. All three escrow legs are checked
    /// before the first transfer; a shortfall fails the whole harvest and
    /// leaves the account unharvested.
    ///
    /// # Errors
    /// - `HarvestNotYetAllowed`: current ledger below `end_ledger`
    /// - `CollateralRequired`: no collateral stake posted
    /// - `AlreadyHarvested`: the claim was already made
    /// - `EscrowShortfall`: pool escrow cannot cover a transfer
    pub fn harvest(env: Env, participant: Address) -> Result<(), IfoError> {
        participant.require_auth();
        let config = Self::load_config(&env)?;
        if env.ledger().sequence() < config.end_ledger {
            return Err(IfoError::HarvestNotYetAllowed);
        }

        let mut account = Self::load_participant(&env, &participant);
        if !account.has_collateral {
            return Err(IfoError::CollateralRequired);
        }
        if account.harvested {
            return Err(IfoError::AlreadyHarvested);
        }

        let (offering_payout, refund) = Self::payout_for(
            account.amount,
            Self::total_raised(env.clone()),
            config.raising_amount,
            config.offering_amount,
        );

        let contract_addr = env.current_contract_address();
        let offering = token::Client::new(&env, &config.offering_token);
        let raising = token::Client::new(&env, &config.raising_token);
        let collateral = token::Client::new(&env, &config.collateral_token);

        // All three legs are checked before the first transfer is made.
        if offering.balance(&contract_addr) < offering_payout
            || raising.balance(&contract_addr) < refund
            || collateral.balance(&contract_addr) < config.collateral_amount
        {
            return Err(IfoError::EscrowShortfall);
        }

        if offering_payout > 0 {
            offering.transfer(&contract_addr, &participant, &offering_payout);
        }
        if refund > 0 {
            raising.transfer(&contract_addr, &participant, &refund);
        }
        if config.collateral_amount > 0 {
            collateral.transfer(&contract_addr, &participant, &config.collateral_amount);
        }

        account.harvested = true;
        Self::save_participant(&env, &participant, &account);

        env.events().publish(
            (EVENT_HARVEST, participant),
            (offering_payout, refund, config.collateral_amount),
        );
        Ok(())
    }

    /// Returns `true` if `participant` has already harvested.
    pub fn has_harvested(env: Env, participant: Address) -> bool {
        Self::load_participant(&env, &participant).harvested
    }

    // ── Participant registry ──────────────────────────────────

    /// Return the number of unique depositors.
    pub fn get_participant_count(env: Env) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::ParticipantCount)
            .unwrap_or(0)
    }

    /// Return a page of depositor addresses. Limit capped at MAX_PAGE_LIMIT (20).
    /// Ordering: by first-deposit index, deterministic.
    pub fn get_participants_page(env: Env, start: u32, limit: u32) -> (Vec<Address>, Option<u32>) {
        let count = Self::get_participant_count(env.clone());

        let effective_limit = if limit == 0 || limit > MAX_PAGE_LIMIT {
            MAX_PAGE_LIMIT
        } else {
            limit
        };

        if start >= count {
            return (Vec::new(&env), None);
        }

        let end = core::cmp::min(start + effective_limit, count);
        let mut results = Vec::new(&env);

        for i in start..end {
            let participant: Address = env
                .storage()
                .persistent()
                .get(&DataKey::ParticipantItem(i))
                .unwrap();
            results.push_back(participant);
        }

        let next_cursor = if end < count { Some(end) } else { None };
        (results, next_cursor)
    }

    // ── Admin surface ─────────────────────────────────────────

    /// Update the total offering amount. Admin only, and only before the sale
    /// window opens.
    pub fn set_offering_amount(env: Env, amount: i128) -> Result<(), IfoError> {
        let mut config = Self::load_config(&env)?;
        config.admin.require_auth();
        if env.ledger().sequence() >= config.start_ledger {
            return Err(IfoError::SaleAlreadyStarted);
        }
        if amount <= 0 {
            return Err(IfoError::InvalidAmount);
        }
        let previous = config.offering_amount;
        config.offering_amount = amount;
        env.storage().persistent().set(&DataKey::Config, &config);
        env.events()
            .publish((EVENT_OFFERING_SET, config.admin), (previous, amount));
        Ok(())
    }

    /// Update the target raising amount. Admin only, and only before the sale
    /// window opens.
    pub fn set_raising_amount(env: Env, amount: i128) -> Result<(), IfoError> {
        let mut config = Self::load_config(&env)?;
        config.admin.require_auth();
        if env.ledger().sequence() >= config.start_ledger {
            return Err(IfoError::SaleAlreadyStarted);
        }
        if amount <= 0 {
            return Err(IfoError::InvalidAmount);
        }
        let previous = config.raising_amount;
        config.raising_amount = amount;
        env.storage().persistent().set(&DataKey::Config, &config);
        env.events()
            .publish((EVENT_RAISING_SET, config.admin), (previous, amount));
        Ok(())
    }

    /// Withdraw leftover raising and offering tokens from escrow to the admin
    /// address. Covers the undistributed raise and rounding dust after all
    /// harvests, or a full recovery if the sale is abandoned. Withdrawing
    /// funds participants still have claims on is the admin's responsibility
    /// to avoid.
    ///
    /// # Errors
    /// - `InvalidAmount`: a negative amount
    /// - `EscrowShortfall`: an amount above the escrow balance
    pub fn final_withdraw(
        env: Env,
        raising_amount: i128,
        offering_amount: i128,
    ) -> Result<(), IfoError> {
        let config = Self::load_config(&env)?;
        config.admin.require_auth();
        if raising_amount < 0 || offering_amount < 0 {
            return Err(IfoError::InvalidAmount);
        }

        let contract_addr = env.current_contract_address();
        let raising = token::Client::new(&env, &config.raising_token);
        let offering = token::Client::new(&env, &config.offering_token);
        if raising.balance(&contract_addr) < raising_amount
            || offering.balance(&contract_addr) < offering_amount
        {
            return Err(IfoError::EscrowShortfall);
        }

        if raising_amount > 0 {
            raising.transfer(&contract_addr, &config.admin, &raising_amount);
        }
        if offering_amount > 0 {
            offering.transfer(&contract_addr, &config.admin, &offering_amount);
        }

        env.events().publish(
            (EVENT_FINAL_WITHDRAW, config.admin),
            (raising_amount, offering_amount),
        );
        Ok(())
    }
}

mod test_auth;
