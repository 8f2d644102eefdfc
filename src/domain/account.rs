//! Account manager: the lock-guarded balance ledger of one trading account.
//!
//! All balance reads and writes go through [`AccountManager::mutate`],
//! [`AccountManager::query`] or [`AccountManager::with_ledger`], which hold
//! the account's coarse lock for the duration of the closure. Valuation and
//! fund allocation run under the same lock so they see one consistent set of
//! balances.

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::account_config::{AccountConfig, SymbolPair};
use super::allocation::AllocationCache;
use super::balance::Balance;
use super::error::LedgerError;
use super::ledger::Ledger;
use super::lock::{LockStrategy, SharedLock, SimulatedLock};
use super::order::{Order, OrderRequest, Side};
use super::price_table::PriceTable;
use super::valuation::{MarginReserveFactor, MarginValuation};
use crate::ports::account_port::ExternalAccountAdapter;
use crate::ports::allocation_port::AllocationComputer;

/// Account shared between threads.
pub type LiveAccount = AccountManager<SharedLock>;

/// Account confined to a single thread, backed by a simulated venue.
pub type SimulatedAccount = AccountManager<SimulatedLock>;

/// What a call to [`AccountManager::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another caller held the ledger; nothing happened.
    Busy,
    /// The previous refresh is younger than the refresh interval.
    Debounced,
    /// The adapter failed; the ledger is unchanged.
    Failed,
    /// The adapter reported no balances; the ledger is unchanged.
    Empty,
    Refreshed,
}

pub struct AccountManager<L: LockStrategy = SharedLock> {
    config: AccountConfig,
    tradable_symbols: BTreeSet<String>,
    adapter: Arc<dyn ExternalAccountAdapter>,
    valuation: MarginValuation,
    ledger: L,
}

impl<L: LockStrategy> AccountManager<L> {
    /// Builds an account. Fails when the reference currency is blank, no
    /// pairs are configured, the adapter's margin reserve percentage is
    /// below 100, or a single-threaded lock is paired with a live venue.
    pub fn new(
        adapter: Arc<dyn ExternalAccountAdapter>,
        config: AccountConfig,
    ) -> Result<Self, LedgerError> {
        if config.reference_currency.trim().is_empty() {
            return Err(LedgerError::missing("account", "reference_currency"));
        }
        if config.pairs.is_empty() {
            return Err(LedgerError::missing("account", "pairs"));
        }
        let factor = MarginReserveFactor::from_percentage(adapter.margin_reserve_percentage())?;
        if L::SINGLE_THREADED && !adapter.is_simulated() {
            return Err(LedgerError::invalid(
                "account",
                "simulated",
                "an unsynchronised ledger requires a simulated account",
            ));
        }

        Ok(AccountManager {
            tradable_symbols: config.symbols(),
            config,
            adapter,
            valuation: MarginValuation::new(factor),
            ledger: L::new(Ledger::new()),
        })
    }

    pub fn account_id(&self) -> &str {
        &self.config.id
    }

    pub fn reference_currency(&self) -> &str {
        &self.config.reference_currency
    }

    pub fn can_short_sell(&self) -> bool {
        self.config.shorting_enabled
    }

    pub fn is_simulated(&self) -> bool {
        self.adapter.is_simulated()
    }

    pub fn margin_reserve_factor(&self) -> f64 {
        self.valuation.factor().value()
    }

    pub fn symbol_pairs(&self) -> BTreeMap<String, SymbolPair> {
        self.config.symbol_pairs()
    }

    pub fn tradable_symbols(&self) -> &BTreeSet<String> {
        &self.tradable_symbols
    }

    /// Runs `f` with the ledger locked. Use this to keep a whole trade
    /// decision under one lock acquisition.
    ///
    /// # Panics
    ///
    /// The balance lock is not reentrant. If `f` calls back into this
    /// account, a [`SharedLock`] account deadlocks and a [`SimulatedLock`]
    /// account panics on the second borrow. Read and write through the
    /// `&mut Ledger` handed to `f` instead.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        self.ledger.with(f)
    }

    /// Copy of the balance for `symbol`, creating an empty one if absent.
    pub fn get_or_create(&self, symbol: &str) -> Balance {
        self.ledger.with(|ledger| ledger.get_or_create(symbol).clone())
    }

    pub fn mutate<R>(&self, symbol: &str, f: impl FnOnce(&mut Balance) -> R) -> R {
        self.ledger.with(|ledger| ledger.modify(symbol, f))
    }

    pub fn query<R>(&self, symbol: &str, f: impl FnOnce(&Balance) -> R) -> R {
        self.ledger.with(|ledger| ledger.query(symbol, f))
    }

    pub fn amount(&self, symbol: &str) -> f64 {
        self.query(symbol, |b| b.free)
    }

    pub fn shorted_amount(&self, symbol: &str) -> f64 {
        self.query(symbol, |b| b.shorted)
    }

    pub fn balance_version(&self, symbol: &str) -> u64 {
        self.ledger.with(|ledger| ledger.version(symbol))
    }

    /// Claims `symbol` for a trade decision. Returns false if it is already
    /// claimed; the claim is not reentrant.
    pub fn lock_trading(&self, symbol: &str) -> bool {
        self.ledger.with(|ledger| ledger.lock_trading(symbol))
    }

    pub fn unlock_trading(&self, symbol: &str) {
        self.ledger.with(|ledger| ledger.unlock_trading(symbol))
    }

    /// Deep copy of every balance, safe to read without the lock.
    pub fn snapshot(&self) -> HashMap<String, Balance> {
        self.ledger.with(|ledger| ledger.snapshot())
    }

    pub fn total_funds_in(&self, currency: &str, prices: &PriceTable) -> f64 {
        self.ledger
            .with(|ledger| self.valuation.total_funds_in(ledger, currency, prices))
    }

    pub fn total_funds_in_reference_currency(&self, prices: &PriceTable) -> f64 {
        self.total_funds_in(&self.config.reference_currency, prices)
    }

    /// Funds to commit to a trade on `asset` paid with `fund`, memoised in
    /// `cache` until either symbol's balance changes.
    ///
    /// # Panics
    ///
    /// `computer` runs with the balance lock held. A computer that calls back
    /// into this account deadlocks a [`SharedLock`] account and panics a
    /// [`SimulatedLock`] one. It must read balances through the `&Ledger` it
    /// receives.
    pub fn allocate_funds<C>(
        &self,
        cache: &mut AllocationCache,
        asset: &str,
        fund: &str,
        side: Side,
        computer: &mut C,
    ) -> f64
    where
        C: AllocationComputer + ?Sized,
    {
        self.ledger.with(|ledger| {
            cache.allocate(ledger, &self.config.id, asset, fund, side, computer)
        })
    }

    pub fn refresh(&self) -> RefreshOutcome {
        self.refresh_at(Utc::now())
    }

    /// Replaces the ledger with the adapter's balances, restricted to the
    /// tradable symbols. Does nothing if the ledger is busy or the last
    /// refresh happened less than the refresh interval before `now`.
    pub fn refresh_at(&self, now: DateTime<Utc>) -> RefreshOutcome {
        let outcome = self.ledger.try_with(|ledger| {
            if let Some(last) = ledger.last_refresh() {
                if now - last < self.config.refresh_interval {
                    return RefreshOutcome::Debounced;
                }
            }

            let mut fetched = match self.adapter.fetch_balances() {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!("account {}: balance refresh failed: {e}", self.config.id);
                    return RefreshOutcome::Failed;
                }
            };
            ledger.mark_refreshed(now);
            if fetched.is_empty() {
                warn!("account {}: adapter returned no balances", self.config.id);
                return RefreshOutcome::Empty;
            }

            trace!(
                "account {}: balances updated - available: {}",
                self.config.id,
                describe(&fetched, |_| true)
            );
            fetched.retain(|symbol, _| self.tradable_symbols.contains(symbol));
            debug!(
                "account {}: balances updated - trading: {}",
                self.config.id,
                describe(&fetched, |b| b.total() != 0.0)
            );
            ledger.replace_all(fetched);
            RefreshOutcome::Refreshed
        });

        outcome.unwrap_or_else(|| {
            debug!("account {}: refresh skipped, ledger busy", self.config.id);
            RefreshOutcome::Busy
        })
    }

    /// Sends `request` to the venue. Cancelled requests and orders the venue
    /// cancels come back as `None`; malformed requests never reach the venue.
    pub fn execute_order(&self, request: &OrderRequest) -> Result<Option<Order>, LedgerError> {
        if request.cancelled {
            return Ok(None);
        }
        request.validate()?;

        let order = self.adapter.execute_order(request)?;
        if order.is_cancelled() {
            info!(
                "could not create order. {} {} {} @ {} was cancelled",
                order.side,
                order.quantity,
                request.symbol(),
                order.price
            );
            return Ok(None);
        }
        Ok(Some(order))
    }

    pub fn update_order_status(&self, order: &Order) -> Result<Order, LedgerError> {
        self.adapter.update_order_status(order)
    }

    pub fn cancel(&self, order: &Order) -> Result<(), LedgerError> {
        self.adapter.cancel(order)
    }
}

fn describe(balances: &HashMap<String, Balance>, keep: impl Fn(&Balance) -> bool) -> String {
    let sorted: BTreeMap<&String, f64> = balances
        .iter()
        .filter(|(_, b)| keep(b))
        .map(|(symbol, b)| (symbol, b.total()))
        .collect();
    sorted
        .iter()
        .map(|(symbol, total)| format!("{symbol}={total}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, OrderType};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubAdapter {
        simulated: bool,
        margin_pct: f64,
        balances: Mutex<Result<HashMap<String, Balance>, String>>,
        fetches: AtomicUsize,
        executed: AtomicUsize,
        fill_status: OrderStatus,
    }

    impl StubAdapter {
        fn new(simulated: bool, margin_pct: f64) -> Self {
            StubAdapter {
                simulated,
                margin_pct,
                balances: Mutex::new(Ok(HashMap::new())),
                fetches: AtomicUsize::new(0),
                executed: AtomicUsize::new(0),
                fill_status: OrderStatus::New,
            }
        }

        fn with_balances(self, entries: &[(&str, f64)]) -> Self {
            let map = entries
                .iter()
                .map(|(s, free)| (s.to_string(), Balance::with_free(s, *free)))
                .collect();
            *self.balances.lock().unwrap() = Ok(map);
            self
        }
    }

    impl ExternalAccountAdapter for StubAdapter {
        fn fetch_balances(&self) -> Result<HashMap<String, Balance>, LedgerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.balances
                .lock()
                .unwrap()
                .clone()
                .map_err(|reason| LedgerError::Adapter { reason })
        }

        fn is_simulated(&self) -> bool {
            self.simulated
        }

        fn margin_reserve_percentage(&self) -> f64 {
            self.margin_pct
        }

        fn execute_order(&self, request: &OrderRequest) -> Result<Order, LedgerError> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(Order::from_request("1", request, self.fill_status))
        }

        fn update_order_status(&self, order: &Order) -> Result<Order, LedgerError> {
            Ok(order.clone())
        }

        fn cancel(&self, _order: &Order) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    fn config() -> AccountConfig {
        AccountConfig::new("acc", "USDT", vec![SymbolPair::new("BTC", "USDT")])
    }

    fn live(adapter: Arc<StubAdapter>) -> LiveAccount {
        LiveAccount::new(adapter, config()).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn construction_rejects_blank_reference_currency() {
        let mut cfg = config();
        cfg.reference_currency = "  ".into();
        let result = LiveAccount::new(Arc::new(StubAdapter::new(false, 150.0)), cfg);
        assert!(matches!(result, Err(LedgerError::ConfigMissing { .. })));
    }

    #[test]
    fn construction_rejects_empty_pairs() {
        let mut cfg = config();
        cfg.pairs.clear();
        let result = LiveAccount::new(Arc::new(StubAdapter::new(false, 150.0)), cfg);
        assert!(matches!(result, Err(LedgerError::ConfigMissing { .. })));
    }

    #[test]
    fn construction_rejects_low_margin() {
        let result = LiveAccount::new(Arc::new(StubAdapter::new(false, 50.0)), config());
        assert!(matches!(result, Err(LedgerError::ConfigInvalid { .. })));
    }

    #[test]
    fn simulated_lock_requires_simulated_adapter() {
        let live_venue = SimulatedAccount::new(Arc::new(StubAdapter::new(false, 150.0)), config());
        assert!(live_venue.is_err());
        let sim_venue = SimulatedAccount::new(Arc::new(StubAdapter::new(true, 150.0)), config());
        assert!(sim_venue.is_ok());
    }

    #[test]
    #[should_panic]
    fn simulated_account_panics_on_reentry() {
        let account =
            SimulatedAccount::new(Arc::new(StubAdapter::new(true, 150.0)), config()).unwrap();
        account.with_ledger(|_| account.amount("BTC"));
    }

    #[test]
    fn live_lock_accepts_simulated_adapter() {
        assert!(LiveAccount::new(Arc::new(StubAdapter::new(true, 100.0)), config()).is_ok());
    }

    #[test]
    fn accessors_reflect_config() {
        let account = live(Arc::new(StubAdapter::new(false, 150.0)));
        assert_eq!(account.account_id(), "acc");
        assert_eq!(account.reference_currency(), "USDT");
        assert!(!account.can_short_sell());
        assert!(!account.is_simulated());
        assert_relative_eq!(account.margin_reserve_factor(), 1.5);
        assert!(account.symbol_pairs().contains_key("BTCUSDT"));
        assert!(account.tradable_symbols().contains("BTC"));
    }

    #[test]
    fn mutate_persists_and_bumps_version() {
        let account = live(Arc::new(StubAdapter::new(false, 150.0)));
        account.mutate("BTC", |b| b.free = 1.25);
        assert_relative_eq!(account.amount("BTC"), 1.25);
        assert_eq!(account.get_or_create("BTC").free, 1.25);
        assert_eq!(account.balance_version("BTC"), 1);
    }

    #[test]
    fn trading_lock_round_trip() {
        let account = live(Arc::new(StubAdapter::new(false, 150.0)));
        assert!(account.lock_trading("BTC"));
        assert!(!account.lock_trading("BTC"));
        account.unlock_trading("BTC");
        assert!(account.lock_trading("BTC"));
    }

    #[test]
    fn refresh_debounces_within_interval() {
        let adapter = Arc::new(StubAdapter::new(false, 150.0).with_balances(&[("BTC", 1.0)]));
        let account = live(adapter.clone());

        assert_eq!(account.refresh_at(t0()), RefreshOutcome::Refreshed);
        assert_eq!(
            account.refresh_at(t0() + Duration::seconds(5)),
            RefreshOutcome::Debounced
        );
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 1);

        assert_eq!(
            account.refresh_at(t0() + Duration::seconds(15)),
            RefreshOutcome::Refreshed
        );
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn refresh_keeps_only_tradable_symbols() {
        let adapter = Arc::new(
            StubAdapter::new(false, 150.0).with_balances(&[("BTC", 1.0), ("USDT", 50.0), ("DOGE", 9.0)]),
        );
        let account = live(adapter);
        account.refresh_at(t0());

        let snapshot = account.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key("DOGE"));
        assert_eq!(account.balance_version("USDT"), 1);
    }

    #[test]
    fn refresh_keeps_zero_balances() {
        let adapter =
            Arc::new(StubAdapter::new(false, 150.0).with_balances(&[("BTC", 0.0), ("USDT", 5.0)]));
        let account = live(adapter);
        account.refresh_at(t0());
        assert!(account.snapshot().contains_key("BTC"));
    }

    #[test]
    fn failed_refresh_keeps_previous_balances_and_retries() {
        let adapter = Arc::new(StubAdapter::new(false, 150.0).with_balances(&[("BTC", 1.0)]));
        let account = live(adapter.clone());
        account.refresh_at(t0());

        *adapter.balances.lock().unwrap() = Err("venue down".into());
        let later = t0() + Duration::seconds(20);
        assert_eq!(account.refresh_at(later), RefreshOutcome::Failed);
        assert_relative_eq!(account.amount("BTC"), 1.0);
        assert_eq!(account.refresh_at(later), RefreshOutcome::Failed);
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_refresh_keeps_previous_balances() {
        let adapter = Arc::new(StubAdapter::new(false, 150.0).with_balances(&[("BTC", 1.0)]));
        let account = live(adapter.clone());
        account.refresh_at(t0());

        *adapter.balances.lock().unwrap() = Ok(HashMap::new());
        assert_eq!(
            account.refresh_at(t0() + Duration::seconds(20)),
            RefreshOutcome::Empty
        );
        assert_relative_eq!(account.amount("BTC"), 1.0);
    }

    #[test]
    fn refresh_is_skipped_while_ledger_busy() {
        let adapter = Arc::new(StubAdapter::new(false, 150.0).with_balances(&[("BTC", 1.0)]));
        let account = live(adapter.clone());
        let outcome = account.with_ledger(|_| account.refresh_at(t0()));
        assert_eq!(outcome, RefreshOutcome::Busy);
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn total_funds_in_reference_currency() {
        let account = live(Arc::new(StubAdapter::new(false, 150.0)));
        account.mutate("BTC", |b| b.free = 0.5);
        account.mutate("USDT", |b| b.free = 100.0);
        let prices: PriceTable = [("BTCUSDT".to_string(), 200.0)].into_iter().collect();
        assert_relative_eq!(account.total_funds_in_reference_currency(&prices), 200.0);
    }

    #[test]
    fn allocate_funds_uses_account_id() {
        let account = live(Arc::new(StubAdapter::new(false, 150.0)));
        account.mutate("BTC", |b| b.free = 1.0);
        account.mutate("USDT", |b| b.free = 80.0);
        let mut cache = AllocationCache::new();
        let mut calls = 0;
        let mut computer = |ledger: &Ledger, _: &str, fund: &str, _: Side| -> f64 {
            calls += 1;
            ledger.free(fund) / 4.0
        };

        let first = account.allocate_funds(&mut cache, "BTC", "USDT", Side::Buy, &mut computer);
        let second = account.allocate_funds(&mut cache, "BTC", "USDT", Side::Buy, &mut computer);
        assert_relative_eq!(first, 20.0);
        assert_relative_eq!(second, 20.0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn execute_order_rejects_invalid_request_locally() {
        let adapter = Arc::new(StubAdapter::new(false, 150.0));
        let account = live(adapter.clone());
        let request = OrderRequest::new("BTC", "USDT", Side::Buy, OrderType::Limit);
        assert!(matches!(
            account.execute_order(&request),
            Err(LedgerError::InvalidOrder { .. })
        ));
        assert_eq!(adapter.executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn execute_order_skips_cancelled_request() {
        let adapter = Arc::new(StubAdapter::new(false, 150.0));
        let account = live(adapter.clone());
        let mut request = OrderRequest::new("BTC", "USDT", Side::Buy, OrderType::Market);
        request.cancelled = true;
        assert_eq!(account.execute_order(&request).unwrap(), None);
        assert_eq!(adapter.executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn venue_cancelled_order_is_none() {
        let mut stub = StubAdapter::new(false, 150.0);
        stub.fill_status = OrderStatus::Cancelled;
        let account = live(Arc::new(stub));
        let mut request = OrderRequest::new("BTC", "USDT", Side::Sell, OrderType::Market);
        request.quantity = 1.0;
        assert_eq!(account.execute_order(&request).unwrap(), None);
    }

    #[test]
    fn accepted_order_is_returned() {
        let account = live(Arc::new(StubAdapter::new(false, 150.0)));
        let mut request = OrderRequest::new("BTC", "USDT", Side::Buy, OrderType::Limit);
        request.quantity = 1.0;
        request.price = 100.0;
        let order = account.execute_order(&request).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(account.update_order_status(&order).unwrap(), order);
        assert!(account.cancel(&order).is_ok());
    }
}
