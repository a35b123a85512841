//! The lot allocator.
//!
//! [`LotAllocator`] walks one security's ordered event stream once, left to
//! right. Each event is planned as a [`Step`] against the current store and
//! committed only when planning succeeds, so between events the store is
//! always consistent.
//!
//! | Effect | Action |
//! |--------|--------|
//! | new shares | open a parentless lot for the full quantity |
//! | dispose shares | consume the account's open lots |
//! | transfer cluster | move lots from source to destination accounts |
//! | split | replace every open lot with a scaled successor |
//! | no-op | skip |

use lotledger_core::{
    Ident, InvestmentTransaction, Lot, LotId, LotStore, Placement, Security, ShareEffect,
    SyntheticId, SyntheticKind, SyntheticTransaction, TxnId, TxnRef,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::order::{self, Event, TransferCluster};
use crate::step::{Changes, Destination, Step};
use crate::{select, AllocationError, AllocatorOptions, OpenLotSummary};

/// Result of allocating one security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    /// The finished lot store.
    pub store: LotStore,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<AllocationError>,
}

/// Allocates the transactions of one security to lots.
#[derive(Debug)]
pub struct LotAllocator<'a> {
    security: &'a Security,
    options: &'a AllocatorOptions,
    store: LotStore,
    balances: BTreeMap<Ident, Decimal>,
    warnings: Vec<AllocationError>,
}

impl<'a> LotAllocator<'a> {
    /// Create an allocator with a fresh lot store.
    pub fn new(security: &'a Security, options: &'a AllocatorOptions) -> Self {
        Self {
            security,
            options,
            store: LotStore::new(security.id.clone()),
            balances: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Run the allocation to completion.
    pub fn run(mut self) -> Result<AllocationOutcome, AllocationError> {
        let security = self.security;
        let ordered = order::order_transactions(&security.transactions);
        let events = order::group_events(&security.id, &ordered, self.options.tolerance)?;

        for event in &events {
            self.process(event)?;
        }

        info!(
            security = %self.security.id,
            lots = self.store.len(),
            open = self.store.open_lots().count(),
            "allocated"
        );
        Ok(self.finish())
    }

    /// The lot store as of the last committed event.
    pub const fn store(&self) -> &LotStore {
        &self.store
    }

    /// Stop allocating and hand out the store and warnings.
    pub fn finish(self) -> AllocationOutcome {
        AllocationOutcome {
            store: self.store,
            warnings: self.warnings,
        }
    }

    /// Plan, commit, and verify one event.
    ///
    /// Events must be fed in the order produced by [`order::group_events`].
    /// When planning fails the store is left as it was before the call.
    pub fn process(&mut self, event: &Event<'_>) -> Result<(), AllocationError> {
        let changes = match event {
            Event::Single(txn) => {
                debug!(txn = %txn, effect = %txn.effect(), "dispatch");
                match txn.effect() {
                    ShareEffect::NewShares | ShareEffect::TransferIn => {
                        self.plan_acquisition(txn)?
                    }
                    ShareEffect::DisposeShares | ShareEffect::TransferOut => {
                        self.plan_disposal(txn)?
                    }
                    ShareEffect::Split => self.plan_split(txn)?,
                    ShareEffect::NoOp => {
                        self.skip(txn);
                        return Ok(());
                    }
                }
            }
            Event::Transfer(cluster) => {
                debug!(
                    seed = %cluster.seed,
                    sources = cluster.sources.len(),
                    destinations = cluster.destinations.len(),
                    "dispatch transfer"
                );
                self.plan_transfer(cluster)?
            }
        };

        changes.apply(&mut self.store)?;

        for txn in event.transactions() {
            if txn.effect() == ShareEffect::Split {
                for balance in self.balances.values_mut() {
                    *balance *= txn.quantity;
                }
            } else {
                *self.balances.entry(txn.account.clone()).or_default() += txn.balance_delta();
            }
        }

        if self.options.verify_balances {
            if let Some(after) = event.last_id() {
                self.verify_balances(after)?;
            }
        }
        Ok(())
    }

    fn skip(&mut self, txn: &InvestmentTransaction) {
        if txn.action.is_unrecognized() {
            warn!(txn = %txn.id, action = %txn.action, "unclassified action, skipping");
            self.warnings.push(AllocationError::UnclassifiedAction {
                txn: txn.id,
                action: txn.action.to_string(),
            });
        } else {
            debug!(txn = %txn.id, action = %txn.action, "no share effect");
        }
    }

    /// Open a new parentless lot for an acquisition.
    fn plan_acquisition(&self, txn: &InvestmentTransaction) -> Result<Changes, AllocationError> {
        let mut step = Step::new(&self.store);
        if txn.shares().is_zero() {
            debug!(txn = %txn.id, "zero-share acquisition, nothing to open");
            return Ok(step.finish());
        }

        let lot = Lot::new(
            step.next_id(),
            txn.account.clone(),
            self.security.id.clone(),
            txn.shares(),
            txn.cost(),
            txn.date,
            txn.id.into(),
        );
        step.stage(lot, Placement::ByAcquisition)?;
        Ok(step.finish())
    }

    /// Consume the account's open lots for a sale or write-off.
    fn plan_disposal(&self, txn: &InvestmentTransaction) -> Result<Changes, AllocationError> {
        let mut step = Step::new(&self.store);
        let required = txn.shares();
        if required.is_zero() {
            debug!(txn = %txn.id, "zero-share disposal, nothing to close");
            return Ok(step.finish());
        }

        let mut pool = self.pull(&txn.account, required, txn.id)?;
        let short = step.consume(&mut pool, required, txn.id.into(), None, self.options.tolerance)?;
        if short > self.options.tolerance {
            return Err(self.shortfall(&txn.account, txn.id, required));
        }
        Ok(step.finish())
    }

    /// Move lots from the source accounts to the destination accounts.
    ///
    /// Requirements are gathered per source account and checked up front.
    /// Sources and destinations are then paired leg by leg; each increment is
    /// the smaller of what the current source leg still removes and what the
    /// current destination leg still receives.
    fn plan_transfer(&self, cluster: &TransferCluster<'_>) -> Result<Changes, AllocationError> {
        let tolerance = self.options.tolerance;
        let mut step = Step::new(&self.store);

        let mut requirements: BTreeMap<&Ident, (Decimal, TxnId)> = BTreeMap::new();
        for txn in &cluster.sources {
            requirements
                .entry(&txn.account)
                .or_insert((Decimal::ZERO, txn.id))
                .0 += txn.shares();
        }
        let mut pools: BTreeMap<&Ident, Vec<LotId>> = BTreeMap::new();
        for (account, (required, first)) in &requirements {
            pools.insert(*account, self.pull(account, *required, *first)?);
        }

        let mut sources = cluster.sources.iter();
        let mut destinations = cluster.destinations.iter();
        let (Some(mut source), Some(mut destination)) = (sources.next(), destinations.next()) else {
            return Ok(step.finish());
        };
        let mut source_left = source.shares();
        let mut destination_left = destination.shares();

        loop {
            let increment = source_left.min(destination_left);
            if increment > tolerance {
                let pool = pools.entry(&source.account).or_default();
                let dest = Destination {
                    account: &destination.account,
                    txn: destination.id.into(),
                };
                let short = step.consume(pool, increment, source.id.into(), Some(dest), tolerance)?;
                if short > tolerance {
                    let (required, _) = requirements[&source.account];
                    return Err(self.shortfall(&source.account, source.id, required));
                }
            }
            source_left -= increment;
            destination_left -= increment;

            if source_left <= tolerance {
                match sources.next() {
                    Some(next) => {
                        source = next;
                        source_left = next.shares();
                    }
                    None => break,
                }
            }
            if destination_left <= tolerance {
                match destinations.next() {
                    Some(next) => {
                        destination = next;
                        destination_left = next.shares();
                    }
                    None => break,
                }
            }
        }

        Ok(step.finish())
    }

    /// Replace every open lot, in every account, with a scaled successor.
    ///
    /// The recording account's lots are closed and re-created by the split
    /// transaction itself; every other account gets one synthetic split
    /// transaction for that role.
    fn plan_split(&self, txn: &InvestmentTransaction) -> Result<Changes, AllocationError> {
        let ratio = txn.quantity;
        if ratio <= Decimal::ZERO {
            return Err(AllocationError::InvalidSplitRatio { txn: txn.id, ratio });
        }

        let mut step = Step::new(&self.store);
        let mut synthetic: BTreeMap<Ident, TxnRef> = BTreeMap::new();
        let open: Vec<Lot> = self.store.open_lots().cloned().collect();

        for lot in &open {
            let by = if lot.account == txn.account {
                TxnRef::Ledger(txn.id)
            } else if let Some(existing) = synthetic.get(&lot.account) {
                *existing
            } else {
                let id = step.add_synthetic(SyntheticTransaction {
                    id: SyntheticId(0),
                    kind: SyntheticKind::Split,
                    date: txn.date,
                    account: lot.account.clone(),
                    ratio,
                    origin: txn.id,
                });
                debug!(account = %lot.account, synthetic = %id, origin = %txn.id, "synthetic split");
                synthetic.insert(lot.account.clone(), TxnRef::Synthetic(id));
                TxnRef::Synthetic(id)
            };

            step.close(lot.id, by)?;
            let successor = lot.derive(
                step.next_id(),
                lot.account.clone(),
                lot.shares * ratio,
                lot.cost_basis,
                by,
            );
            step.stage(successor, Placement::After(lot.id))?;
        }

        Ok(step.finish())
    }

    /// Pull open lots of `account` oldest first until `required` is covered.
    fn pull(
        &self,
        account: &Ident,
        required: Decimal,
        txn: TxnId,
    ) -> Result<Vec<LotId>, AllocationError> {
        let open: Vec<&Lot> = self.store.open_lots_in(account).collect();
        select::greedy_pull(&open, required, self.options.tolerance)
            .ok_or_else(|| self.shortfall(account, txn, required))
    }

    /// Build (and log) a shortfall error with the account's open-lot ledger.
    fn shortfall(&self, account: &Ident, txn: TxnId, required: Decimal) -> AllocationError {
        let open_lots: Vec<OpenLotSummary> = self
            .store
            .open_lots_in(account)
            .map(OpenLotSummary::from)
            .collect();
        let available: Decimal = open_lots.iter().map(|lot| lot.shares).sum();

        error!(
            security = %self.security.id,
            account = %account,
            txn = %txn,
            %required,
            %available,
            "insufficient open lots"
        );
        for lot in &open_lots {
            error!(account = %account, "  open {lot}");
        }

        AllocationError::InsufficientOpenLots {
            security: self.security.id.clone(),
            account: account.clone(),
            txn,
            required,
            available,
            open_lots,
        }
    }

    /// Check every account's open lots against its running balance.
    fn verify_balances(&self, after: TxnId) -> Result<(), AllocationError> {
        for (account, expected) in &self.balances {
            let actual = self.store.open_shares(account);
            if (actual - *expected).abs() > self.options.tolerance {
                return Err(AllocationError::BalanceDrift {
                    security: self.security.id.clone(),
                    account: account.clone(),
                    after,
                    expected: *expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}
