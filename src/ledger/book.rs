//! Position ledger
//!
//! Owns the cash balance, the active positions and the trade log. It has a
//! single writer (the cycle orchestrator) and every mutation is
//! all-or-nothing: all checks run before any field is touched.

use super::{CloseReason, LedgerError, PortfolioSnapshot, Position, Side, Trade, TradeKind};
use crate::config::Config;
use crate::decision::ExitPlan;
use crate::risk::{margin, notional, FeeModel, Intent, PortfolioState, ValidatedDecision};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ledger parameters
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub initial_balance: Decimal,
    pub fees: FeeModel,
    /// Default stop distance from entry, in percent of price
    pub stop_loss_percent: Decimal,
    /// Default target distance from entry, in percent of price
    pub take_profit_percent: Decimal,
}

impl LedgerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_balance: config.trading.initial_balance,
            fees: FeeModel::new(config.fees.trading_fee_percent),
            stop_loss_percent: config.risk.stop_loss_percent,
            take_profit_percent: config.risk.take_profit_percent,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            fees: FeeModel::default(),
            stop_loss_percent: dec!(0),
            take_profit_percent: dec!(0),
        }
    }
}

/// Simulated perpetuals account
#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    cash_balance: Decimal,
    /// Active positions by symbol
    positions: BTreeMap<String, Position>,
    /// Deactivated positions, oldest first
    closed_positions: Vec<Position>,
    trades: Vec<Trade>,
    realized_pnl: Decimal,
    total_fees: Decimal,
}

impl Ledger {
    /// Create an empty ledger funded with the initial balance
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            cash_balance: config.initial_balance,
            config,
            positions: BTreeMap::new(),
            closed_positions: Vec::new(),
            trades: Vec::new(),
            realized_pnl: dec!(0),
            total_fees: dec!(0),
        }
    }

    /// Rebuild a ledger from persisted state
    ///
    /// Cash and cumulative totals are replayed from the trade log, which is
    /// the source of truth; `positions` supplies the active position set.
    pub fn restore(config: LedgerConfig, positions: Vec<Position>, mut trades: Vec<Trade>) -> Self {
        trades.sort_by_key(|t| t.timestamp);

        let mut ledger = Self::new(config);
        for trade in &trades {
            ledger.total_fees += trade.trading_fee;
            if trade.is_opening() {
                ledger.cash_balance -= trade.margin_used + trade.trading_fee;
            } else {
                let realized = trade.realized_pnl.unwrap_or(dec!(0));
                ledger.realized_pnl += realized;
                ledger.cash_balance += trade.margin_used + realized - trade.trading_fee;
            }
        }

        for position in positions.into_iter().filter(|p| p.is_active) {
            ledger.positions.insert(position.symbol.clone(), position);
        }
        ledger.trades = trades;

        if ledger.cash_balance < dec!(0) {
            tracing::warn!(
                cash = %ledger.cash_balance,
                "Restored ledger has negative cash, trade log may be incomplete"
            );
        }
        tracing::info!(
            cash = %ledger.cash_balance,
            positions = ledger.positions.len(),
            trades = ledger.trades.len(),
            "Ledger restored"
        );
        ledger
    }

    pub fn initial_balance(&self) -> Decimal {
        self.config.initial_balance
    }

    pub fn cash_balance(&self) -> Decimal {
        self.cash_balance
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Active positions
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Active position on `symbol`
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Latest record for `symbol`: the active position, else the last closed one
    pub fn latest_position(&self, symbol: &str) -> Option<&Position> {
        self.positions
            .get(symbol)
            .or_else(|| self.closed_positions.iter().rev().find(|p| p.symbol == symbol))
    }

    pub fn active_count(&self) -> usize {
        self.positions.len()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Margin plus unrealized PnL of all active positions
    pub fn positions_value(&self) -> Decimal {
        self.positions.values().map(Position::value).sum()
    }

    pub fn total_value(&self) -> Decimal {
        self.cash_balance + self.positions_value()
    }

    /// Re-mark every active position on `symbol`
    pub fn mark_to_market(&mut self, symbol: &str, price: Decimal) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.mark(price);
        }
    }

    /// View handed to the risk policy
    pub fn portfolio_state(&self, symbol: &str, price: Decimal) -> PortfolioState {
        let position = self.positions.get(symbol);
        PortfolioState {
            symbol: symbol.to_string(),
            mark_price: price,
            cash_balance: self.cash_balance,
            total_value: self.total_value(),
            active_position_count: self.positions.len(),
            open_side: position.map(|p| p.side),
            open_quantity: position.map(|p| p.quantity).unwrap_or(dec!(0)),
        }
    }

    /// Snapshot of the current state, risk fields left empty
    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> PortfolioSnapshot {
        let positions_value = self.positions_value();
        PortfolioSnapshot {
            timestamp,
            cash_balance: self.cash_balance,
            positions_value,
            total_value: self.cash_balance + positions_value,
            realized_pnl_cumulative: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl(),
            total_fees_cumulative: self.total_fees,
            active_position_count: self.positions.len(),
            sharpe_ratio: None,
            volatility: None,
            max_drawdown: dec!(0),
            win_rate: dec!(0),
            profit_factor: None,
        }
    }

    /// Execute a validated decision at `price`
    pub fn apply(
        &mut self,
        decision: &ValidatedDecision,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        if price <= dec!(0) {
            return Err(LedgerError::InvalidPrice(price));
        }

        let trade = match &decision.intent {
            Intent::Hold => return Err(LedgerError::NothingToExecute),
            Intent::Open {
                side,
                quantity,
                leverage,
                ..
            } => self.open(decision, *side, *quantity, *leverage, price, timestamp)?,
            Intent::Close { side, quantity } => {
                self.close(decision, *side, *quantity, price, timestamp)?
            }
        };

        tracing::info!(
            symbol = %trade.symbol,
            kind = ?trade.kind,
            direction = %trade.direction,
            price = %trade.price,
            quantity = %trade.quantity,
            fee = %trade.trading_fee,
            realized_pnl = ?trade.realized_pnl,
            cash = %self.cash_balance,
            "Trade executed"
        );

        self.trades.push(trade.clone());
        Ok(trade)
    }

    fn open(
        &mut self,
        decision: &ValidatedDecision,
        side: Side,
        quantity: Decimal,
        leverage: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        if quantity <= dec!(0) {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        if leverage < dec!(1) {
            return Err(LedgerError::InvalidLeverage(leverage));
        }
        if let Some(existing) = self.positions.get(&decision.symbol) {
            if existing.side != side {
                return Err(LedgerError::SideConflict {
                    symbol: decision.symbol.clone(),
                    existing: existing.side,
                });
            }
            return self.add(decision, quantity, leverage, price, timestamp);
        }

        let amount = notional(quantity, price).ok_or(LedgerError::InvalidQuantity(quantity))?;
        let margin_used = margin(amount, leverage);
        let fee = self.config.fees.fee(amount);
        let required = margin_used
            .checked_add(fee)
            .ok_or(LedgerError::InvalidQuantity(quantity))?;
        self.ensure_cash(required)?;

        let exit_plan = self.complete_exit_plan(decision.exit_plan.clone(), side, price);

        self.cash_balance -= margin_used + fee;
        self.total_fees += fee;
        self.positions.insert(
            decision.symbol.clone(),
            Position {
                id: Uuid::new_v4(),
                symbol: decision.symbol.clone(),
                side,
                quantity,
                avg_entry_price: price,
                leverage,
                margin_used,
                fees_paid: fee,
                opened_at: timestamp,
                exit_plan: exit_plan.clone(),
                is_active: true,
                mark_price: price,
                unrealized_pnl: dec!(0),
                closed_at: None,
            },
        );

        Ok(Trade {
            id: Uuid::new_v4(),
            timestamp,
            symbol: decision.symbol.clone(),
            side: side.opening_order(),
            direction: side,
            kind: TradeKind::Open,
            price,
            quantity,
            amount_usdt: amount,
            leverage,
            trading_fee: fee,
            margin_used,
            confidence: decision.confidence,
            realized_pnl: None,
            net_pnl: None,
            profit_pct: None,
            exit_plan,
            position_opened_at: timestamp,
            close_reason: None,
        })
    }

    fn add(
        &mut self,
        decision: &ValidatedDecision,
        quantity: Decimal,
        leverage: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        let amount = notional(quantity, price).ok_or(LedgerError::InvalidQuantity(quantity))?;
        let margin_used = margin(amount, leverage);
        let fee = self.config.fees.fee(amount);
        let required = margin_used
            .checked_add(fee)
            .ok_or(LedgerError::InvalidQuantity(quantity))?;
        self.ensure_cash(required)?;

        let Some(existing) = self.positions.get(&decision.symbol) else {
            return Err(LedgerError::NoOpenPosition {
                symbol: decision.symbol.clone(),
                side: Side::Long,
            });
        };
        let side = existing.side;
        let exit_plan = self.merge_exit_plan(existing.exit_plan.clone(), &decision.exit_plan, side, price);

        self.cash_balance -= margin_used + fee;
        self.total_fees += fee;

        let Some(position) = self.positions.get_mut(&decision.symbol) else {
            return Err(LedgerError::NoOpenPosition {
                symbol: decision.symbol.clone(),
                side,
            });
        };
        let old_notional = position.notional_value();
        let new_quantity = position.quantity + quantity;
        let new_margin = position.margin_used + margin_used;

        position.avg_entry_price = (old_notional + amount) / new_quantity;
        position.quantity = new_quantity;
        position.margin_used = new_margin;
        position.leverage = (old_notional + amount) / new_margin;
        position.fees_paid += fee;
        position.exit_plan = exit_plan.clone();
        position.mark(price);

        Ok(Trade {
            id: Uuid::new_v4(),
            timestamp,
            symbol: decision.symbol.clone(),
            side: side.opening_order(),
            direction: side,
            kind: TradeKind::Add,
            price,
            quantity,
            amount_usdt: amount,
            leverage,
            trading_fee: fee,
            margin_used,
            confidence: decision.confidence,
            realized_pnl: None,
            net_pnl: None,
            profit_pct: None,
            exit_plan,
            position_opened_at: position.opened_at,
            close_reason: None,
        })
    }

    fn close(
        &mut self,
        decision: &ValidatedDecision,
        side: Side,
        quantity: Option<Decimal>,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        let position = self
            .positions
            .get(&decision.symbol)
            .filter(|p| p.side == side)
            .ok_or_else(|| LedgerError::NoOpenPosition {
                symbol: decision.symbol.clone(),
                side,
            })?;

        let close_quantity = match quantity {
            Some(q) if q < position.quantity => q,
            _ => position.quantity,
        };
        if close_quantity <= dec!(0) {
            return Err(LedgerError::InvalidQuantity(close_quantity));
        }

        let full = close_quantity == position.quantity;
        let (released_margin, attributed_fees) = if full {
            (position.margin_used, position.fees_paid)
        } else {
            let fraction = close_quantity / position.quantity;
            (position.margin_used * fraction, position.fees_paid * fraction)
        };

        let realized = position.pnl_at(price, close_quantity);
        let amount =
            notional(close_quantity, price).ok_or(LedgerError::InvalidQuantity(close_quantity))?;
        let fee = self.config.fees.fee(amount);
        let credit = released_margin + realized - fee;
        if self.cash_balance + credit < dec!(0) {
            return Err(LedgerError::InsufficientCash {
                required: -credit,
                available: self.cash_balance,
            });
        }

        let profit_pct = if released_margin > dec!(0) {
            realized / released_margin * dec!(100)
        } else {
            dec!(0)
        };

        let trade = Trade {
            id: Uuid::new_v4(),
            timestamp,
            symbol: decision.symbol.clone(),
            side: side.closing_order(),
            direction: side,
            kind: if full {
                TradeKind::Close
            } else {
                TradeKind::PartialClose
            },
            price,
            quantity: close_quantity,
            amount_usdt: amount,
            leverage: position.leverage,
            trading_fee: fee,
            margin_used: released_margin,
            confidence: decision.confidence,
            realized_pnl: Some(realized),
            net_pnl: Some(realized - fee - attributed_fees),
            profit_pct: Some(profit_pct),
            exit_plan: position.exit_plan.clone(),
            position_opened_at: position.opened_at,
            close_reason: Some(decision.reason.clone()),
        };

        self.cash_balance += credit;
        self.realized_pnl += realized;
        self.total_fees += fee;

        if full {
            if let Some(mut closed) = self.positions.remove(&decision.symbol) {
                closed.mark(price);
                closed.is_active = false;
                closed.closed_at = Some(timestamp);
                self.closed_positions.push(closed);
            }
        } else if let Some(position) = self.positions.get_mut(&decision.symbol) {
            position.quantity -= close_quantity;
            position.margin_used -= released_margin;
            position.fees_paid -= attributed_fees;
            position.mark(price);
        }

        Ok(trade)
    }

    fn ensure_cash(&self, required: Decimal) -> Result<(), LedgerError> {
        if required > self.cash_balance {
            return Err(LedgerError::InsufficientCash {
                required,
                available: self.cash_balance,
            });
        }
        Ok(())
    }

    /// Fill unset exit levels from the configured default distances
    fn complete_exit_plan(&self, mut plan: ExitPlan, side: Side, entry: Decimal) -> ExitPlan {
        if !plan.has_stop_loss() && self.config.stop_loss_percent > dec!(0) {
            let offset = entry * self.config.stop_loss_percent / dec!(100);
            plan.stop_loss = match side {
                Side::Long => entry - offset,
                Side::Short => entry + offset,
            };
        }
        if !plan.has_profit_target() && self.config.take_profit_percent > dec!(0) {
            let offset = entry * self.config.take_profit_percent / dec!(100);
            plan.profit_target = match side {
                Side::Long => entry + offset,
                Side::Short => (entry - offset).max(dec!(0)),
            };
        }
        plan
    }

    /// Levels named by an add replace the old ones; conditions accumulate
    fn merge_exit_plan(
        &self,
        mut current: ExitPlan,
        update: &ExitPlan,
        side: Side,
        price: Decimal,
    ) -> ExitPlan {
        if update.has_stop_loss() {
            current.stop_loss = update.stop_loss;
        }
        if update.has_profit_target() {
            current.profit_target = update.profit_target;
        }
        current
            .invalidation_conditions
            .extend(update.invalidation_conditions.iter().cloned());
        self.complete_exit_plan(current, side, price)
    }

    /// Close reason recorded on the most recent closing trade of `symbol`
    pub fn last_close_reason(&self, symbol: &str) -> Option<&CloseReason> {
        self.trades
            .iter()
            .rev()
            .filter(|t| t.symbol == symbol && t.is_closing())
            .find_map(|t| t.close_reason.as_ref())
    }
}
