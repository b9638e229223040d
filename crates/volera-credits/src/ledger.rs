// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger backed by SQLite.
//!
//! Balances live in `user_credits`, every movement in `credit_transactions`,
//! and per-day spend in `credit_daily_rollup` keyed by the user's local date.
//! The tables are created by the storage migrations. All operations go through
//! the single tokio-rusqlite background thread; a deduction runs in one
//! transaction so the balance, the transaction row, and the rollup move
//! together.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::{debug, info, warn};
use volera_config::model::CreditsConfig;
use volera_core::{Charge, TokenUsage, VoleraError};

use crate::limits::DailyLimit;
use crate::pricing::CreditPricing;

/// Result of a pre-flight balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditCheck {
    pub ok: bool,
    pub balance: i64,
    pub required: i64,
}

impl CreditCheck {
    /// Converts a failed check into `InsufficientCredits`.
    pub fn into_result(self) -> Result<i64, VoleraError> {
        if self.ok {
            Ok(self.balance)
        } else {
            Err(VoleraError::InsufficientCredits {
                required: self.required,
                available: self.balance,
            })
        }
    }
}

/// What a `track` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Credits were deducted.
    Charged { cost: i64, balance: i64 },
    /// The ledger key was already recorded; nothing changed.
    Duplicate { balance: i64 },
}

impl TrackOutcome {
    pub fn balance(&self) -> i64 {
        match self {
            Self::Charged { balance, .. } | Self::Duplicate { balance } => *balance,
        }
    }
}

/// A recorded credit movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditTransaction {
    pub user_id: String,
    pub delta: i64,
    pub kind: String,
    pub ledger_key: Option<String>,
    pub balance_after: i64,
    pub local_date: String,
    pub occurred_at: String,
}

enum Deduction {
    Charged(i64),
    Duplicate(i64),
    Insufficient(i64),
}

/// Convert a tokio-rusqlite error into VoleraError::Storage.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VoleraError {
    VoleraError::Storage {
        source: Box::new(e),
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Creates the user's row with the starting balance if it does not exist yet.
fn ensure_user(
    conn: &rusqlite::Connection,
    user_id: &str,
    initial_balance: i64,
    now: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO user_credits (user_id, balance, updated_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, initial_balance, now],
    )?;
    Ok(())
}

fn read_balance(conn: &rusqlite::Connection, user_id: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "SELECT balance FROM user_credits WHERE user_id = ?1",
        rusqlite::params![user_id],
        |row| row.get(0),
    )
}

/// Persistent per-user credit ledger.
pub struct CreditLedger {
    conn: tokio_rusqlite::Connection,
    pricing: CreditPricing,
    limit: DailyLimit,
    timezone: Tz,
    initial_balance: i64,
}

impl CreditLedger {
    /// Create a ledger over an existing connection.
    pub fn new(conn: tokio_rusqlite::Connection, config: &CreditsConfig) -> Result<Self, VoleraError> {
        let timezone: Tz = config.timezone.parse().map_err(|_| {
            VoleraError::Config(format!("unknown credits.timezone `{}`", config.timezone))
        })?;
        Ok(Self {
            conn,
            pricing: CreditPricing::from_config(config),
            limit: DailyLimit::new(config.daily_limit),
            timezone,
            initial_balance: config.initial_balance,
        })
    }

    /// Open a ledger on a database file. The tables must already exist
    /// (created by the storage migrations).
    pub async fn open(path: &str, config: &CreditsConfig) -> Result<Self, VoleraError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| VoleraError::Storage {
                source: Box::new(e),
            })?;
        Self::new(conn, config)
    }

    pub fn pricing(&self) -> &CreditPricing {
        &self.pricing
    }

    /// The user's local calendar date at `now`, in the configured timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Current balance, creating the account on first sight.
    pub async fn balance(&self, user_id: &str) -> Result<i64, VoleraError> {
        let user_id = user_id.to_string();
        let initial = self.initial_balance;
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| {
                ensure_user(conn, &user_id, initial, &now)?;
                read_balance(conn, &user_id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Pre-flight check: can the user afford `charge`?
    pub async fn check(&self, user_id: &str, charge: Charge) -> Result<CreditCheck, VoleraError> {
        let required = self.pricing.cost(charge);
        let balance = self.balance(user_id).await?;
        let ok = balance >= required;
        debug!(user_id, %charge, required, balance, ok, "credit check");
        Ok(CreditCheck {
            ok,
            balance,
            required,
        })
    }

    /// Fails with `DailyLimitExceeded` if `charge` would push today's spend
    /// over the configured cap.
    pub async fn check_daily_limit(&self, user_id: &str, charge: Charge) -> Result<(), VoleraError> {
        if self.limit.cap().is_none() {
            return Ok(());
        }
        let today = self.local_date(Utc::now());
        let spent = self.daily_total(user_id, &today).await?;
        self.limit.check(user_id, spent, self.pricing.cost(charge))
    }

    /// Deducts the cost of `charge` and records it.
    ///
    /// `ledger_key` makes the deduction idempotent: a key that was already
    /// recorded returns [`TrackOutcome::Duplicate`] without touching the
    /// balance. The balance never goes below zero; a deduction it cannot
    /// cover fails with `InsufficientCredits`.
    pub async fn track(
        &self,
        user_id: &str,
        charge: Charge,
        usage: Option<TokenUsage>,
        ledger_key: &str,
    ) -> Result<TrackOutcome, VoleraError> {
        self.track_at(user_id, charge, usage, ledger_key, Utc::now()).await
    }

    /// [`track`](Self::track) with an explicit clock, for rollup tests.
    pub async fn track_at(
        &self,
        user_id: &str,
        charge: Charge,
        usage: Option<TokenUsage>,
        ledger_key: &str,
        now: DateTime<Utc>,
    ) -> Result<TrackOutcome, VoleraError> {
        let cost = self.pricing.cost(charge);
        let local_date = self.local_date(now);
        let occurred_at = timestamp(now);
        let tokens = usage.map(|u| i64::from(u.total())).unwrap_or(0);
        let (input_tokens, output_tokens) = usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));
        let initial = self.initial_balance;
        let kind = charge.to_string();

        let owned_user = user_id.to_string();
        let owned_key = ledger_key.to_string();
        let date = local_date.clone();
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                ensure_user(&tx, &owned_user, initial, &occurred_at)?;

                let seen: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM credit_transactions WHERE ledger_key = ?1",
                        rusqlite::params![owned_key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if seen.is_some() {
                    let balance = read_balance(&tx, &owned_user)?;
                    return Ok(Deduction::Duplicate(balance));
                }

                let changed = tx.execute(
                    "UPDATE user_credits SET balance = balance - ?2, updated_at = ?3 \
                     WHERE user_id = ?1 AND balance >= ?2",
                    rusqlite::params![owned_user, cost, occurred_at],
                )?;
                if changed == 0 {
                    let balance = read_balance(&tx, &owned_user)?;
                    return Ok(Deduction::Insufficient(balance));
                }
                let balance = read_balance(&tx, &owned_user)?;

                tx.execute(
                    "INSERT INTO credit_transactions (user_id, delta, kind, ledger_key, \
                     input_tokens, output_tokens, balance_after, local_date, occurred_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        owned_user,
                        -cost,
                        kind,
                        owned_key,
                        input_tokens,
                        output_tokens,
                        balance,
                        date,
                        occurred_at,
                    ],
                )?;
                tx.execute(
                    "INSERT INTO credit_daily_rollup (user_id, local_date, credits_used, operations, tokens) \
                     VALUES (?1, ?2, ?3, 1, ?4) \
                     ON CONFLICT(user_id, local_date) DO UPDATE SET \
                     credits_used = credits_used + excluded.credits_used, \
                     operations = operations + 1, \
                     tokens = tokens + excluded.tokens",
                    rusqlite::params![owned_user, date, cost, tokens],
                )?;
                tx.commit()?;
                Ok(Deduction::Charged(balance))
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            Deduction::Charged(balance) => {
                info!(user_id, %charge, cost, balance, local_date = %local_date, "credits deducted");
                Ok(TrackOutcome::Charged { cost, balance })
            }
            Deduction::Duplicate(balance) => {
                debug!(user_id, ledger_key, "deduction already recorded");
                Ok(TrackOutcome::Duplicate { balance })
            }
            Deduction::Insufficient(balance) => {
                warn!(user_id, %charge, cost, balance, "deduction refused, balance too low");
                Err(VoleraError::InsufficientCredits {
                    required: cost,
                    available: balance,
                })
            }
        }
    }

    /// Adds credits (top-up or refund). A repeated `ledger_key` is a no-op.
    pub async fn grant(
        &self,
        user_id: &str,
        amount: i64,
        ledger_key: Option<&str>,
    ) -> Result<i64, VoleraError> {
        if amount < 0 {
            return Err(VoleraError::Internal(format!("grant amount must be non-negative, got {amount}")));
        }
        let now = Utc::now();
        let occurred_at = timestamp(now);
        let local_date = self.local_date(now);
        let initial = self.initial_balance;
        let owned_user = user_id.to_string();
        let owned_key = ledger_key.map(str::to_string);

        let balance = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                ensure_user(&tx, &owned_user, initial, &occurred_at)?;
                if let Some(key) = &owned_key {
                    let seen: Option<i64> = tx
                        .query_row(
                            "SELECT id FROM credit_transactions WHERE ledger_key = ?1",
                            rusqlite::params![key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if seen.is_some() {
                        return read_balance(&tx, &owned_user);
                    }
                }
                tx.execute(
                    "UPDATE user_credits SET balance = balance + ?2, updated_at = ?3 WHERE user_id = ?1",
                    rusqlite::params![owned_user, amount, occurred_at],
                )?;
                let balance = read_balance(&tx, &owned_user)?;
                tx.execute(
                    "INSERT INTO credit_transactions (user_id, delta, kind, ledger_key, \
                     balance_after, local_date, occurred_at) VALUES (?1, ?2, 'grant', ?3, ?4, ?5, ?6)",
                    rusqlite::params![owned_user, amount, owned_key, balance, local_date, occurred_at],
                )?;
                tx.commit()?;
                Ok(balance)
            })
            .await
            .map_err(map_tr_err)?;

        info!(user_id, amount, balance, "credits granted");
        Ok(balance)
    }

    /// Credits spent by the user on a local date (`YYYY-MM-DD`).
    pub async fn daily_total(&self, user_id: &str, local_date: &str) -> Result<i64, VoleraError> {
        let user_id = user_id.to_string();
        let local_date = local_date.to_string();
        self.conn
            .call(move |conn| {
                let total: Option<i64> = conn
                    .query_row(
                        "SELECT credits_used FROM credit_daily_rollup WHERE user_id = ?1 AND local_date = ?2",
                        rusqlite::params![user_id, local_date],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(total.unwrap_or(0))
            })
            .await
            .map_err(map_tr_err)
    }

    /// The user's transactions, oldest first.
    pub async fn transactions(&self, user_id: &str) -> Result<Vec<CreditTransaction>, VoleraError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, delta, kind, ledger_key, balance_after, local_date, occurred_at \
                     FROM credit_transactions WHERE user_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id], |row| {
                        Ok(CreditTransaction {
                            user_id: row.get(0)?,
                            delta: row.get(1)?,
                            kind: row.get(2)?,
                            ledger_key: row.get(3)?,
                            balance_after: row.get(4)?,
                            local_date: row.get(5)?,
                            occurred_at: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }
}
