use crate::{
    Amount, BalanceRecord, BalanceTable, ExecutionPlan, LockKey, SupplyRecord, SupplyTable,
    Symbol, TokenError, TokenStore,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

fn storage(e: sqlx::Error) -> TokenError {
    TokenError::Storage(e.to_string())
}

/// Unique violations on insert mean another plan created the row first.
fn insert_conflict(e: sqlx::Error, what: String) -> TokenError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => TokenError::AlreadyExists(what),
        _ => storage(e),
    }
}

pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), TokenError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_supply (
                code TEXT PRIMARY KEY,
                precision SMALLINT NOT NULL,
                issuer UUID NOT NULL,
                supply BIGINT NOT NULL CHECK (supply >= 0),
                max_supply BIGINT NOT NULL CHECK (max_supply > 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CHECK (supply <= max_supply)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_balances (
                owner UUID NOT NULL,
                code TEXT NOT NULL REFERENCES token_supply(code),
                precision SMALLINT NOT NULL,
                balance BIGINT NOT NULL CHECK (balance >= 0),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (owner, code)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_token_balances_code
            ON token_balances(code)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    /// Lock every row the plan touches and stage them in memory tables.
    async fn stage(
        tx: &mut Transaction<'_, Postgres>,
        keys: &[LockKey],
    ) -> Result<(SupplyTable, BalanceTable), TokenError> {
        let mut supply = SupplyTable::new();
        let mut balances = BalanceTable::new();

        for key in keys {
            match key {
                LockKey::Supply(code) => {
                    let row = sqlx::query(
                        r#"
                        SELECT code, precision, issuer, supply, max_supply, created_at
                        FROM token_supply
                        WHERE code = $1
                        FOR UPDATE
                        "#,
                    )
                    .bind(code)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(storage)?;

                    if let Some(row) = row {
                        supply.load(supply_from_row(&row)?);
                    }
                }
                LockKey::Balance(owner, code) => {
                    let row = sqlx::query(
                        r#"
                        SELECT owner, code, precision, balance, updated_at
                        FROM token_balances
                        WHERE owner = $1 AND code = $2
                        FOR UPDATE
                        "#,
                    )
                    .bind(owner)
                    .bind(code)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(storage)?;

                    if let Some(row) = row {
                        balances.load(balance_from_row(&row)?);
                    }
                }
            }
        }

        Ok((supply, balances))
    }

    /// Write the staged rows back: update what existed, insert what is new,
    /// delete balances that the plan removed.
    async fn write_back(
        tx: &mut Transaction<'_, Postgres>,
        keys: &[LockKey],
        existed: &BTreeSet<LockKey>,
        supply: &SupplyTable,
        balances: &BalanceTable,
    ) -> Result<(), TokenError> {
        for key in keys {
            match key {
                LockKey::Supply(code) => {
                    let Ok(record) = supply.find(code) else {
                        continue;
                    };
                    if existed.contains(key) {
                        sqlx::query("UPDATE token_supply SET supply = $2 WHERE code = $1")
                            .bind(code)
                            .bind(record.supply.value)
                            .execute(&mut **tx)
                            .await
                            .map_err(storage)?;
                    } else {
                        sqlx::query(
                            r#"
                            INSERT INTO token_supply (code, precision, issuer, supply, max_supply, created_at)
                            VALUES ($1, $2, $3, $4, $5, $6)
                            "#,
                        )
                        .bind(code)
                        .bind(record.symbol.precision as i16)
                        .bind(record.issuer)
                        .bind(record.supply.value)
                        .bind(record.max_supply.value)
                        .bind(record.created_at)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| {
                            insert_conflict(e, format!("token with symbol {} already exists", code))
                        })?;
                    }
                }
                LockKey::Balance(owner, code) => {
                    match (balances.find(*owner, code), existed.contains(key)) {
                        (Some(record), true) => {
                            sqlx::query(
                                r#"
                                UPDATE token_balances
                                SET balance = $3, updated_at = $4
                                WHERE owner = $1 AND code = $2
                                "#,
                            )
                            .bind(owner)
                            .bind(code)
                            .bind(record.balance.value)
                            .bind(record.updated_at)
                            .execute(&mut **tx)
                            .await
                            .map_err(storage)?;
                        }
                        (Some(record), false) => {
                            sqlx::query(
                                r#"
                                INSERT INTO token_balances (owner, code, precision, balance, updated_at)
                                VALUES ($1, $2, $3, $4, $5)
                                "#,
                            )
                            .bind(owner)
                            .bind(code)
                            .bind(record.balance.symbol.precision as i16)
                            .bind(record.balance.value)
                            .bind(record.updated_at)
                            .execute(&mut **tx)
                            .await
                            .map_err(|e| {
                                insert_conflict(e, "balance record already exists".to_string())
                            })?;
                        }
                        (None, true) => {
                            sqlx::query("DELETE FROM token_balances WHERE owner = $1 AND code = $2")
                                .bind(owner)
                                .bind(code)
                                .execute(&mut **tx)
                                .await
                                .map_err(storage)?;
                        }
                        (None, false) => {}
                    }
                }
            }
        }

        Ok(())
    }

    async fn apply(tx: &mut Transaction<'_, Postgres>, plan: &ExecutionPlan) -> Result<(), TokenError> {
        let keys = plan.lock_keys();
        let (mut supply, mut balances) = Self::stage(tx, &keys).await?;

        let existed: BTreeSet<LockKey> = keys
            .iter()
            .filter(|key| match key {
                LockKey::Supply(code) => supply.find(code).is_ok(),
                LockKey::Balance(owner, code) => balances.find(*owner, code).is_some(),
            })
            .cloned()
            .collect();

        // Same table rules as the memory store, checked under the row locks.
        plan.apply(&mut supply, &mut balances)?;

        Self::write_back(tx, &keys, &existed, &supply, &balances).await
    }
}

fn supply_from_row(row: &PgRow) -> Result<SupplyRecord, TokenError> {
    let code: String = row.try_get("code").map_err(storage)?;
    let precision: i16 = row.try_get("precision").map_err(storage)?;
    let symbol = Symbol::new(&code, precision as u8);

    Ok(SupplyRecord {
        issuer: row.try_get("issuer").map_err(storage)?,
        supply: Amount::new(row.try_get("supply").map_err(storage)?, symbol.clone()),
        max_supply: Amount::new(row.try_get("max_supply").map_err(storage)?, symbol.clone()),
        created_at: row.try_get("created_at").map_err(storage)?,
        symbol,
    })
}

fn balance_from_row(row: &PgRow) -> Result<BalanceRecord, TokenError> {
    let code: String = row.try_get("code").map_err(storage)?;
    let precision: i16 = row.try_get("precision").map_err(storage)?;

    Ok(BalanceRecord {
        owner: row.try_get("owner").map_err(storage)?,
        balance: Amount::new(
            row.try_get("balance").map_err(storage)?,
            Symbol::new(&code, precision as u8),
        ),
        updated_at: row.try_get("updated_at").map_err(storage)?,
    })
}

#[async_trait::async_trait]
impl TokenStore for PostgresAdapter {
    async fn execute_plan(&self, plan: &ExecutionPlan) -> Result<(), TokenError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        match Self::apply(&mut tx, plan).await {
            Ok(()) => tx.commit().await.map_err(storage),
            Err(e) => {
                tx.rollback().await.ok();
                Err(e)
            }
        }
    }

    async fn find_supply(&self, code: &str) -> Result<SupplyRecord, TokenError> {
        let row = sqlx::query(
            r#"
            SELECT code, precision, issuer, supply, max_supply, created_at
            FROM token_supply
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or_else(|| TokenError::NotFound(format!("token with symbol {} does not exist", code)))?;

        supply_from_row(&row)
    }

    async fn find_balance(
        &self,
        owner: Uuid,
        code: &str,
    ) -> Result<Option<BalanceRecord>, TokenError> {
        let row = sqlx::query(
            r#"
            SELECT owner, code, precision, balance, updated_at
            FROM token_balances
            WHERE owner = $1 AND code = $2
            "#,
        )
        .bind(owner)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(balance_from_row).transpose()
    }

    async fn balances(&self, code: &str) -> Result<Vec<BalanceRecord>, TokenError> {
        let rows = sqlx::query(
            r#"
            SELECT owner, code, precision, balance, updated_at
            FROM token_balances
            WHERE code = $1
            ORDER BY owner
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(balance_from_row).collect()
    }

    async fn symbols(&self) -> Result<Vec<SupplyRecord>, TokenError> {
        let rows = sqlx::query(
            r#"
            SELECT code, precision, issuer, supply, max_supply, created_at
            FROM token_supply
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(supply_from_row).collect()
    }
}
