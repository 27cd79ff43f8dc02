use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readagain_core::{
    AuthorAccount, BookSales, Earning, EarningStats, EarningStatus, LedgerError, LedgerResult,
    LedgerStore, NewPayout, Page, PageRequest, Payout, PayoutStatus, SaleLine, credit_balance,
    split_sale, validate_payout_amount,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

const EARNING_COLUMNS: &str = "id, author_id, order_id, book_id, amount, commission, status, payout_id, created_at, updated_at";
const PAYOUT_COLUMNS: &str = "id, author_id, amount, status, method, account_details, requested_at, processed_at, notes, created_at, updated_at";

/// Postgres-backed ledger. Balance mutations lock the author row
/// (`FOR UPDATE`) for the length of their transaction.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn author_account(&self, author_id: Uuid) -> LedgerResult<Option<AuthorAccount>> {
        let row = sqlx::query(
            r#"
            SELECT author_id, total_earnings, available_balance, pending_balance, commission_rate, updated_at
            FROM author_accounts
            WHERE author_id = $1
            "#,
        )
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(|row| account_from_row(&row))
            .transpose()
            .map_err(LedgerError::Storage)
    }

    async fn total_withdrawn(&self, author_id: Uuid) -> LedgerResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payouts WHERE author_id = $1 AND status = 'completed'",
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(total.round_dp(2))
    }

    async fn list_earnings(
        &self,
        author_id: Uuid,
        status: Option<EarningStatus>,
        page: PageRequest,
    ) -> LedgerResult<Page<Earning>> {
        let status = status.map(|value| value.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM earnings WHERE author_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(author_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {EARNING_COLUMNS}
            FROM earnings
            WHERE author_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(author_id)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let items = rows
            .iter()
            .map(earning_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn list_payouts(&self, author_id: Uuid, page: PageRequest) -> LedgerResult<Page<Payout>> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payouts WHERE author_id = $1")
                .bind(author_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_error)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PAYOUT_COLUMNS}
            FROM payouts
            WHERE author_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(author_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let items = rows
            .iter()
            .map(payout_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn find_payout(&self, author_id: Uuid, payout_id: Uuid) -> LedgerResult<Option<Payout>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1 AND author_id = $2"
        ))
        .bind(payout_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(|row| payout_from_row(&row))
            .transpose()
            .map_err(LedgerError::Storage)
    }

    async fn create_payout(&self, request: NewPayout) -> LedgerResult<Payout> {
        let amount = request.amount;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let available = sqlx::query_scalar::<_, Decimal>(
            "SELECT available_balance FROM author_accounts WHERE author_id = $1 FOR UPDATE",
        )
        .bind(request.author_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| LedgerError::not_found("Author not found"))?;

        validate_payout_amount(amount, available)?;

        let now = Utc::now();
        let payout = Payout {
            id: Uuid::new_v4(),
            author_id: request.author_id,
            amount,
            status: PayoutStatus::Requested,
            method: request.method,
            account_details: request.account_details,
            requested_at: now,
            processed_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payouts (
                id, author_id, amount, status, method, account_details, requested_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $7)
            "#,
        )
        .bind(payout.id)
        .bind(payout.author_id)
        .bind(payout.amount)
        .bind(payout.status.as_str())
        .bind(&payout.method)
        .bind(&payout.account_details)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            UPDATE author_accounts
            SET available_balance = available_balance - $2, updated_at = $3
            WHERE author_id = $1
            "#,
        )
        .bind(payout.author_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        Ok(payout)
    }

    async fn record_earning(&self, line: &SaleLine) -> LedgerResult<Option<Earning>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let account = sqlx::query(
            r#"
            SELECT commission_rate, total_earnings, pending_balance
            FROM author_accounts
            WHERE author_id = $1
            FOR UPDATE
            "#,
        )
        .bind(line.author_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| LedgerError::not_found("Author not found"))?;

        let commission_rate: Decimal = account.try_get("commission_rate").map_err(storage_error)?;
        let total_earnings: Decimal = account.try_get("total_earnings").map_err(storage_error)?;
        let pending_balance: Decimal = account.try_get("pending_balance").map_err(storage_error)?;

        let (amount, commission) = split_sale(line.sale_amount, commission_rate)?;
        credit_balance(total_earnings, amount)?;
        credit_balance(pending_balance, amount)?;
        let now = Utc::now();
        let earning = Earning {
            id: Uuid::new_v4(),
            author_id: line.author_id,
            order_id: line.order_id,
            book_id: line.book_id,
            amount,
            commission,
            status: EarningStatus::Pending,
            payout_id: None,
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO earnings (
                id, author_id, order_id, book_id, amount, commission, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (author_id, order_id, book_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(earning.id)
        .bind(earning.author_id)
        .bind(earning.order_id)
        .bind(earning.book_id)
        .bind(earning.amount)
        .bind(earning.commission)
        .bind(earning.status.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        if inserted.is_none() {
            tx.rollback().await.map_err(storage_error)?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE author_accounts
            SET total_earnings = total_earnings + $2,
                pending_balance = pending_balance + $2,
                updated_at = $3
            WHERE author_id = $1
            "#,
        )
        .bind(line.author_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        Ok(Some(earning))
    }

    async fn release_pending(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let rows = sqlx::query(
            r#"
            WITH released AS (
                UPDATE earnings
                SET status = 'available', updated_at = $2
                WHERE status = 'pending' AND created_at < $1
                RETURNING author_id, amount
            )
            SELECT author_id, SUM(amount) AS amount, COUNT(*) AS released
            FROM released
            GROUP BY author_id
            ORDER BY author_id
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;

        let mut released_total = 0u64;
        for row in &rows {
            let author_id: Uuid = row.try_get("author_id").map_err(storage_error)?;
            let amount: Decimal = row.try_get("amount").map_err(storage_error)?;
            let released: i64 = row.try_get("released").map_err(storage_error)?;

            sqlx::query(
                r#"
                UPDATE author_accounts
                SET pending_balance = pending_balance - $2,
                    available_balance = available_balance + $2,
                    updated_at = $3
                WHERE author_id = $1
                "#,
            )
            .bind(author_id)
            .bind(amount)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

            info!("released {released} earnings worth {amount} for author {author_id}");
            released_total += u64::try_from(released).unwrap_or_default();
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(released_total)
    }

    async fn earning_stats(
        &self,
        author_id: Uuid,
        since: DateTime<Utc>,
    ) -> LedgerResult<EarningStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_sales,
                COALESCE(SUM(amount) FILTER (WHERE created_at >= $2), 0) AS revenue_since
            FROM earnings
            WHERE author_id = $1
            "#,
        )
        .bind(author_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(EarningStats {
            total_sales: row.try_get("total_sales").map_err(storage_error)?,
            revenue_since: row.try_get("revenue_since").map_err(storage_error)?,
        })
    }

    async fn book_sales(&self, author_id: Uuid, book_id: Uuid) -> LedgerResult<BookSales> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS sales_count, COALESCE(SUM(amount), 0) AS total_revenue
            FROM earnings
            WHERE author_id = $1 AND book_id = $2
            "#,
        )
        .bind(author_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(BookSales {
            book_id,
            sales_count: row.try_get("sales_count").map_err(storage_error)?,
            total_revenue: row.try_get("total_revenue").map_err(storage_error)?,
        })
    }
}

fn storage_error<E: Into<anyhow::Error>>(err: E) -> LedgerError {
    LedgerError::Storage(err.into())
}

fn account_from_row(row: &PgRow) -> anyhow::Result<AuthorAccount> {
    Ok(AuthorAccount {
        author_id: row.try_get("author_id")?,
        total_earnings: row.try_get("total_earnings")?,
        available_balance: row.try_get("available_balance")?,
        pending_balance: row.try_get("pending_balance")?,
        commission_rate: row.try_get("commission_rate")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn earning_from_row(row: &PgRow) -> anyhow::Result<Earning> {
    let status: String = row.try_get("status")?;

    Ok(Earning {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        order_id: row.try_get("order_id")?,
        book_id: row.try_get("book_id")?,
        amount: row.try_get("amount")?,
        commission: row.try_get("commission")?,
        status: status
            .parse::<EarningStatus>()
            .with_context(|| format!("earnings row has unknown status {status:?}"))?,
        payout_id: row.try_get("payout_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn payout_from_row(row: &PgRow) -> anyhow::Result<Payout> {
    let status: String = row.try_get("status")?;

    Ok(Payout {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        amount: row.try_get("amount")?,
        status: status
            .parse::<PayoutStatus>()
            .with_context(|| format!("payouts row has unknown status {status:?}"))?,
        method: row.try_get("method")?,
        account_details: row.try_get("account_details")?,
        requested_at: row.try_get("requested_at")?,
        processed_at: row.try_get("processed_at")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
