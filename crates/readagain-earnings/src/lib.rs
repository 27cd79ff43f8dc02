use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use readagain_core::{
    AuthorAccount, BookSales, Earning, EarningStatus, EarningsOverview, EarningsSummary,
    LedgerError, LedgerResult, LedgerStore, NewPayout, Page, PageRequest, Payout, SaleLine,
    validate_payout_amount,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Author-facing earnings and payout operations over an injected store.
#[derive(Clone)]
pub struct EarningsService {
    store: Arc<dyn LedgerStore>,
}

impl EarningsService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn earnings_summary(&self, author_id: Uuid) -> LedgerResult<EarningsSummary> {
        let account = self.require_account(author_id).await?;
        let total_withdrawn = self.store.total_withdrawn(author_id).await?;

        Ok(EarningsSummary {
            available_balance: account.available_balance,
            pending_balance: account.pending_balance,
            total_earnings: account.total_earnings,
            total_withdrawn,
            commission_rate: account.commission_rate,
        })
    }

    pub async fn list_earnings(
        &self,
        author_id: Uuid,
        page: PageRequest,
        status: Option<&str>,
    ) -> LedgerResult<Page<Earning>> {
        let status = match status.map(str::trim).filter(|value| !value.is_empty()) {
            None => None,
            Some(raw) => match raw.parse::<EarningStatus>() {
                Ok(status) => Some(status),
                // no earning carries an unknown status
                Err(_) => {
                    return Ok(Page {
                        items: Vec::new(),
                        total: 0,
                    });
                }
            },
        };

        self.store.list_earnings(author_id, status, page).await
    }

    pub async fn list_payouts(&self, author_id: Uuid, page: PageRequest) -> LedgerResult<Page<Payout>> {
        self.store.list_payouts(author_id, page).await
    }

    /// Validates and records a withdrawal.
    ///
    /// The balance check here gives the caller the right message early; the
    /// store repeats it under its lock before debiting.
    pub async fn request_payout(
        &self,
        author_id: Uuid,
        amount: Decimal,
        method: &str,
        account_details: &str,
    ) -> LedgerResult<Payout> {
        let account = self.require_account(author_id).await?;
        validate_payout_amount(amount, account.available_balance)?;

        let payout = self
            .store
            .create_payout(NewPayout {
                author_id,
                amount,
                method: method.trim().to_string(),
                account_details: account_details.to_string(),
            })
            .await?;

        info!(
            "author {} requested payout {} of {}",
            author_id, payout.id, payout.amount
        );
        Ok(payout)
    }

    pub async fn get_payout(&self, author_id: Uuid, payout_id: Uuid) -> LedgerResult<Payout> {
        self.store
            .find_payout(author_id, payout_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Payout not found"))
    }

    pub async fn record_sale(&self, line: &SaleLine) -> LedgerResult<Option<Earning>> {
        let recorded = self.store.record_earning(line).await?;
        match &recorded {
            Some(earning) => info!(
                "recorded earning {} of {} for author {} on order {}",
                earning.id, earning.amount, line.author_id, line.order_id
            ),
            None => info!(
                "order {} book {} already credited to author {}",
                line.order_id, line.book_id, line.author_id
            ),
        }

        Ok(recorded)
    }

    /// Makes pending earnings older than `clearing_window` withdrawable.
    pub async fn release_cleared_earnings(
        &self,
        now: DateTime<Utc>,
        clearing_window: Duration,
    ) -> LedgerResult<u64> {
        let released = self.store.release_pending(now - clearing_window).await?;
        if released > 0 {
            info!("released {} cleared earnings", released);
        }

        Ok(released)
    }

    pub async fn earnings_overview(
        &self,
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<EarningsOverview> {
        let account = self.require_account(author_id).await?;
        let stats = self
            .store
            .earning_stats(author_id, month_start(now))
            .await?;

        Ok(EarningsOverview {
            total_earnings: account.total_earnings,
            pending_balance: account.pending_balance,
            available_balance: account.available_balance,
            total_sales: stats.total_sales,
            this_month_revenue: stats.revenue_since,
        })
    }

    pub async fn book_sales(&self, author_id: Uuid, book_id: Uuid) -> LedgerResult<BookSales> {
        self.require_account(author_id).await?;
        self.store.book_sales(author_id, book_id).await
    }

    async fn require_account(&self, author_id: Uuid) -> LedgerResult<AuthorAccount> {
        self.store
            .author_account(author_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Author not found"))
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
