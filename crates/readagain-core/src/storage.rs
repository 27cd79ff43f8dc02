use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::models::{
    AuthorAccount, BookSales, Earning, EarningStats, EarningStatus, NewPayout, Page, PageRequest,
    Payout, SaleLine,
};

/// Persistence for the author earnings ledger.
///
/// Every method that touches both ledger rows and the denormalized balances
/// must apply them atomically.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn author_account(&self, author_id: Uuid) -> LedgerResult<Option<AuthorAccount>>;

    /// Sum of completed payouts for the author.
    async fn total_withdrawn(&self, author_id: Uuid) -> LedgerResult<Decimal>;

    async fn list_earnings(
        &self,
        author_id: Uuid,
        status: Option<EarningStatus>,
        page: PageRequest,
    ) -> LedgerResult<Page<Earning>>;

    async fn list_payouts(&self, author_id: Uuid, page: PageRequest) -> LedgerResult<Page<Payout>>;

    async fn find_payout(&self, author_id: Uuid, payout_id: Uuid) -> LedgerResult<Option<Payout>>;

    /// Inserts a `requested` payout and debits the available balance.
    ///
    /// The balance is re-checked while the author row is held, so a request
    /// that would overdraw fails with "Insufficient available balance" and
    /// leaves no trace.
    async fn create_payout(&self, request: NewPayout) -> LedgerResult<Payout>;

    /// Returns `None` when the (author, order, book) line was already recorded.
    async fn record_earning(&self, line: &SaleLine) -> LedgerResult<Option<Earning>>;

    /// Moves pending earnings created before `cutoff` to available.
    async fn release_pending(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64>;

    async fn earning_stats(
        &self,
        author_id: Uuid,
        since: DateTime<Utc>,
    ) -> LedgerResult<EarningStats>;

    async fn book_sales(&self, author_id: Uuid, book_id: Uuid) -> LedgerResult<BookSales>;
}
