use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readagain_core::{
    AuthorAccount, BookSales, Earning, EarningStats, EarningStatus, LedgerError, LedgerResult,
    LedgerStore, NewPayout, Page, PageRequest, Payout, PayoutStatus, SaleLine, credit_balance,
    split_sale, validate_payout_amount,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Uuid, AuthorAccount>,
    earnings: Vec<Earning>,
    payouts: Vec<Payout>,
}

/// Ledger kept in process memory.
///
/// All mutations take the single write lock for their whole
/// read-check-write sequence, which gives the same all-or-nothing behaviour
/// as the row-locking transactions of the Postgres store.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_account(&self, account: AuthorAccount) {
        let mut state = self.state.write().await;
        state.accounts.insert(account.author_id, account);
    }

    /// Seeds an earning as-is; balances are left untouched.
    pub async fn insert_earning(&self, earning: Earning) {
        self.state.write().await.earnings.push(earning);
    }

    /// Seeds a payout as-is; balances are left untouched.
    pub async fn insert_payout(&self, payout: Payout) {
        self.state.write().await.payouts.push(payout);
    }

    pub async fn payout_count(&self, author_id: Uuid) -> usize {
        let state = self.state.read().await;
        state
            .payouts
            .iter()
            .filter(|payout| payout.author_id == author_id)
            .count()
    }
}

fn paginate<T: Clone>(items: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = items.len() as i64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(0);

    let items = items
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    Page { items, total }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn author_account(&self, author_id: Uuid) -> LedgerResult<Option<AuthorAccount>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&author_id).cloned())
    }

    async fn total_withdrawn(&self, author_id: Uuid) -> LedgerResult<Decimal> {
        let state = self.state.read().await;
        Ok(state
            .payouts
            .iter()
            .filter(|payout| {
                payout.author_id == author_id && payout.status == PayoutStatus::Completed
            })
            .map(|payout| payout.amount)
            .sum())
    }

    async fn list_earnings(
        &self,
        author_id: Uuid,
        status: Option<EarningStatus>,
        page: PageRequest,
    ) -> LedgerResult<Page<Earning>> {
        let state = self.state.read().await;
        let mut matching: Vec<&Earning> = state
            .earnings
            .iter()
            .filter(|earning| earning.author_id == author_id)
            .filter(|earning| status.is_none_or(|wanted| earning.status == wanted))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(matching, page))
    }

    async fn list_payouts(&self, author_id: Uuid, page: PageRequest) -> LedgerResult<Page<Payout>> {
        let state = self.state.read().await;
        let mut matching: Vec<&Payout> = state
            .payouts
            .iter()
            .filter(|payout| payout.author_id == author_id)
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(matching, page))
    }

    async fn find_payout(&self, author_id: Uuid, payout_id: Uuid) -> LedgerResult<Option<Payout>> {
        let state = self.state.read().await;
        Ok(state
            .payouts
            .iter()
            .find(|payout| payout.id == payout_id && payout.author_id == author_id)
            .cloned())
    }

    async fn create_payout(&self, request: NewPayout) -> LedgerResult<Payout> {
        let mut state = self.state.write().await;
        let amount = request.amount;

        let account = state
            .accounts
            .get_mut(&request.author_id)
            .ok_or_else(|| LedgerError::not_found("Author not found"))?;
        validate_payout_amount(amount, account.available_balance)?;

        let now = Utc::now();
        account.available_balance -= amount;
        account.updated_at = now;

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
        state.payouts.push(payout.clone());

        Ok(payout)
    }

    async fn record_earning(&self, line: &SaleLine) -> LedgerResult<Option<Earning>> {
        let mut state = self.state.write().await;

        let duplicate = state.earnings.iter().any(|earning| {
            earning.author_id == line.author_id
                && earning.order_id == line.order_id
                && earning.book_id == line.book_id
        });

        let account = state
            .accounts
            .get_mut(&line.author_id)
            .ok_or_else(|| LedgerError::not_found("Author not found"))?;
        if duplicate {
            return Ok(None);
        }

        let (amount, commission) = split_sale(line.sale_amount, account.commission_rate)?;
        let total_earnings = credit_balance(account.total_earnings, amount)?;
        let pending_balance = credit_balance(account.pending_balance, amount)?;
        let now = Utc::now();
        account.total_earnings = total_earnings;
        account.pending_balance = pending_balance;
        account.updated_at = now;

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
        state.earnings.push(earning.clone());

        Ok(Some(earning))
    }

    async fn release_pending(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        let mut state = self.state.write().await;
        let LedgerState {
            accounts, earnings, ..
        } = &mut *state;

        let now = Utc::now();
        let mut released = 0u64;
        for earning in earnings
            .iter_mut()
            .filter(|earning| earning.status == EarningStatus::Pending && earning.created_at < cutoff)
        {
            earning.status = EarningStatus::Available;
            earning.updated_at = now;
            released += 1;

            if let Some(account) = accounts.get_mut(&earning.author_id) {
                account.pending_balance -= earning.amount;
                account.available_balance += earning.amount;
                account.updated_at = now;
            }
        }

        Ok(released)
    }

    async fn earning_stats(
        &self,
        author_id: Uuid,
        since: DateTime<Utc>,
    ) -> LedgerResult<EarningStats> {
        let state = self.state.read().await;
        let mut stats = EarningStats::default();
        for earning in state.earnings.iter().filter(|e| e.author_id == author_id) {
            stats.total_sales += 1;
            if earning.created_at >= since {
                stats.revenue_since += earning.amount;
            }
        }

        Ok(stats)
    }

    async fn book_sales(&self, author_id: Uuid, book_id: Uuid) -> LedgerResult<BookSales> {
        let state = self.state.read().await;
        let mut sales = BookSales {
            book_id,
            sales_count: 0,
            total_revenue: Decimal::ZERO,
        };
        for earning in state
            .earnings
            .iter()
            .filter(|e| e.author_id == author_id && e.book_id == book_id)
        {
            sales.sales_count += 1;
            sales.total_revenue += earning.amount;
        }

        Ok(sales)
    }
}
