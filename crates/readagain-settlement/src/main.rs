use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use futures_util::StreamExt;
use readagain_earnings::EarningsService;
use readagain_platform::{
    ORDERS_COMPLETED_CHANNEL, OrderCompletedEvent, PgLedgerStore, RedisBus, SettlementConfig,
    apply_schema, connect_database,
};
use redis::Msg;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "readagain_settlement=info,readagain_earnings=info".to_string()),
        )
        .init();

    let config = SettlementConfig::from_env()?;
    let pool = connect_database(&config.database_url).await?;
    apply_schema(&pool).await?;
    let redis = RedisBus::connect(&config.redis_url)?;
    let service = EarningsService::new(Arc::new(PgLedgerStore::new(pool)));

    let releaser = service.clone();
    let clearing_window = config.clearing_window;
    let mut ticker = tokio::time::interval(config.clearing_interval);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            if let Err(err) = releaser
                .release_cleared_earnings(Utc::now(), clearing_window)
                .await
            {
                error!("failed to release cleared earnings: {err:#}");
            }
        }
    });

    let mut pubsub = redis.subscribe_orders_completed().await?;
    let mut messages = pubsub.on_message();

    info!("settlement worker subscribed to {}", ORDERS_COMPLETED_CHANNEL);

    loop {
        let msg = messages
            .next()
            .await
            .context("orders.completed stream ended unexpectedly")?;
        if let Err(err) = handle_message(&service, msg).await {
            error!("failed to process message: {err:#}");
        }
    }
}

async fn handle_message(service: &EarningsService, msg: Msg) -> Result<()> {
    let payload: String = msg.get_payload()?;
    let recorded = handle_payload(service, &payload).await?;
    info!("credited {} sale lines", recorded);
    Ok(())
}

/// Credits every line of a completed order and returns how many were new.
///
/// Lines the ledger rejects (unknown author, bad amount) are skipped. A storage
/// failure on one line does not stop the others; the message then fails so
/// the order can be replayed, which only credits the lines that are missing.
async fn handle_payload(service: &EarningsService, payload: &str) -> Result<usize> {
    let event: OrderCompletedEvent =
        serde_json::from_str(payload).context("malformed orders.completed payload")?;

    let lines = event.sale_lines();
    let mut recorded = 0;
    let mut failed = 0;
    for line in &lines {
        match service.record_sale(line).await {
            Ok(Some(_)) => recorded += 1,
            Ok(None) => {}
            Err(err) if err.is_client_error() => {
                warn!(
                    "skipping book {} on order {}: {}",
                    line.book_id, line.order_id, err
                );
            }
            Err(err) => {
                error!(
                    "failed to credit book {} on order {}: {}",
                    line.book_id, line.order_id, err
                );
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!(
            "{} of {} lines on order {} were not credited; replay the order",
            failed,
            lines.len(),
            event.order_id
        );
    }

    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use readagain_core::{
        AuthorAccount, BookSales, Earning, EarningStats, EarningStatus, LedgerError,
        LedgerResult, LedgerStore, NewPayout, Page, PageRequest, Payout, SaleLine,
    };
    use readagain_ledgerstore::InMemoryLedgerStore;
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    /// Fails accrual for one book while `down` is set.
    struct OutageStore {
        inner: InMemoryLedgerStore,
        failing_book: Uuid,
        down: AtomicBool,
    }

    #[async_trait]
    impl LedgerStore for OutageStore {
        async fn author_account(&self, author_id: Uuid) -> LedgerResult<Option<AuthorAccount>> {
            self.inner.author_account(author_id).await
        }

        async fn total_withdrawn(&self, author_id: Uuid) -> LedgerResult<Decimal> {
            self.inner.total_withdrawn(author_id).await
        }

        async fn list_earnings(
            &self,
            author_id: Uuid,
            status: Option<EarningStatus>,
            page: PageRequest,
        ) -> LedgerResult<Page<Earning>> {
            self.inner.list_earnings(author_id, status, page).await
        }

        async fn list_payouts(
            &self,
            author_id: Uuid,
            page: PageRequest,
        ) -> LedgerResult<Page<Payout>> {
            self.inner.list_payouts(author_id, page).await
        }

        async fn find_payout(
            &self,
            author_id: Uuid,
            payout_id: Uuid,
        ) -> LedgerResult<Option<Payout>> {
            self.inner.find_payout(author_id, payout_id).await
        }

        async fn create_payout(&self, request: NewPayout) -> LedgerResult<Payout> {
            self.inner.create_payout(request).await
        }

        async fn record_earning(&self, line: &SaleLine) -> LedgerResult<Option<Earning>> {
            if line.book_id == self.failing_book && self.down.load(Ordering::SeqCst) {
                return Err(LedgerError::Storage(anyhow::anyhow!("connection reset")));
            }
            self.inner.record_earning(line).await
        }

        async fn release_pending(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
            self.inner.release_pending(cutoff).await
        }

        async fn earning_stats(
            &self,
            author_id: Uuid,
            since: DateTime<Utc>,
        ) -> LedgerResult<EarningStats> {
            self.inner.earning_stats(author_id, since).await
        }

        async fn book_sales(&self, author_id: Uuid, book_id: Uuid) -> LedgerResult<BookSales> {
            self.inner.book_sales(author_id, book_id).await
        }
    }

    async fn service_with_author(author_id: Uuid) -> (Arc<InMemoryLedgerStore>, EarningsService) {
        let store = Arc::new(InMemoryLedgerStore::new());
        store
            .insert_account(AuthorAccount::new(author_id, Decimal::new(30, 0)))
            .await;
        (store.clone(), EarningsService::new(store))
    }

    fn order_payload(order_id: Uuid, lines: Vec<serde_json::Value>) -> String {
        json!({
            "order_id": order_id,
            "completed_at": "2026-10-02T09:30:00Z",
            "lines": lines,
        })
        .to_string()
    }

    #[tokio::test]
    async fn completed_order_credits_each_line_once() {
        let author_id = Uuid::new_v4();
        let (store, service) = service_with_author(author_id).await;
        let payload = order_payload(
            Uuid::new_v4(),
            vec![
                json!({"book_id": Uuid::new_v4(), "author_id": author_id, "sale_amount": "10.00"}),
                json!({"book_id": Uuid::new_v4(), "author_id": author_id, "sale_amount": "20.00"}),
            ],
        );

        assert_eq!(handle_payload(&service, &payload).await.unwrap(), 2);
        assert_eq!(handle_payload(&service, &payload).await.unwrap(), 0);

        let account = store.author_account(author_id).await.unwrap().unwrap();
        assert_eq!(account.pending_balance, Decimal::new(21, 0));
        assert_eq!(account.total_earnings, Decimal::new(21, 0));

        let earnings = store
            .list_earnings(author_id, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(earnings.total, 2);
    }

    #[tokio::test]
    async fn storage_failure_on_one_line_still_credits_the_rest() {
        let author_id = Uuid::new_v4();
        let failing_book = Uuid::new_v4();
        let inner = InMemoryLedgerStore::new();
        inner
            .insert_account(AuthorAccount::new(author_id, Decimal::new(30, 0)))
            .await;
        let store = Arc::new(OutageStore {
            inner,
            failing_book,
            down: AtomicBool::new(true),
        });
        let service = EarningsService::new(store.clone());
        let payload = order_payload(
            Uuid::new_v4(),
            vec![
                json!({"book_id": failing_book, "author_id": author_id, "sale_amount": "10.00"}),
                json!({"book_id": Uuid::new_v4(), "author_id": author_id, "sale_amount": "20.00"}),
            ],
        );

        let err = handle_payload(&service, &payload).await.unwrap_err();
        assert!(err.to_string().contains("1 of 2 lines"));
        let account = store.author_account(author_id).await.unwrap().unwrap();
        assert_eq!(account.pending_balance, Decimal::new(14, 0));

        store.down.store(false, Ordering::SeqCst);
        assert_eq!(handle_payload(&service, &payload).await.unwrap(), 1);
        let account = store.author_account(author_id).await.unwrap().unwrap();
        assert_eq!(account.pending_balance, Decimal::new(21, 0));
    }

    #[tokio::test]
    async fn rejected_lines_are_skipped() {
        let author_id = Uuid::new_v4();
        let (store, service) = service_with_author(author_id).await;
        let payload = order_payload(
            Uuid::new_v4(),
            vec![
                json!({"book_id": Uuid::new_v4(), "author_id": Uuid::new_v4(), "sale_amount": "15.00"}),
                json!({"book_id": Uuid::new_v4(), "author_id": author_id, "sale_amount": "0"}),
                json!({"book_id": Uuid::new_v4(), "author_id": author_id, "sale_amount": Decimal::MAX}),
                json!({"book_id": Uuid::new_v4(), "author_id": author_id, "sale_amount": "5.00"}),
            ],
        );

        assert_eq!(handle_payload(&service, &payload).await.unwrap(), 1);

        let account = store.author_account(author_id).await.unwrap().unwrap();
        assert_eq!(account.pending_balance, Decimal::new(350, 2));
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let (_, service) = service_with_author(Uuid::new_v4()).await;

        let err = handle_payload(&service, r#"{"order_id": "nope"}"#)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("malformed orders.completed payload"));
    }
}
