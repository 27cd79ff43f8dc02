use chrono::{DateTime, Utc};
use readagain_core::{Earning, Payout, SaleLine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayoutRequest {
    pub amount: Decimal,
    #[serde(default = "default_payout_method")]
    pub method: String,
    #[serde(default)]
    pub account_details: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EarningsListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutsListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsListResponse {
    pub earnings: Vec<Earning>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutsListResponse {
    pub payouts: Vec<Payout>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Emitted by checkout once an order is paid and fulfilled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub lines: Vec<CompletedOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOrderLine {
    pub book_id: Uuid,
    pub author_id: Uuid,
    pub sale_amount: Decimal,
}

impl OrderCompletedEvent {
    pub fn sale_lines(&self) -> Vec<SaleLine> {
        self.lines
            .iter()
            .map(|line| SaleLine {
                order_id: self.order_id,
                book_id: line.book_id,
                author_id: line.author_id,
                sale_amount: line.sale_amount,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequestedEvent {
    pub payout_id: Uuid,
    pub author_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub requested_at: DateTime<Utc>,
}

impl From<&Payout> for PayoutRequestedEvent {
    fn from(payout: &Payout) -> Self {
        Self {
            payout_id: payout.id,
            author_id: payout.author_id,
            amount: payout.amount,
            method: payout.method.clone(),
            requested_at: payout.requested_at,
        }
    }
}

fn default_payout_method() -> String {
    "bank_transfer".to_string()
}
