use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EarningStatus {
    Pending,
    Available,
    Paid,
}

impl EarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for EarningStatus {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "available" => Ok(Self::Available),
            "paid" => Ok(Self::Paid),
            other => Err(LedgerError::bad_request(format!(
                "Unsupported earning status: {other}"
            ))),
        }
    }
}

impl fmt::Display for EarningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Requested,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(Self::Requested),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(LedgerError::bad_request(format!(
                "Unsupported payout status: {other}"
            ))),
        }
    }
}

/// Revenue share credited to an author for one order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earning {
    pub id: Uuid,
    pub author_id: Uuid,
    pub order_id: Uuid,
    pub book_id: Uuid,
    pub amount: Decimal,
    pub commission: Decimal,
    pub status: EarningStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub author_id: Uuid,
    pub amount: Decimal,
    pub status: PayoutStatus,
    /// Free-form, e.g. `bank_transfer` or `paypal`.
    pub method: String,
    #[serde(skip_serializing, default)]
    pub account_details: String,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized running balances kept on the author row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorAccount {
    pub author_id: Uuid,
    pub total_earnings: Decimal,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub commission_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl AuthorAccount {
    pub fn new(author_id: Uuid, commission_rate: Decimal) -> Self {
        Self {
            author_id,
            total_earnings: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            commission_rate,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EarningsSummary {
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub total_earnings: Decimal,
    pub total_withdrawn: Decimal,
    pub commission_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EarningsOverview {
    pub total_earnings: Decimal,
    pub pending_balance: Decimal,
    pub available_balance: Decimal,
    pub total_sales: i64,
    pub this_month_revenue: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarningStats {
    pub total_sales: i64,
    pub revenue_since: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookSales {
    pub book_id: Uuid,
    pub sales_count: i64,
    pub total_revenue: Decimal,
}

/// One completed order line, as reported by checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub order_id: Uuid,
    pub book_id: Uuid,
    pub author_id: Uuid,
    pub sale_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewPayout {
    pub author_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub account_details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Out-of-range values fall back to the first page of 20.
    pub fn normalized(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|value| *value >= 1).unwrap_or(1);
        let limit = limit
            .filter(|value| (1..=MAX_PAGE_LIMIT).contains(value))
            .unwrap_or(DEFAULT_PAGE_LIMIT);

        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::normalized(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
