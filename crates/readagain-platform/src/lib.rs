pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;
pub mod redis_bus;

pub use config::{ServiceConfig, SettlementConfig};
pub use contracts::{
    EarningsListQuery, EarningsListResponse, OrderCompletedEvent, PayoutRequestedEvent,
    PayoutsListQuery, PayoutsListResponse, RequestPayoutRequest,
};
pub use db::{apply_schema, connect_database};
pub use pg_store::PgLedgerStore;
pub use redis_bus::RedisBus;

pub const ORDERS_COMPLETED_CHANNEL: &str = "orders.completed";
pub const PAYOUTS_REQUESTED_CHANNEL: &str = "payouts.requested";
