pub mod error;
pub mod models;
pub mod policy;
pub mod storage;

pub use error::{LedgerError, LedgerResult};
pub use models::{
    AuthorAccount, BookSales, Earning, EarningStats, EarningStatus, EarningsOverview,
    EarningsSummary, NewPayout, Page, PageRequest, Payout, PayoutStatus, SaleLine,
};
pub use policy::{
    credit_balance, default_commission_rate, maximum_ledger_amount, minimum_payout_amount,
    split_sale, validate_payout_amount,
};
pub use storage::LedgerStore;
