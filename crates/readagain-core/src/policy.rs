use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};

pub fn minimum_payout_amount() -> Decimal {
    Decimal::new(10, 0)
}

pub fn default_commission_rate() -> Decimal {
    Decimal::new(30, 0) // 30% retained by the platform
}

/// Largest amount a `NUMERIC(14, 2)` ledger column holds.
pub fn maximum_ledger_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

fn has_sub_cent_digits(amount: Decimal) -> bool {
    amount.normalize().scale() > 2
}

/// Checks a withdrawal against the balance seen at decision time.
///
/// Checks run in a fixed order and the first failure wins: a non-positive
/// amount or one with fractional cents, an amount under the minimum, then an
/// amount over `available`.
pub fn validate_payout_amount(amount: Decimal, available: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::bad_request("Invalid payout amount"));
    }
    if has_sub_cent_digits(amount) {
        return Err(LedgerError::bad_request(
            "Payout amount cannot have more than 2 decimal places",
        ));
    }
    if amount < minimum_payout_amount() {
        return Err(LedgerError::bad_request("Minimum payout amount is $10"));
    }
    if amount > available {
        return Err(LedgerError::bad_request("Insufficient available balance"));
    }

    Ok(())
}

/// Adds `amount` to a running balance, refusing totals the ledger columns
/// cannot store.
pub fn credit_balance(balance: Decimal, amount: Decimal) -> LedgerResult<Decimal> {
    balance
        .checked_add(amount)
        .filter(|total| *total <= maximum_ledger_amount())
        .ok_or_else(|| LedgerError::bad_request("Earning would overflow the author balance"))
}

/// Splits a sale into `(author_share, platform_commission)`.
///
/// `commission_rate` is the percentage the platform keeps. The commission is
/// rounded to cents and the author receives the remainder, so the two parts
/// always add back up to the sale amount.
pub fn split_sale(sale_amount: Decimal, commission_rate: Decimal) -> LedgerResult<(Decimal, Decimal)> {
    if sale_amount <= Decimal::ZERO {
        return Err(LedgerError::bad_request("sale_amount must be positive"));
    }
    if sale_amount > maximum_ledger_amount() {
        return Err(LedgerError::bad_request("sale_amount is too large"));
    }
    if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE_HUNDRED {
        return Err(LedgerError::bad_request(
            "commission_rate must be between 0 and 100",
        ));
    }

    let sale_amount = sale_amount.round_dp(2);
    let commission = sale_amount
        .checked_mul(commission_rate)
        .and_then(|gross| gross.checked_div(Decimal::ONE_HUNDRED))
        .map(|commission| commission.round_dp(2))
        .ok_or_else(|| LedgerError::bad_request("sale_amount is too large"))?;

    Ok((sale_amount - commission, commission))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: LedgerResult<()>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn rejects_non_positive_amount_first() {
        assert_eq!(
            message(validate_payout_amount(Decimal::ZERO, Decimal::ZERO)),
            "Invalid payout amount"
        );
        assert_eq!(
            message(validate_payout_amount(Decimal::new(-5, 0), Decimal::new(100, 0))),
            "Invalid payout amount"
        );
    }

    #[test]
    fn rejects_amount_below_minimum_before_balance() {
        assert_eq!(
            message(validate_payout_amount(Decimal::new(5, 0), Decimal::ZERO)),
            "Minimum payout amount is $10"
        );
        assert_eq!(
            message(validate_payout_amount(Decimal::new(999, 2), Decimal::new(100, 0))),
            "Minimum payout amount is $10"
        );
    }

    #[test]
    fn rejects_amount_over_available_balance() {
        assert_eq!(
            message(validate_payout_amount(Decimal::new(100, 0), Decimal::new(50, 0))),
            "Insufficient available balance"
        );
    }

    #[test]
    fn accepts_exact_balance_and_exact_minimum() {
        assert!(validate_payout_amount(Decimal::new(50, 0), Decimal::new(50, 0)).is_ok());
        assert!(validate_payout_amount(Decimal::new(10, 0), Decimal::new(50, 0)).is_ok());
    }

    #[test]
    fn rejects_fractional_cents() {
        assert_eq!(
            message(validate_payout_amount(Decimal::new(10004, 3), Decimal::new(50, 0))),
            "Payout amount cannot have more than 2 decimal places"
        );
        assert!(validate_payout_amount(Decimal::new(10000, 3), Decimal::new(50, 0)).is_ok());
    }

    #[test]
    fn credit_balance_stops_at_column_capacity() {
        assert_eq!(
            credit_balance(Decimal::new(1050, 2), Decimal::new(350, 2)).unwrap(),
            Decimal::new(14, 0)
        );
        assert!(credit_balance(maximum_ledger_amount(), Decimal::new(1, 2)).is_err());
        assert!(credit_balance(Decimal::MAX, Decimal::MAX).is_err());
    }

    #[test]
    fn split_sale_keeps_parts_summing_to_sale() {
        let (share, commission) = split_sale(Decimal::new(1999, 2), Decimal::new(30, 0)).unwrap();
        assert_eq!(commission, Decimal::new(600, 2));
        assert_eq!(share, Decimal::new(1399, 2));
        assert_eq!(share + commission, Decimal::new(1999, 2));
    }

    #[test]
    fn split_sale_rejects_bad_inputs() {
        assert!(split_sale(Decimal::ZERO, Decimal::new(30, 0)).is_err());
        assert!(split_sale(Decimal::new(10, 0), Decimal::new(101, 0)).is_err());
        assert!(split_sale(Decimal::new(10, 0), Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn split_sale_rejects_amounts_beyond_ledger_capacity() {
        let err = split_sale(Decimal::MAX, Decimal::new(30, 0)).unwrap_err();
        assert_eq!(err.to_string(), "sale_amount is too large");
        assert!(err.is_client_error());

        let (share, commission) =
            split_sale(maximum_ledger_amount(), Decimal::ONE_HUNDRED).unwrap();
        assert_eq!(share, Decimal::ZERO);
        assert_eq!(commission, maximum_ledger_amount());
    }
}
