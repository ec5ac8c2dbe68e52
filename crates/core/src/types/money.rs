//! Money and line-item types using decimal arithmetic.
//!
//! Order totals are computed exactly once, at order creation, from the
//! line items the cart collaborator hands us. They are never recomputed
//! from client input afterwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "currency_code"))]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// ISO 4217 code as a string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// One priced position of an order.
///
/// Line items arrive pre-validated from the cart collaborator and are
/// immutable once the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog product reference.
    pub product_id: ProductId,
    /// Price per unit in the order's currency.
    pub unit_price: Decimal,
    /// Number of units. Must be positive.
    pub quantity: u32,
}

impl LineItem {
    /// Create a new line item.
    #[must_use]
    pub const fn new(product_id: ProductId, unit_price: Decimal, quantity: u32) -> Self {
        Self {
            product_id,
            unit_price,
            quantity,
        }
    }

    /// Price of this line: `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of all line totals.
#[must_use]
pub fn line_items_total(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::line_total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        // 19.99 * 3 = 59.97
        let item = LineItem::new(ProductId::new(1), Decimal::new(1999, 2), 3);
        assert_eq!(item.line_total(), Decimal::new(5997, 2));
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let items = vec![
            LineItem::new(ProductId::new(1), Decimal::from(100), 2),
            LineItem::new(ProductId::new(2), Decimal::from(50), 1),
        ];
        assert_eq!(line_items_total(&items), Decimal::from(250));
    }

    #[test]
    fn test_total_of_empty_set_is_zero() {
        assert_eq!(line_items_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_currency_code_display() {
        assert_eq!(CurrencyCode::USD.to_string(), "USD");
        assert_eq!(CurrencyCode::GBP.to_string(), "GBP");
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("EUR".parse::<CurrencyCode>(), Ok(CurrencyCode::EUR));
        assert!("JPY".parse::<CurrencyCode>().is_err());
    }
}
