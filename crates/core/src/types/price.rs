//! Type-safe price representation using decimal arithmetic.
//!
//! The shop sells in Vietnamese dong, which has no minor unit: amounts are
//! whole numbers and are displayed as `90.000₫`. `USD` is kept for
//! storefronts configured for a dollar catalogue.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (dong, dollars).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Subtract `other`, never going below zero.
    #[must_use]
    pub fn saturating_sub(self, other: Decimal) -> Self {
        let amount = (self.amount - other).max(Decimal::ZERO);
        Self::new(amount, self.currency_code)
    }

    /// Round to the currency's smallest unit (half away from zero).
    #[must_use]
    pub fn rounded(self) -> Self {
        Self::new(
            self.currency_code.round(self.amount),
            self.currency_code,
        )
    }

    /// Format for display, e.g. `90.000₫` or `$19.99`.
    #[must_use]
    pub fn display(&self) -> String {
        self.currency_code.format(self.amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    VND,
    USD,
}

impl CurrencyCode {
    /// Number of decimal places used for amounts.
    #[must_use]
    pub const fn decimal_places(self) -> u32 {
        match self {
            Self::VND => 0,
            Self::USD => 2,
        }
    }

    /// Currency symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::VND => "₫",
            Self::USD => "$",
        }
    }

    /// ISO code string.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::VND => "VND",
            Self::USD => "USD",
        }
    }

    /// Round an amount to this currency's smallest unit.
    #[must_use]
    pub fn round(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(
            self.decimal_places(),
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// Format an amount with grouping and symbol.
    #[must_use]
    pub fn format(self, amount: Decimal) -> String {
        let rounded = self.round(amount);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = rounded.abs().to_string();
        let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

        let (group_sep, decimal_sep) = match self {
            Self::VND => ('.', ','),
            Self::USD => (',', '.'),
        };
        let grouped = group_thousands(int_part, group_sep);
        let sign = if negative { "-" } else { "" };

        match self {
            Self::VND => format!("{sign}{grouped}{}", self.symbol()),
            Self::USD => {
                let places = self.decimal_places() as usize;
                let frac = format!("{frac_part:0<places$}");
                format!("{sign}{}{grouped}{decimal_sep}{frac}", self.symbol())
            }
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VND" => Ok(Self::VND),
            "USD" => Ok(Self::USD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// Insert `sep` between groups of three digits, counting from the right.
fn group_thousands(digits: &str, sep: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}
