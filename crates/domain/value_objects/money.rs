use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

pub const BASIS_POINTS_PER_UNIT: i64 = 10_000;
pub const DEFAULT_COMMISSION_RATE_BPS: i32 = 200;

/// Platform commission expressed in basis points (200 = 2%).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionRate(i32);

impl CommissionRate {
    pub fn from_bps(bps: i32) -> Result<Self> {
        if !(0..=BASIS_POINTS_PER_UNIT as i32).contains(&bps) {
            bail!("Invalid commission rate: {bps} bps is outside 0..=10000");
        }
        Ok(Self(bps))
    }

    pub fn bps(&self) -> i32 {
        self.0
    }

    /// `200` bps renders as `"2.00"`.
    pub fn as_percent(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self(DEFAULT_COMMISSION_RATE_BPS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleSplit {
    pub sale_price_minor: i64,
    pub commission_minor: i64,
    pub seller_earnings_minor: i64,
}

/// Splits a sale price into commission and seller earnings.
///
/// Commission is rounded half-up to the nearest minor unit and earnings
/// take the remainder, so the two always sum to the sale price.
pub fn split_sale_price(sale_price_minor: i64, rate: CommissionRate) -> Result<SaleSplit> {
    if sale_price_minor <= 0 {
        bail!("Invalid sale price: {sale_price_minor} must be positive");
    }

    let commission_minor = sale_price_minor
        .checked_mul(i64::from(rate.bps()))
        .and_then(|scaled| scaled.checked_add(BASIS_POINTS_PER_UNIT / 2))
        .map(|scaled| scaled / BASIS_POINTS_PER_UNIT)
        .ok_or_else(|| anyhow!("Invalid sale price: {sale_price_minor} overflows commission"))?;

    Ok(SaleSplit {
        sale_price_minor,
        commission_minor,
        seller_earnings_minor: sale_price_minor - commission_minor,
    })
}

/// Renders minor units as a two-decimal amount, e.g. `98000` -> `"980.00"`.
pub fn format_minor(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
