//! Charge calculation.
//!
//! Turns the base fee plus metered usage into an amount and line items.
//! All money is integer minor-currency units (cents); no floating point.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

const GIB: u64 = 1024 * 1024 * 1024;

/// Prices and pack granularity used to quote a billing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Fixed fee per cycle.
    pub base_fee_cents: i64,

    /// Fee per usage pack per cycle.
    pub pack_fee_cents: i64,

    /// Size of one usage pack in bytes. Never zero.
    pub pack_size_bytes: u64,

    /// Usage covered by the base fee.
    pub free_allowance_bytes: u64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base_fee_cents: 300,
            pack_fee_cents: 100,
            pack_size_bytes: 50 * GIB,
            free_allowance_bytes: 5 * GIB,
        }
    }
}

impl PricingPolicy {
    /// Validates the policy values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pack_size_bytes == 0 {
            return Err(ValidationError::invalid_format(
                "pack_size_bytes",
                "pack size must be greater than zero",
            ));
        }
        if self.base_fee_cents < 0 || self.pack_fee_cents < 0 {
            return Err(ValidationError::invalid_format(
                "fees",
                "fees cannot be negative",
            ));
        }
        Ok(())
    }

    /// Number of packs needed to cover `used_bytes`.
    ///
    /// `ceil(max(0, used - free) / pack_size)`: partial packs round up.
    pub fn packs_required(&self, used_bytes: u64) -> u32 {
        let billable = used_bytes.saturating_sub(self.free_allowance_bytes);
        if billable == 0 || self.pack_size_bytes == 0 {
            return 0;
        }
        let packs = billable / self.pack_size_bytes
            + u64::from(billable % self.pack_size_bytes != 0);
        u32::try_from(packs).unwrap_or(u32::MAX)
    }

    /// Storage allowance granted by a reserved pack count.
    pub fn allowance_for_packs(&self, pack_count: u32) -> u64 {
        self.free_allowance_bytes
            .saturating_add(self.pack_size_bytes.saturating_mul(u64::from(pack_count)))
    }

    /// Quotes one billing cycle.
    ///
    /// The billed pack count is the larger of the reserved packs and the
    /// packs required by measured usage.
    pub fn quote(&self, used_bytes: u64, reserved_packs: u32) -> ChargeQuote {
        let usage_packs = self.packs_required(used_bytes);
        let billed_packs = usage_packs.max(reserved_packs);
        let usage_charge_cents = self.pack_fee_cents.saturating_mul(i64::from(billed_packs));
        let total_cents = self.base_fee_cents.saturating_add(usage_charge_cents);

        let mut line_items = vec![LineItem {
            kind: LineItemKind::BaseFee,
            description: "Base subscription".to_string(),
            quantity: 1,
            unit_amount_cents: self.base_fee_cents,
            amount_cents: self.base_fee_cents,
        }];
        if billed_packs > 0 {
            line_items.push(LineItem {
                kind: LineItemKind::UsagePacks,
                description: format!(
                    "{} storage pack{} of {}",
                    billed_packs,
                    if billed_packs == 1 { "" } else { "s" },
                    format_bytes(self.pack_size_bytes)
                ),
                quantity: billed_packs,
                unit_amount_cents: self.pack_fee_cents,
                amount_cents: usage_charge_cents,
            });
        }

        let description = if billed_packs == 0 {
            format!("Base subscription ({} used)", format_bytes(used_bytes))
        } else {
            format!(
                "Base subscription + {} storage pack{} ({} used)",
                billed_packs,
                if billed_packs == 1 { "" } else { "s" },
                format_bytes(used_bytes)
            )
        };

        ChargeQuote {
            used_bytes,
            base_amount_cents: self.base_fee_cents,
            usage_packs,
            reserved_packs,
            billed_packs,
            usage_charge_cents,
            total_cents,
            line_items,
            description,
        }
    }
}

/// A priced billing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeQuote {
    /// Metered bytes the quote was computed from.
    pub used_bytes: u64,

    /// Fixed fee portion.
    pub base_amount_cents: i64,

    /// Packs required by measured usage alone.
    pub usage_packs: u32,

    /// Packs the account asked to reserve.
    pub reserved_packs: u32,

    /// Packs actually billed (usage packs or reserved packs, whichever is larger).
    pub billed_packs: u32,

    /// Pack fee portion.
    pub usage_charge_cents: i64,

    /// Total amount due.
    pub total_cents: i64,

    /// Itemized breakdown.
    pub line_items: Vec<LineItem>,

    /// Human-readable summary.
    pub description: String,
}

/// Kind of ledger line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    BaseFee,
    UsagePacks,
}

/// One line of a computed charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: u32,
    pub unit_amount_cents: i64,
    pub amount_cents: i64,
}

/// Formats a byte count with a binary unit for descriptions.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut unit = 0;
    let mut whole = bytes;
    let mut rem = 0u64;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        rem = whole % 1024;
        whole /= 1024;
        unit += 1;
    }
    if rem == 0 || unit == 0 {
        format!("{} {}", whole, UNITS[unit])
    } else {
        // One decimal, truncated.
        format!("{}.{} {}", whole, rem * 10 / 1024, UNITS[unit])
    }
}
