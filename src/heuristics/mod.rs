// src/heuristics/mod.rs

mod stm;

use serde::Deserialize;
use serde::Serialize;

/// A single receipt line item, as captured from the document text.
///
/// Values are kept verbatim: `price` and `vat_amount` are unit-suffixed
/// ("4.00 EUR"), `vat_rate` is percent-suffixed ("9%"). Parsing to numbers
/// happens in the insight engine, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemLine {
    pub quantity: String,
    pub name: String,
    pub price: String,
    pub vat_rate: String,
    pub vat_amount: String,
}

/// A single row from the receipt's VAT breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatLine {
    pub vat_rate: String,
    pub amount: String,
}

/// All structured data we can extract from one .stm receipt document.
///
/// Every scalar is independently optional: `None` means the label never
/// matched, which is distinct from a matched-but-empty capture. Absent
/// fields are a normal per-field state, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_number: Option<String>,
    pub total_price: Option<String>,
    pub order_date_time: Option<String>,
    pub payment_method: Option<String>,
    pub total_amount: Option<String>,
    pub vat_amount: Option<String>,
    pub change_due: Option<String>,
    pub vat_number: Option<String>,
    pub receipt_print_id: Option<String>,
    pub items: Vec<ItemLine>,
    pub vat_summary: Vec<VatLine>,
}

impl OrderRecord {
    /// How many scalar fields were successfully extracted.
    pub fn coverage(&self) -> (usize, usize) {
        let total = 9;
        let filled = [
            self.order_number.is_some(),
            self.total_price.is_some(),
            self.order_date_time.is_some(),
            self.payment_method.is_some(),
            self.total_amount.is_some(),
            self.vat_amount.is_some(),
            self.change_due.is_some(),
            self.vat_number.is_some(),
            self.receipt_print_id.is_some(),
        ]
        .iter()
        .filter(|&&v| v)
        .count();
        (filled, total)
    }

    /// True when the order number is present and non-empty — the source
    /// rule that gates enrichment.
    pub fn has_order_number(&self) -> bool {
        self.order_number.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// An order record with contextual attributes attached.
///
/// `weather` and `game_day` are left as empty strings (not "Unknown", not
/// "No") for records without an order number; that asymmetry comes from
/// the source format and is deliberate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedOrderRecord {
    #[serde(flatten)]
    pub record: OrderRecord,
    pub weather: String,
    pub game_day: String,
}

/// Extract structured order data from raw receipt text.
pub fn extract_receipt(text: &str) -> OrderRecord {
    stm::extract(text)
}
