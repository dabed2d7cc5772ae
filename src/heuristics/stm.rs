use super::{ItemLine, OrderRecord, VatLine};
use regex::Regex;
use tracing::debug;

/// One scalar extraction rule: a label-anchored pattern whose first capture
/// group lands in a single record field.
///
/// Rules are independent of each other — a rule that fails to match leaves
/// its field `None` and never affects the others.
struct ScalarRule {
    field: &'static str,
    pattern: &'static str,
    assign: fn(&mut OrderRecord, String),
}

const SCALAR_RULES: &[ScalarRule] = &[
    ScalarRule {
        field: "order_number",
        pattern: r"Order No: ([0-9]+)",
        assign: |r, v| r.order_number = Some(v),
    },
    ScalarRule {
        field: "total_price",
        pattern: r"Total Price: ([0-9.]+ EUR)",
        assign: |r, v| r.total_price = Some(v),
    },
    ScalarRule {
        field: "order_date_time",
        // Stored verbatim; no calendar validation at extraction time.
        pattern: r"Date/Time Ordered \(([0-9\-: ]+)\)",
        assign: |r, v| r.order_date_time = Some(v),
    },
    ScalarRule {
        field: "payment_method",
        pattern: r"Payment method \((.*?)\)",
        assign: |r, v| r.payment_method = Some(v),
    },
    ScalarRule {
        field: "total_amount",
        pattern: r"Total amount: ([0-9.]+ EUR)",
        assign: |r, v| r.total_amount = Some(v),
    },
    ScalarRule {
        field: "vat_amount",
        pattern: r"VAT amount: ([0-9.]+ EUR)",
        assign: |r, v| r.vat_amount = Some(v),
    },
    ScalarRule {
        field: "change_due",
        pattern: r"Change due: ([0-9.]+ EUR)",
        assign: |r, v| r.change_due = Some(v),
    },
    ScalarRule {
        field: "vat_number",
        pattern: r"Vat No: ([A-Z0-9]+)",
        assign: |r, v| r.vat_number = Some(v),
    },
    ScalarRule {
        field: "receipt_print_id",
        pattern: r"Receipt print id: ([0-9]+)",
        assign: |r, v| r.receipt_print_id = Some(v),
    },
];

/// `<qty> - <name> // <price EUR> // VAT: <rate%> <amount EUR>`
const ITEM_PATTERN: &str = r"([0-9]+) - (.*?) // ([0-9.]+ EUR) // VAT: ([0-9.]+%) ([0-9.]+ EUR)";

/// `<rate%> - <amount EUR>` — structurally close to the item pattern.
/// Both patterns are applied independently over the full text; a region
/// matched by both shows up in both result sets, which mirrors the source
/// exports and is not deduplicated.
const VAT_SUMMARY_PATTERN: &str = r"([0-9.]+%) - ([0-9.]+ EUR)";

/// Main extraction entry point — applies every rule over the full text.
///
/// Never fails: a rule that doesn't match simply leaves its field absent.
pub fn extract(text: &str) -> OrderRecord {
    let mut record = OrderRecord::default();

    for rule in SCALAR_RULES {
        match capture_first(rule.pattern, text) {
            Some(value) => (rule.assign)(&mut record, value),
            None => debug!(field = rule.field, "Rule did not match"),
        }
    }

    record.items = extract_items(text);
    record.vat_summary = extract_vat_summary(text);
    record
}

/// First capture group of the first match, if any.
fn capture_first(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

fn extract_items(text: &str) -> Vec<ItemLine> {
    let Ok(re) = Regex::new(ITEM_PATTERN) else {
        return Vec::new();
    };
    re.captures_iter(text)
        .map(|cap| ItemLine {
            quantity: cap[1].to_string(),
            name: cap[2].to_string(),
            price: cap[3].to_string(),
            vat_rate: cap[4].to_string(),
            vat_amount: cap[5].to_string(),
        })
        .collect()
}

fn extract_vat_summary(text: &str) -> Vec<VatLine> {
    let Ok(re) = Regex::new(VAT_SUMMARY_PATTERN) else {
        return Vec::new();
    };
    re.captures_iter(text)
        .map(|cap| VatLine {
            vat_rate: cap[1].to_string(),
            amount: cap[2].to_string(),
        })
        .collect()
}
