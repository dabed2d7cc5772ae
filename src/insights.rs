// src/insights.rs

use crate::dataset::{AggregateDataset, DatasetStore};
use crate::error::{BatchError, InsightError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs;
use time::PrimitiveDateTime;
use time::macros::format_description;
use tracing::{info, warn};

/// What to do when a cell fails numeric/date parsing during computation.
/// Never coerced to zero either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumericParsePolicy {
    /// Abort the whole report on the first bad cell (source behavior).
    FailFast,
    /// Log the bad cell and leave its row out of the affected rollup.
    SkipRow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightConfig {
    #[serde(default = "default_policy")]
    pub numeric_parse: NumericParsePolicy,
    #[serde(default = "default_top_items")]
    pub top_items: usize,
}

fn default_policy() -> NumericParsePolicy {
    NumericParsePolicy::FailFast
}

fn default_top_items() -> usize {
    5
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            numeric_parse: default_policy(),
            top_items: default_top_items(),
        }
    }
}

/// A VAT Summary row whose amount parsed to exactly 0.0. Serialized with
/// the original export's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatAnomaly {
    #[serde(rename = "Order Number")]
    pub order_number: Option<String>,
    #[serde(rename = "VAT Rate")]
    pub vat_rate: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
}

/// The fixed set of rollups computed over one aggregate dataset.
///
/// Monetary outputs are "€<2dp>" strings; all mapping keys are strings.
/// Maps keep insertion order (serde_json `preserve_order`), which makes
/// serialized reports byte-identical across recomputations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub total_revenue: String,
    pub average_order_value: String,
    pub top_selling_items: Map<String, Value>,
    pub spending_by_day: Map<String, Value>,
    pub vat_anomalies: Vec<VatAnomaly>,
    pub avg_by_conditions: Map<String, Value>,
}

pub struct InsightEngine {
    config: InsightConfig,
}

impl InsightEngine {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    /// Compute the full report. Deterministic for a given dataset.
    pub fn compute(&self, dataset: &AggregateDataset) -> Result<InsightReport, InsightError> {
        let (total_revenue, average_order_value) = self.revenue(dataset)?;
        Ok(InsightReport {
            total_revenue: format!("€{total_revenue:.2}"),
            average_order_value: format!("€{average_order_value:.2}"),
            top_selling_items: self.top_selling_items(dataset)?,
            spending_by_day: self.spending_by_day(dataset)?,
            vat_anomalies: self.vat_anomalies(dataset)?,
            avg_by_conditions: self.avg_by_conditions(dataset)?,
        })
    }

    fn revenue(&self, dataset: &AggregateDataset) -> Result<(f64, f64), InsightError> {
        let mut amounts = Vec::new();
        for row in &dataset.orders {
            // An absent cell is skipped; only a present-but-malformed one
            // goes through the policy.
            let Some(cell) = &row.total_amount else {
                continue;
            };
            if let Some(v) = self.checked(parse_eur("Total Amount", cell))? {
                amounts.push(v);
            }
        }
        // Fold from an explicit 0.0: `Iterator::sum` for f64 yields -0.0
        // for an empty iterator, which would format as "€-0.00".
        let total: f64 = amounts.iter().fold(0.0, |acc, v| acc + v);
        let average = if amounts.is_empty() {
            0.0
        } else {
            total / amounts.len() as f64
        };
        Ok((total, average))
    }

    fn top_selling_items(
        &self,
        dataset: &AggregateDataset,
    ) -> Result<Map<String, Value>, InsightError> {
        // Insertion-ordered accumulator so ties keep first-seen order
        // under the stable sort below.
        let mut totals: Vec<(String, i64)> = Vec::new();
        for row in &dataset.items {
            let Some(qty) = self.checked(parse_quantity("Quantity", &row.quantity))? else {
                continue;
            };
            match totals.iter_mut().find(|(name, _)| *name == row.name) {
                Some((_, total)) => *total += qty,
                None => totals.push((row.name.clone(), qty)),
            }
        }
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(totals
            .into_iter()
            .take(self.config.top_items)
            .map(|(name, qty)| (name, json!(qty)))
            .collect())
    }

    fn spending_by_day(
        &self,
        dataset: &AggregateDataset,
    ) -> Result<Map<String, Value>, InsightError> {
        let mut by_day: Vec<(String, f64)> = Vec::new();
        for row in &dataset.orders {
            let (Some(date), Some(cell)) = (&row.order_date_time, &row.total_amount) else {
                continue;
            };
            let Some(weekday) = self.checked(parse_weekday(date))? else {
                continue;
            };
            let Some(amount) = self.checked(parse_eur("Total Amount", cell))? else {
                continue;
            };
            match by_day.iter_mut().find(|(day, _)| *day == weekday) {
                Some((_, total)) => *total += amount,
                None => by_day.push((weekday, amount)),
            }
        }
        Ok(by_day
            .into_iter()
            .map(|(day, total)| (day, json!(total)))
            .collect())
    }

    fn vat_anomalies(&self, dataset: &AggregateDataset) -> Result<Vec<VatAnomaly>, InsightError> {
        let mut anomalies = Vec::new();
        for row in &dataset.vat_summary {
            let Some(amount) = self.checked(parse_eur("Amount", &row.amount))? else {
                continue;
            };
            if amount == 0.0 {
                anomalies.push(VatAnomaly {
                    order_number: row.order_number.clone(),
                    vat_rate: row.vat_rate.clone(),
                    amount,
                });
            }
        }
        Ok(anomalies)
    }

    fn avg_by_conditions(
        &self,
        dataset: &AggregateDataset,
    ) -> Result<Map<String, Value>, InsightError> {
        // (weather, game_day) -> (sum, count), insertion-ordered.
        let mut groups: Vec<((String, String), (f64, usize))> = Vec::new();
        let mut game_day_keys: Vec<String> = Vec::new();

        for row in &dataset.orders {
            let Some(cell) = &row.total_amount else {
                continue;
            };
            let Some(amount) = self.checked(parse_eur("Total Amount", cell))? else {
                continue;
            };
            if !game_day_keys.contains(&row.game_day) {
                game_day_keys.push(row.game_day.clone());
            }
            let key = (row.weather.clone(), row.game_day.clone());
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, (sum, count))) => {
                    *sum += amount;
                    *count += 1;
                }
                None => groups.push((key, (amount, 1))),
            }
        }

        let mut weather_keys: Vec<String> = Vec::new();
        for ((weather, _), _) in &groups {
            if !weather_keys.contains(weather) {
                weather_keys.push(weather.clone());
            }
        }

        // Missing (weather, game_day) combinations are filled with 0.0 so
        // every weather maps over the same game_day keys.
        let mut out = Map::new();
        for weather in &weather_keys {
            let mut inner = Map::new();
            for game_day in &game_day_keys {
                let mean = groups
                    .iter()
                    .find(|((w, g), _)| w == weather && g == game_day)
                    .map(|(_, (sum, count))| round2(sum / *count as f64))
                    .unwrap_or(0.0);
                inner.insert(game_day.clone(), json!(mean));
            }
            out.insert(weather.clone(), Value::Object(inner));
        }
        Ok(out)
    }

    /// Route a cell-level parse result through the configured policy.
    fn checked<T>(&self, result: Result<T, InsightError>) -> Result<Option<T>, InsightError> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) => match self.config.numeric_parse {
                NumericParsePolicy::FailFast => Err(e),
                NumericParsePolicy::SkipRow => {
                    warn!(error = %e, "Skipping row in rollup");
                    Ok(None)
                }
            },
        }
    }
}

/// Strip the exact " EUR" suffix and parse the remainder. A cell without
/// the suffix is a data error for that cell, not a zero.
fn parse_eur(column: &'static str, cell: &str) -> Result<f64, InsightError> {
    let number = cell
        .strip_suffix(" EUR")
        .ok_or_else(|| InsightError::NumericParse {
            column,
            value: cell.to_string(),
        })?;
    number
        .trim()
        .parse::<f64>()
        .map_err(|_| InsightError::NumericParse {
            column,
            value: cell.to_string(),
        })
}

fn parse_quantity(column: &'static str, cell: &str) -> Result<i64, InsightError> {
    cell.trim()
        .parse::<i64>()
        .map_err(|_| InsightError::QuantityParse {
            column,
            value: cell.to_string(),
        })
}

/// Weekday name ("Monday", ...) from a "YYYY-MM-DD HH:MM:SS" timestamp.
fn parse_weekday(value: &str) -> Result<String, InsightError> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(value.trim(), &format)
        .map(|dt| dt.weekday().to_string())
        .map_err(|_| InsightError::DateParse {
            value: value.to_string(),
        })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Load the persisted dataset, compute the report, and write it as pretty
/// JSON to the caller-specified sink.
pub fn compute_insights(
    store: &DatasetStore,
    engine: &InsightEngine,
    report_path: &str,
) -> Result<InsightReport, BatchError> {
    let dataset = store.load_dataset().map_err(|source| BatchError::Load {
        path: store.path().to_string(),
        source,
    })?;

    let report = engine.compute(&dataset)?;

    let json = serde_json::to_string_pretty(&report).map_err(|e| BatchError::Report {
        path: report_path.to_string(),
        source: std::io::Error::other(e),
    })?;
    fs::write(report_path, json).map_err(|source| BatchError::Report {
        path: report_path.to_string(),
        source,
    })?;

    info!(path = %report_path, "Insight report written");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ItemRow, OrderRow, VatRow};

    fn order_row(total_amount: Option<&str>, date: Option<&str>) -> OrderRow {
        OrderRow {
            order_number: Some("1".to_string()),
            total_price: None,
            order_date_time: date.map(str::to_string),
            payment_method: None,
            total_amount: total_amount.map(str::to_string),
            vat_amount: None,
            change_due: None,
            vat_number: None,
            receipt_print_id: None,
            weather: "Sunny".to_string(),
            game_day: "Yes".to_string(),
        }
    }

    fn item_row(name: &str, quantity: &str) -> ItemRow {
        ItemRow {
            order_number: Some("1".to_string()),
            quantity: quantity.to_string(),
            name: name.to_string(),
            price: "1.00 EUR".to_string(),
            vat_rate: "9%".to_string(),
            vat_amount: "0.08 EUR".to_string(),
        }
    }

    fn vat_row(rate: &str, amount: &str) -> VatRow {
        VatRow {
            order_number: Some("1".to_string()),
            vat_rate: rate.to_string(),
            amount: amount.to_string(),
        }
    }

    fn engine() -> InsightEngine {
        InsightEngine::new(InsightConfig::default())
    }

    #[test]
    fn revenue_and_average_from_two_orders() {
        let dataset = AggregateDataset {
            orders: vec![
                order_row(Some("4.00 EUR"), None),
                order_row(Some("6.00 EUR"), None),
            ],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();
        assert_eq!(report.total_revenue, "€10.00");
        assert_eq!(report.average_order_value, "€5.00");
    }

    #[test]
    fn empty_dataset_reports_zero_revenue() {
        let report = engine().compute(&AggregateDataset::default()).unwrap();
        assert_eq!(report.total_revenue, "€0.00");
        assert_eq!(report.average_order_value, "€0.00");
        assert!(report.top_selling_items.is_empty());
        assert!(report.vat_anomalies.is_empty());
    }

    #[test]
    fn top_items_are_capped_and_ties_keep_first_seen_order() {
        let dataset = AggregateDataset {
            items: vec![
                item_row("Tea", "3"),
                item_row("Coffee", "5"),
                item_row("Cake", "3"),
                item_row("Juice", "1"),
                item_row("Soup", "2"),
                item_row("Bread", "1"),
                item_row("Tea", "1"), // Tea now 4 total
            ],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();

        let entries: Vec<(&String, i64)> = report
            .top_selling_items
            .iter()
            .map(|(k, v)| (k, v.as_i64().unwrap()))
            .collect();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0], (&"Coffee".to_string(), 5));
        assert_eq!(entries[1], (&"Tea".to_string(), 4));
        assert_eq!(entries[2], (&"Cake".to_string(), 3));
        assert_eq!(entries[3], (&"Soup".to_string(), 2));
        // Juice and Bread tie at 1; Juice was seen first.
        assert_eq!(entries[4], (&"Juice".to_string(), 1));
    }

    #[test]
    fn spending_is_grouped_by_weekday_name() {
        let dataset = AggregateDataset {
            orders: vec![
                // 2024-03-15 is a Friday, 2024-03-16 a Saturday.
                order_row(Some("4.00 EUR"), Some("2024-03-15 12:30:45")),
                order_row(Some("6.00 EUR"), Some("2024-03-16 09:00:00")),
                order_row(Some("2.00 EUR"), Some("2024-03-15 20:15:00")),
            ],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();
        assert_eq!(report.spending_by_day["Friday"], json!(6.0));
        assert_eq!(report.spending_by_day["Saturday"], json!(6.0));
        assert_eq!(report.spending_by_day.len(), 2);
    }

    #[test]
    fn anomalies_are_exactly_the_zero_amount_rows() {
        let dataset = AggregateDataset {
            vat_summary: vec![
                vat_row("9%", "0.33 EUR"),
                vat_row("0%", "0.00 EUR"),
                vat_row("21%", "1.05 EUR"),
                vat_row("9%", "0.00 EUR"),
            ],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();
        assert_eq!(report.vat_anomalies.len(), 2);
        assert_eq!(report.vat_anomalies[0].vat_rate, "0%");
        assert_eq!(report.vat_anomalies[1].vat_rate, "9%");
        for anomaly in &report.vat_anomalies {
            assert_eq!(anomaly.amount, 0.0);
        }
    }

    #[test]
    fn avg_by_conditions_nests_weather_then_game_day_and_fills_gaps() {
        let mut rainy_no = order_row(Some("3.00 EUR"), None);
        rainy_no.weather = "Rainy".to_string();
        rainy_no.game_day = "No".to_string();

        let dataset = AggregateDataset {
            orders: vec![
                order_row(Some("4.00 EUR"), None), // Sunny / Yes
                order_row(Some("6.00 EUR"), None), // Sunny / Yes
                rainy_no,
            ],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();

        let sunny = report.avg_by_conditions["Sunny"].as_object().unwrap();
        assert_eq!(sunny["Yes"], json!(5.0));
        assert_eq!(sunny["No"], json!(0.0)); // filled, not omitted

        let rainy = report.avg_by_conditions["Rainy"].as_object().unwrap();
        assert_eq!(rainy["No"], json!(3.0));
        assert_eq!(rainy["Yes"], json!(0.0));
    }

    #[test]
    fn unenriched_orders_group_under_empty_condition_keys() {
        // Records without an order number carry empty weather/game_day
        // fields; they group under "" keys like the original export.
        let mut unenriched = order_row(Some("2.00 EUR"), None);
        unenriched.order_number = None;
        unenriched.weather = String::new();
        unenriched.game_day = String::new();

        let dataset = AggregateDataset {
            orders: vec![order_row(Some("4.00 EUR"), None), unenriched],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();

        let empty = report.avg_by_conditions[""].as_object().unwrap();
        assert_eq!(empty[""], json!(2.0));

        let sunny = report.avg_by_conditions["Sunny"].as_object().unwrap();
        assert_eq!(sunny["Yes"], json!(4.0));
        // Gap filling spans the unioned game_day keys, "" included.
        assert_eq!(sunny[""], json!(0.0));
        assert_eq!(empty["Yes"], json!(0.0));
    }

    #[test]
    fn fail_fast_aborts_on_a_suffixless_cell() {
        let dataset = AggregateDataset {
            orders: vec![order_row(Some("4.00"), None)],
            ..AggregateDataset::default()
        };
        let err = engine().compute(&dataset).unwrap_err();
        assert!(matches!(err, InsightError::NumericParse { .. }));
    }

    #[test]
    fn skip_row_leaves_the_bad_cell_out() {
        let dataset = AggregateDataset {
            orders: vec![
                order_row(Some("4.00"), None), // malformed
                order_row(Some("6.00 EUR"), None),
            ],
            ..AggregateDataset::default()
        };
        let engine = InsightEngine::new(InsightConfig {
            numeric_parse: NumericParsePolicy::SkipRow,
            ..InsightConfig::default()
        });
        let report = engine.compute(&dataset).unwrap();
        assert_eq!(report.total_revenue, "€6.00");
        assert_eq!(report.average_order_value, "€6.00");
    }

    #[test]
    fn absent_cells_are_skipped_under_both_policies() {
        let dataset = AggregateDataset {
            orders: vec![order_row(None, None), order_row(Some("6.00 EUR"), None)],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();
        assert_eq!(report.total_revenue, "€6.00");
    }

    #[test]
    fn recomputation_is_byte_identical() {
        let dataset = AggregateDataset {
            orders: vec![
                order_row(Some("4.00 EUR"), Some("2024-03-15 12:30:45")),
                order_row(Some("6.00 EUR"), Some("2024-03-16 09:00:00")),
            ],
            items: vec![item_row("Coffee", "2"), item_row("Tea", "2")],
            vat_summary: vec![vat_row("0%", "0.00 EUR")],
            ..AggregateDataset::default()
        };
        let first = serde_json::to_string_pretty(&engine().compute(&dataset).unwrap()).unwrap();
        let second = serde_json::to_string_pretty(&engine().compute(&dataset).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn orphaned_vat_rows_do_not_crash_rollups() {
        let dataset = AggregateDataset {
            vat_summary: vec![VatRow {
                order_number: None,
                vat_rate: "0%".to_string(),
                amount: "0.00 EUR".to_string(),
            }],
            ..AggregateDataset::default()
        };
        let report = engine().compute(&dataset).unwrap();
        assert_eq!(report.vat_anomalies.len(), 1);
        assert_eq!(report.vat_anomalies[0].order_number, None);
    }

    #[test]
    fn writes_the_report_to_the_sink() {
        let mut store = DatasetStore::new(":memory:").unwrap();
        store
            .replace_dataset(&AggregateDataset {
                orders: vec![order_row(Some("4.00 EUR"), None)],
                ..AggregateDataset::default()
            })
            .unwrap();

        let dir = std::env::temp_dir().join("receipt_insights_test_report");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("output.json");
        let path = path.to_str().unwrap();

        let report = compute_insights(&store, &engine(), path).unwrap();
        assert_eq!(report.total_revenue, "€4.00");

        let written: InsightReport =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, report);
        std::fs::remove_file(path).ok();
    }
}
