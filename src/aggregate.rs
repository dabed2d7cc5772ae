// src/aggregate.rs

use crate::dataset::{AggregateDataset, DatasetStore, ItemRow, OrderRow, VatRow};
use crate::error::BatchError;
use crate::heuristics::EnrichedOrderRecord;
use tracing::info;

/// Flatten a batch of enriched records into the three relations.
///
/// Pure, single pass. Every record yields exactly one orders row (even
/// when all its scalars are absent — the source exports do the same), one
/// items row per line item, and one vat_summary row per VAT line, all
/// carrying the parent `order_number` as the join key.
pub fn aggregate(records: &[EnrichedOrderRecord]) -> AggregateDataset {
    let mut dataset = AggregateDataset::default();

    for enriched in records {
        let record = &enriched.record;

        dataset.orders.push(OrderRow {
            order_number: record.order_number.clone(),
            total_price: record.total_price.clone(),
            order_date_time: record.order_date_time.clone(),
            payment_method: record.payment_method.clone(),
            total_amount: record.total_amount.clone(),
            vat_amount: record.vat_amount.clone(),
            change_due: record.change_due.clone(),
            vat_number: record.vat_number.clone(),
            receipt_print_id: record.receipt_print_id.clone(),
            weather: enriched.weather.clone(),
            game_day: enriched.game_day.clone(),
        });

        for item in &record.items {
            dataset.items.push(ItemRow {
                order_number: record.order_number.clone(),
                quantity: item.quantity.clone(),
                name: item.name.clone(),
                price: item.price.clone(),
                vat_rate: item.vat_rate.clone(),
                vat_amount: item.vat_amount.clone(),
            });
        }

        for vat in &record.vat_summary {
            dataset.vat_summary.push(VatRow {
                order_number: record.order_number.clone(),
                vat_rate: vat.vat_rate.clone(),
                amount: vat.amount.clone(),
            });
        }
    }

    dataset
}

/// Aggregate a batch and replace the persisted dataset artifact.
///
/// The write is transactional: on failure the store keeps its previous
/// contents and the error carries the artifact path for retry.
pub fn aggregate_and_persist(
    records: &[EnrichedOrderRecord],
    store: &mut DatasetStore,
) -> Result<AggregateDataset, BatchError> {
    let dataset = aggregate(records);

    store
        .replace_dataset(&dataset)
        .map_err(|source| BatchError::Persist {
            path: store.path().to_string(),
            source,
        })?;

    info!(
        records = records.len(),
        orders = dataset.orders.len(),
        items = dataset.items.len(),
        vat_rows = dataset.vat_summary.len(),
        "Batch aggregated and persisted"
    );
    Ok(dataset)
}
