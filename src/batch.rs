// src/batch.rs

use crate::enrich::{self, EnrichmentSource};
use crate::error::{DocumentError, DocumentErrorKind};
use crate::heuristics::{self, EnrichedOrderRecord};
use sha2::{Digest, Sha256};
use tracing::{info, info_span};

/// One receipt document, already isolated from its container by the
/// caller (archive extraction and .stm filtering happen upstream).
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// SHA-256 fingerprint of the raw bytes, used to identify a failing
    /// payload in error reports.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// Extract and enrich a whole batch of documents.
///
/// A document whose bytes are not valid UTF-8 is dropped and reported in
/// the error list; the batch continues. Absent fields within a decodable
/// document are never errors.
pub fn extract_batch(
    documents: &[Document],
    source: &dyn EnrichmentSource,
    location: &str,
) -> (Vec<EnrichedOrderRecord>, Vec<DocumentError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();

    for doc in documents {
        let span = info_span!("stm", name = %doc.name);
        let _guard = span.enter();

        let text = match std::str::from_utf8(&doc.bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Document is not valid text — dropping");
                errors.push(DocumentError {
                    name: doc.name.clone(),
                    fingerprint: doc.fingerprint(),
                    kind: DocumentErrorKind::Decode(e),
                });
                continue;
            }
        };

        let record = heuristics::extract_receipt(text);
        let (filled, total) = record.coverage();
        info!(
            filled,
            total,
            order_number = ?record.order_number,
            items = record.items.len(),
            vat_rows = record.vat_summary.len(),
            "Extracted"
        );

        records.push(enrich::enrich(record, source, location));
    }

    info!(
        records = records.len(),
        errors = errors.len(),
        "Batch extraction complete"
    );
    (records, errors)
}
