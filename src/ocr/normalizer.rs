//! Single seam every adapter output passes through before leaving the core.

use tracing::debug;

use super::{CanonicalOcrResult, DocumentType, Envelope};

/// Converge an adapter envelope into a [`CanonicalOcrResult`].
///
/// Missing fields are coerced: no data becomes `{}`, no text becomes `""`,
/// and an absent or unknown type becomes [`DocumentType::Other`].
pub fn normalize(envelope: Envelope) -> CanonicalOcrResult {
    let Envelope {
        provider,
        doc_type,
        data,
        raw_text,
    } = envelope;

    let document_type = doc_type
        .as_deref()
        .map(DocumentType::from_tag)
        .unwrap_or_default();

    if data.is_none() || raw_text.is_none() {
        debug!(
            "Normalizer: coercing incomplete envelope from {} (data: {}, raw_text: {})",
            provider.as_str(),
            data.is_some(),
            raw_text.is_some()
        );
    }

    CanonicalOcrResult {
        provider,
        document_type,
        extracted_data: data.unwrap_or_default(),
        raw_text: raw_text.unwrap_or_default(),
    }
}
