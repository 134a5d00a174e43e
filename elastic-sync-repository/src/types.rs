//! Result types for bulk transport operations.

/// Outcome of a single operation within a bulk request.
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    /// The document key the operation targeted.
    pub key: String,
    /// Whether the search engine accepted the operation.
    pub success: bool,
    /// Error reported by the search engine, if the item failed.
    pub error: Option<String>,
}

/// Summary of a bulk request: aggregate counts plus per-item results.
///
/// A per-item failure inside an otherwise delivered bulk request is a
/// document-level problem, not a transport failure; callers account for the
/// two separately.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    /// Total number of operations in the request.
    pub total: usize,
    /// Number of operations the search engine accepted.
    pub succeeded: usize,
    /// Number of operations the search engine rejected.
    pub failed: usize,
    /// Individual results, in request order.
    pub items: Vec<BulkItemResult>,
}

impl BulkReport {
    /// Whether every operation in the request was accepted.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
