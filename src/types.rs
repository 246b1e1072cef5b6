use serde::{Deserialize, Serialize};

/// Summary of a reconciled index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    /// Total compressed size of the data file in bytes
    pub total_size: u64,
    pub total_blocks: usize,
    /// Estimated from the average bytes per record, not counted
    pub total_records: u64,
}

impl FileStats {
    /// Estimated page count, `ceil(total_records / page_size)`.
    pub fn total_pages(&self, page_size: u64) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.total_records.div_ceil(page_size)
    }
}

/// One page of parsed records, with a note of how it was assembled.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    /// Page the caller asked for
    pub requested_page: u64,
    /// Page actually served (1 after a fallback)
    pub page: u64,
    pub page_size: u64,
    /// Block indices that were selected for the served page
    pub blocks: Vec<usize>,
    /// Block indices whose text could not be recovered
    pub failed_blocks: Vec<usize>,
    pub degraded: bool,
    pub fell_back: bool,
}

/// Query parameters for `GET /page`
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// JSON body for `GET /page`
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page: u64,
    pub requested_page: u64,
    pub page_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    pub degraded: bool,
    pub failed_blocks: Vec<usize>,
    pub fell_back: bool,
}

/// JSON body for `GET /stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: FileStats,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Service info response
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub data: String,
    pub index: String,
}
