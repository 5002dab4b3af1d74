//! Business services composed by the handlers.

pub mod applications;
pub mod ingestion;
pub mod statistics;

pub use applications::ApplicationService;
pub use ingestion::IngestionService;
pub use statistics::StatisticsService;

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: u64,
    pub limit: u32,
    pub total: u64,
}
