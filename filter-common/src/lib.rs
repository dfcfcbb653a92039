pub mod models;
pub mod normalize;

// 重新导出常用类型，方便直接使用
pub use models::{
    FilterCount, FilterCounts, FilterDimension, FilterPatch, FilterSelection, ProductId, Severity,
    ValidationIssue, DEFAULT_PAGE_SIZE,
};
