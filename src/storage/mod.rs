pub mod compact;
pub mod delete;
pub mod header;
pub mod insert;
pub mod temp;

pub use delete::MULTI_DELETE_RETAIL_THRESHOLD;
pub use header::PageHeader;
pub use insert::AddMode;
