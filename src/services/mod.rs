pub mod asset_fetcher;
pub mod exporter;
pub mod page_assembler;
pub mod run_log;

pub use asset_fetcher::{AssetFetcher, FetchTask};
pub use exporter::{build_exporter, DocumentExporter};
pub use page_assembler::PageAssembler;
pub use run_log::RunLogWriter;
