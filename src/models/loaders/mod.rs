pub mod manifest_loader;
pub mod page_loader;

pub use manifest_loader::{load_manifest, normalize_key, AssetManifest};
pub use page_loader::discover_pages;
