pub mod layer_spec;
pub mod loaders;
pub mod options;
pub mod page;
pub mod stack;
pub mod summary;

pub use layer_spec::{LayerSpec, LABEL_LAYER, STANDARD_LAYERS};
pub use loaders::{discover_pages, load_manifest, normalize_key, AssetManifest};
pub use options::{ExportMode, ExportOptions, ReceiveType, TargetEncoding, VectorBackend};
pub use page::{Page, PageId};
pub use stack::{LayerStack, Origin, PageSize, Placement, ResolvedLayer};
pub use summary::{BatchResult, FailureDetail, Outcome, RunSummary};
