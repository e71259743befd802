pub mod folder_service;
pub mod import;
pub mod merge_service;
pub mod queue_service;
pub mod registry_service;
pub mod subscription_service;
pub mod user_service;

pub use folder_service::FolderService;
pub use import::{ImportSummary, Importer, SkippedItem};
pub use merge_service::{MergeReport, MergeService};
pub use queue_service::{batch_ids, QueueService};
pub use registry_service::{prepare_feed, FeedRegistry};
pub use subscription_service::SubscriptionManager;
pub use user_service::UserService;
