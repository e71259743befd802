pub mod feed;
pub mod folder;
pub mod subscription;
pub mod user;

pub use feed::{Feed, NewFeed, RegistryStats, SubscriberCounts};
pub use folder::{FolderNode, FolderTree, FLAT_ROOT};
pub use subscription::{NewSubscription, Subscription};
pub use user::User;
