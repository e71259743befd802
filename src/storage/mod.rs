pub mod traits;
pub mod sqlite;

pub use traits::{FeedRepository, FetchQueue, FolderRepository, SubscriptionRepository, UserRepository};
pub use sqlite::{
    SqliteFeedRepository, SqliteFetchQueue, SqliteFolderRepository, SqliteStorage,
    SqliteSubscriptionRepository, SqliteUserRepository,
};
