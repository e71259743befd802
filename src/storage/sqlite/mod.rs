mod connection;
mod feed_repository;
mod fetch_queue;
mod folder_repository;
mod subscription_repository;
mod user_repository;

pub use connection::SqliteStorage;
pub use feed_repository::SqliteFeedRepository;
pub use fetch_queue::SqliteFetchQueue;
pub use folder_repository::SqliteFolderRepository;
pub use subscription_repository::SqliteSubscriptionRepository;
pub use user_repository::SqliteUserRepository;
