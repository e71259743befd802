use std::fs;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedshelf::cli::{Cli, Commands, ImportSource, UserAction};
use feedshelf::config::Config;
use feedshelf::domain::{FolderNode, User, FLAT_ROOT};
use feedshelf::services::import::HttpFeverClient;
use feedshelf::services::{
    FeedRegistry, FolderService, ImportSummary, Importer, MergeService, QueueService,
    SubscriptionManager, UserService,
};
use feedshelf::storage::sqlite::{
    SqliteFeedRepository, SqliteFetchQueue, SqliteFolderRepository, SqliteStorage,
    SqliteSubscriptionRepository, SqliteUserRepository,
};
use feedshelf::storage::traits::FeedRepository;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedshelf=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let storage = SqliteStorage::new(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path))?;

    match cli.command {
        Commands::User { action } => cmd_user(&storage, action),
        Commands::Import { source } => cmd_import(&storage, &config, source),
        Commands::Add { user, url, folder } => cmd_add(&storage, &user, &url, &folder),
        Commands::Folders { user, flat } => cmd_folders(&storage, &user, flat),
        Commands::Merge { losing, winning } => cmd_merge(&storage, losing, winning),
        Commands::ChangeAddress { feed_id, address } => {
            cmd_change_address(&storage, feed_id, &address)
        }
        Commands::Stats => cmd_stats(&storage),
    }
}

fn user_service(storage: &SqliteStorage) -> UserService<SqliteUserRepository, SqliteSubscriptionRepository> {
    UserService::new(
        SqliteUserRepository::new(storage.clone()),
        SqliteSubscriptionRepository::new(storage.clone()),
    )
}

fn registry(storage: &SqliteStorage) -> FeedRegistry<SqliteFeedRepository> {
    FeedRegistry::new(SqliteFeedRepository::new(storage.clone()))
}

fn manager(storage: &SqliteStorage) -> SubscriptionManager<SqliteSubscriptionRepository, SqliteFolderRepository> {
    SubscriptionManager::new(
        SqliteSubscriptionRepository::new(storage.clone()),
        SqliteFolderRepository::new(storage.clone()),
    )
}

fn find_user(storage: &SqliteStorage, name: &str) -> anyhow::Result<User> {
    Ok(user_service(storage).find(name)?)
}

fn cmd_user(storage: &SqliteStorage, action: UserAction) -> anyhow::Result<()> {
    let service = user_service(storage);
    match action {
        UserAction::Add { name, premium } => {
            let user = service.create(&name, premium)?;
            println!(
                "Created user {} (id {}){}",
                user,
                user.id,
                if user.is_premium { ", premium" } else { "" }
            );
        }
        UserAction::Premium { name } => {
            let user = service.find(&name)?;
            service.activate_premium(&user)?;
            println!("{} is now premium", user);
        }
    }
    Ok(())
}

fn cmd_import(storage: &SqliteStorage, config: &Config, source: ImportSource) -> anyhow::Result<()> {
    let importer = Importer::new(registry(storage), manager(storage));

    let (user, summary) = match source {
        ImportSource::Opml { user, path } => {
            let user = find_user(storage, &user)?;
            let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            println!("Importing OPML from {} for {}...\n", path, user);
            let summary = importer.import_opml(&user, &content)?;
            (user, summary)
        }
        ImportSource::GoogleReader { user, path } => {
            let user = find_user(storage, &user)?;
            let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            println!("Importing Google Reader export from {} for {}...\n", path, user);
            let summary = importer.import_google_reader(&user, &content)?;
            (user, summary)
        }
        ImportSource::Fever {
            user,
            url,
            username,
            password,
        } => {
            let user = find_user(storage, &user)?;
            let client = HttpFeverClient::new(
                &url,
                &username,
                &password,
                Duration::from_secs(config.http_timeout_secs),
            )?;
            println!("Importing Fever account {} for {}...\n", url, user);
            let summary = importer.import_fever(&user, &client)?;
            (user, summary)
        }
    };

    print_summary(&summary);

    let queue = QueueService::new(
        SqliteSubscriptionRepository::new(storage.clone()),
        SqliteFetchQueue::new(storage.clone()),
        config.fetch_batch_size,
    );
    let queued = queue.queue_new_feeds(&user)?;
    if queued > 0 {
        println!("Queued {} new feeds for fetching.", queued);
    }

    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    if !summary.skipped.is_empty() {
        println!("Skipped {} entries:", summary.skipped.len());
        for item in &summary.skipped {
            println!("  ! {}: {}", item.address, item.reason);
        }
        println!();
    }

    println!(
        "Import complete: {} feeds filed, {} skipped",
        summary.feed_ids.len(),
        summary.skipped.len()
    );
}

fn cmd_add(storage: &SqliteStorage, user: &str, url: &str, folder: &str) -> anyhow::Result<()> {
    let user = find_user(storage, user)?;
    let service = FolderService::new(registry(storage), manager(storage));

    let feed = service.subscribe(&user, url, folder)?;
    println!("Subscribed {} to {} (feed {})", user, feed.feed_address, feed.id);
    println!("  Title: {}", feed.feed_title);
    Ok(())
}

fn cmd_folders(storage: &SqliteStorage, user: &str, flat: bool) -> anyhow::Result<()> {
    let user = find_user(storage, user)?;
    let service = FolderService::new(registry(storage), manager(storage));

    if flat {
        for (path, feed_ids) in service.flat_folders(&user)? {
            let label = if path == FLAT_ROOT { "(top level)" } else { path.as_str() };
            let ids: Vec<String> = feed_ids.iter().map(i64::to_string).collect();
            println!("{}: {}", label, ids.join(", "));
        }
        return Ok(());
    }

    let tree = service.tree(&user)?;
    if tree.is_empty() {
        println!("No folders or feeds for {}.", user);
        return Ok(());
    }

    let feeds = SqliteFeedRepository::new(storage.clone());
    print_nodes(&feeds, tree.nodes(), 0)?;
    Ok(())
}

fn print_nodes(feeds: &SqliteFeedRepository, nodes: &[FolderNode], depth: usize) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            FolderNode::Feed(feed_id) => match feeds.get_by_id(*feed_id)? {
                Some(feed) => println!("{}- {} [{}] {}", indent, feed.feed_title, feed.id, feed.feed_address),
                None => println!("{}- [{}] (missing feed)", indent, feed_id),
            },
            FolderNode::Folder { name, children } => {
                println!("{}{}/", indent, name);
                print_nodes(feeds, children, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn merge_service(
    storage: &SqliteStorage,
) -> MergeService<SqliteFeedRepository, SqliteSubscriptionRepository, SqliteFolderRepository> {
    MergeService::new(
        registry(storage),
        SqliteSubscriptionRepository::new(storage.clone()),
        SqliteFolderRepository::new(storage.clone()),
    )
}

fn cmd_merge(storage: &SqliteStorage, losing: i64, winning: i64) -> anyhow::Result<()> {
    let report = merge_service(storage).merge(losing, winning)?;

    if report.already_merged {
        println!("Feed {} is already merged into {}.", losing, winning);
        return Ok(());
    }

    println!("Merged feed {} into {}:", losing, winning);
    println!("  Subscriptions moved:   {}", report.subscriptions_moved);
    println!("  Subscriptions dropped: {}", report.subscriptions_dropped);
    println!("  Folder trees updated:  {}", report.trees_updated);
    println!("  Redirects re-pointed:  {}", report.redirects_repointed);
    Ok(())
}

fn cmd_change_address(storage: &SqliteStorage, feed_id: i64, address: &str) -> anyhow::Result<()> {
    let feed = merge_service(storage).change_feed_address(feed_id, address)?;

    if feed.id == feed_id {
        println!("Feed {} now reads from {}", feed.id, feed.feed_address);
    } else {
        println!(
            "{} already belongs to feed {}; feed {} was merged into it",
            feed.feed_address, feed.id, feed_id
        );
    }
    Ok(())
}

fn cmd_stats(storage: &SqliteStorage) -> anyhow::Result<()> {
    let stats = SqliteFeedRepository::new(storage.clone()).stats()?;

    println!("Feeds:             {}", stats.feeds);
    println!("  active:          {}", stats.active_feeds);
    println!("  inactive:        {}", stats.inactive_feeds);
    println!("  feed exceptions: {}", stats.exception_feeds);
    println!("  page exceptions: {}", stats.exception_pages);
    println!("Duplicate feeds:   {}", stats.duplicate_feeds);
    println!("Subscriptions:     {}", stats.subscriptions);
    Ok(())
}
