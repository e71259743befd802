use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedshelf")]
#[command(about = "Import subscription lists and keep a shared feed registry consistent")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage reader accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Replace a user's subscriptions with an imported list
    Import {
        #[command(subcommand)]
        source: ImportSource,
    },

    /// Subscribe a user to a single feed URL
    Add {
        /// Username
        user: String,

        /// Feed or site URL
        url: String,

        /// Top-level folder to file the feed under
        #[arg(short, long, default_value = "")]
        folder: String,
    },

    /// Show a user's folder tree
    Folders {
        /// Username
        user: String,

        /// Print the flattened folder view instead of the nested tree
        #[arg(long)]
        flat: bool,
    },

    /// Fold one feed into another that turned out to be the same
    Merge {
        /// Feed id that goes away
        losing: i64,

        /// Feed id that survives
        winning: i64,
    },

    /// Correct the address of a feed flagged with an exception
    ChangeAddress {
        /// Feed id
        feed_id: i64,

        /// Corrected feed address
        address: String,
    },

    /// Show registry statistics
    Stats,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user
    Add {
        /// Username
        name: String,

        /// Create the account as premium
        #[arg(long)]
        premium: bool,
    },

    /// Upgrade a user to premium and activate all subscriptions
    Premium {
        /// Username
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ImportSource {
    /// Import an OPML outline file
    Opml {
        /// Username
        user: String,

        /// Path to the OPML file
        path: String,
    },

    /// Import a Google Reader subscription export
    GoogleReader {
        /// Username
        user: String,

        /// Path to the export file
        path: String,
    },

    /// Import the feeds of a Fever API account
    Fever {
        /// Username
        user: String,

        /// Fever endpoint URL
        #[arg(long, env = "FEVER_URL")]
        url: String,

        /// Fever account username
        #[arg(long, env = "FEVER_USERNAME")]
        username: String,

        /// Fever account password
        #[arg(long, env = "FEVER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}
