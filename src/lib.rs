//! Subscription import and feed registry consolidation for a multi-user
//! feed reader.
//!
//! Importers turn an OPML outline, a Google Reader export or a Fever account
//! into a user's subscriptions and folder tree, resolving every address
//! through one shared, deduplicated feed registry. The merge engine folds
//! registry entries that turn out to be the same feed.

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod services;
pub mod storage;
pub mod urlnorm;
