mod commands;

pub use commands::{Cli, Commands, ImportSource, UserAction};
