use clap::{Parser, Subcommand};
use std::path::PathBuf;

use app_limiter::Selection;

/// App Limiter
///
/// Shields selected apps and categories and monitors usage of the ones
/// you want to encourage.
#[derive(Parser, Debug)]
#[command(name = "app-limiter")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the current selections and shield state
    Status,
    /// Print the platform this host reports
    Version,
    /// Check whether shielding is permitted
    CheckPermissions,
    /// Ask for permission to shield and monitor apps
    RequestPermissions,
    /// Shield apps, requesting permission first if needed
    Block(SelectionArgs),
    /// Replace the shielded selection (empty removes the shield)
    Discourage(SelectionArgs),
    /// Replace the monitored selection
    Encourage(SelectionArgs),
    /// Remove the shield and forget the shielded selection
    Clear,
}

#[derive(clap::Args, Debug)]
pub struct SelectionArgs {
    /// Application identifier (repeatable)
    #[arg(long = "app", value_name = "ID")]
    pub apps: Vec<String>,

    /// Category identifier (repeatable)
    #[arg(long = "category", value_name = "ID")]
    pub categories: Vec<String>,
}

impl SelectionArgs {
    pub fn into_selection(self) -> Selection {
        Selection::from_ids(self.apps, self.categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_selection_flags() {
        let args = Args::parse_from([
            "app-limiter",
            "discourage",
            "--app",
            "com.x",
            "--app",
            "com.y",
            "--category",
            "games",
        ]);

        match args.command {
            Commands::Discourage(selection) => {
                let selection = selection.into_selection();
                assert_eq!(selection.application_ids.len(), 2);
                assert!(selection.category_ids.contains("games"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn discourage_without_flags_is_empty_selection() {
        let args = Args::parse_from(["app-limiter", "discourage"]);
        match args.command {
            Commands::Discourage(selection) => assert!(selection.into_selection().is_empty()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::parse_from(["app-limiter", "status", "--verbose", "--config", "x.toml"]);
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }
}
