//! CLI argument definitions using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// shellcache - versioned offline cache for a web app shell
///
/// Pre-caches the configured asset list, clears buckets left by older
/// versions, and answers requests cache-first.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding cache buckets
    #[arg(long, global = true, env = "SHELLCACHE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Override the configured cache version
    #[arg(long, global = true)]
    pub version_tag: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate the current version's bucket with every listed asset
    Install,

    /// Delete every bucket except the current version's
    Activate,

    /// Install, then activate if install succeeded
    Register,

    /// Request a URL through the cache
    Fetch(FetchArgs),

    /// List buckets and their entries
    List,

    /// Show or initialize configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL, or a path resolved against the configured origin
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the body to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_method() {
        let cli = Cli::try_parse_from(["shellcache", "fetch", "/api/save", "-X", "POST"]).unwrap();
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.url, "/api/save");
                assert_eq!(args.method, "POST");
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_version_tag() {
        let cli =
            Cli::try_parse_from(["shellcache", "install", "--version-tag", "joseph-planner-v3"])
                .unwrap();
        assert_eq!(cli.version_tag.as_deref(), Some("joseph-planner-v3"));
        assert!(matches!(cli.command, Commands::Install));
    }
}
