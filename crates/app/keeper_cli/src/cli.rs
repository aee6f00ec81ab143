use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keeper_core::models::item::{ItemKind, MetaEntry};

#[derive(Parser, Debug)]
#[command(name = "keeper", version, about = "Keeper vault client")]
pub struct Cli {
    /// Keeper server base URL.
    #[arg(
        long,
        global = true,
        env = "KEEPER_SERVER_URL",
        default_value = "http://127.0.0.1:3200"
    )]
    pub server_url: String,

    /// Directory holding `tokens.json`. Defaults to the platform data dir.
    #[arg(long, global = true, env = "KEEPER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and log in.
    Register(CredentialsArgs),
    /// Log in to an existing account.
    Login(CredentialsArgs),
    /// Revoke the session and forget local tokens.
    Logout,
    /// Rotate the token pair.
    Refresh,
    /// Show whether tokens are held. Makes no network calls.
    Status,
    /// Run one synchronization pass and print a summary.
    Sync,
    /// Synchronize, then print the local caches.
    List {
        /// Only show items of this kind.
        #[arg(long)]
        kind: Option<ItemKind>,
    },
    /// Create or replace an item.
    Add(AddArgs),
    /// Synchronize periodically until interrupted.
    Watch {
        /// Seconds between passes.
        #[arg(long, env = "KEEPER_SYNC_INTERVAL_SECS", default_value_t = 30)]
        interval_secs: u64,
        /// Seconds between token rotations; keep below the access token lifetime.
        #[arg(long, env = "KEEPER_REFRESH_INTERVAL_SECS", default_value_t = 300)]
        refresh_secs: u64,
    },
    /// Print version.
    Version,
}

#[derive(Args, Debug)]
pub struct CredentialsArgs {
    pub login: String,

    #[arg(long, env = "KEEPER_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Replace this existing item instead of creating one.
    #[arg(long)]
    pub id: Option<String>,

    /// Attach metadata; repeatable.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub meta: Vec<MetaEntry>,

    #[command(subcommand)]
    pub item: AddItem,
}

#[derive(Subcommand, Debug)]
pub enum AddItem {
    Credential {
        name: String,
        #[arg(long)]
        login: String,
        #[arg(long, env = "KEEPER_ITEM_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        url: Option<String>,
    },
    Note {
        name: String,
        #[arg(long)]
        text: String,
    },
    Card {
        name: String,
        #[arg(long)]
        number: String,
        #[arg(long)]
        holder: String,
        /// `MM/YY`.
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        cvc: String,
    },
    /// Record a local file's name, size and checksum.
    Binary {
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
}

fn parse_meta(s: &str) -> Result<MetaEntry, String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok(MetaEntry::new(key.trim(), value)),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn meta_needs_key_and_equals() {
        assert_eq!(parse_meta("folder=work").unwrap(), MetaEntry::new("folder", "work"));
        assert_eq!(parse_meta("empty=").unwrap(), MetaEntry::new("empty", ""));
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }

    #[test]
    fn parses_add_with_metadata() {
        let cli = Cli::try_parse_from([
            "keeper", "add", "--meta", "a=1", "--meta", "b=2", "note", "todo", "--text", "milk",
        ])
        .unwrap();
        let Commands::Add(add) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(add.meta.len(), 2);
        assert!(matches!(add.item, AddItem::Note { ref name, .. } if name == "todo"));
    }

    #[test]
    fn parses_kind_filter() {
        let cli = Cli::try_parse_from(["keeper", "list", "--kind", "card"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                kind: Some(ItemKind::Card)
            }
        ));
        assert!(Cli::try_parse_from(["keeper", "list", "--kind", "wallet"]).is_err());
    }

    #[test]
    fn parses_watch_intervals() {
        let cli = Cli::try_parse_from([
            "keeper",
            "watch",
            "--interval-secs",
            "10",
            "--refresh-secs",
            "60",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watch {
                interval_secs: 10,
                refresh_secs: 60
            }
        ));
    }
}
