// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};

mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    logging::init(args.verbose)?;

    if let Commands::Version = args.command {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = commands::Context::open(&args)?;
    match args.command {
        Commands::Register(creds) => commands::register(&ctx, &creds.login, &creds.password).await,
        Commands::Login(creds) => commands::login(&ctx, &creds.login, &creds.password).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Refresh => commands::refresh(&ctx).await,
        Commands::Status => {
            commands::status(&ctx);
            Ok(())
        }
        Commands::Sync => commands::sync(&ctx).await,
        Commands::List { kind } => commands::list(&ctx, kind).await,
        Commands::Add(add) => commands::add(&ctx, add).await,
        Commands::Watch {
            interval_secs,
            refresh_secs,
        } => commands::watch(&ctx, interval_secs, refresh_secs).await,
        Commands::Version => Ok(()),
    }
}
