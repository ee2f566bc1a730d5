use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kost_core::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Kost Lifecycle Service",
    about = "Run and demonstrate the boarding-house tenancy and billing lifecycle",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk the tenancy lifecycle end to end against an in-memory store
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Bind host, overriding APP_HOST
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Bind port, overriding APP_PORT
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    match Cli::parse().command {
        Some(Command::Demo(args)) => run_demo(args),
        Some(Command::Serve(args)) => server::run(args).await,
        None => server::run(ServeArgs::default()).await,
    }
}
