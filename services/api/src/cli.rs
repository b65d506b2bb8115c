use crate::quote::{run_batch_quote, run_lot_quote, run_model_inspect, BatchArgs, LotArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tea_quote::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tea Lot Price Quoting",
    about = "Serve and run tea auction lot price predictions from the command line",
    version
)]
struct Cli {
    /// Model bundle manifest to load instead of APP_MODEL_MANIFEST
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Quote auction lots with the loaded model bundle
    Quote {
        #[command(subcommand)]
        command: QuoteCommand,
    },
    /// Inspect the configured model bundle
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
}

#[derive(Subcommand, Debug)]
enum QuoteCommand {
    /// Quote a single lot and print the result as JSON
    Lot(LotArgs),
    /// Quote every lot in a CSV file
    Batch(BatchArgs),
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Print bundle version, feature layout, and vocabulary
    Inspect,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let manifest = cli.manifest;
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args, manifest).await,
        Command::Quote {
            command: QuoteCommand::Lot(args),
        } => run_lot_quote(args, manifest),
        Command::Quote {
            command: QuoteCommand::Batch(args),
        } => run_batch_quote(args, manifest),
        Command::Model {
            command: ModelCommand::Inspect,
        } => run_model_inspect(manifest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["tea-quote"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn manifest_flag_is_accepted_after_subcommands() {
        let cli = Cli::try_parse_from([
            "tea-quote",
            "quote",
            "lot",
            "--date",
            "05/06/2023",
            "--selling-mark",
            "ABC",
            "--grade",
            "BP1",
            "--bag-weight",
            "20",
            "--no-of-bags",
            "10",
            "--manifest",
            "bundle/manifest.json",
        ])
        .expect("parses");

        assert_eq!(cli.manifest, Some(PathBuf::from("bundle/manifest.json")));
        match cli.command {
            Some(Command::Quote {
                command: QuoteCommand::Lot(args),
            }) => {
                assert_eq!(args.selling_mark, "ABC");
                assert_eq!(args.no_of_bags, "10");
                assert!(args.invoice_no.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
