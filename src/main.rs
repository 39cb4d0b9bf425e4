use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookcreator::logging::init().context("init logging")?;

    let cli = bookcreator::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        bookcreator::cli::Command::Session(args) => {
            bookcreator::repl::run(args).await.context("session")?;
        }
        bookcreator::cli::Command::Outline(args) => {
            bookcreator::commands::outline(args)
                .await
                .context("outline")?;
        }
        bookcreator::cli::Command::Chapter(args) => {
            bookcreator::commands::chapter(args)
                .await
                .context("chapter")?;
        }
        bookcreator::cli::Command::Export(args) => {
            bookcreator::commands::export(args).context("export")?;
        }
        bookcreator::cli::Command::Stats(args) => {
            bookcreator::commands::stats(args).context("stats")?;
        }
    }

    Ok(())
}
