use anyhow::Context;
use cgps2caom2::cli::Cli;
use cgps2caom2::ingest;
use clap::{CommandFactory, Parser};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    if std::env::args().len() < 2 {
        let mut cmd = Cli::command();
        eprintln!("{}", cmd.render_usage());
        eprintln!("cgps2caom2: error: too few arguments");
        std::process::exit(-1);
    }

    let cli = Cli::parse();
    init_logging(&cli)?;

    ingest::run(&cli)
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &cli.log {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
