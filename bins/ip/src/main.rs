//! ip command - network interface and routing configuration.

mod cli;

use std::io::{self, Write};

use clap::Parser;
use ipcmd::cursor::Cursor;
use ipcmd::dispatch;
use ipcmd::netlink::KernelGateway;
use ipcmd::options::Options;

use crate::cli::Cli;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let opts = Options::from_flags(cli.flags())?;
    let mut out = io::stdout();

    if opts.batch.is_some() {
        let gw = KernelGateway::from_options(&opts)?;
        dispatch::run_invocation(&cli.args, &opts, &gw, &mut out).await?;
        return Ok(());
    }

    // Grammar errors and help need no socket.
    let mut cursor = Cursor::new(cli.args.iter().map(String::as_str));
    let cmd = dispatch::parse_command(&mut cursor)?;
    if let Some(text) = cmd.help_text() {
        out.write_all(text.as_bytes())?;
        return Ok(());
    }
    let gw = KernelGateway::from_options(&opts)?;
    dispatch::execute(cmd, &opts, &gw, &mut out).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse_from(cli::normalise(std::env::args()));

    if let Err(e) = run(cli).await {
        eprintln!("ip: {e}");
        std::process::exit(1);
    }

    Ok(())
}
