use ferrum_dump::{dump, DumpConfig, RedisConnection};
use std::process::ExitCode;
use tracing::{error, info};

const USAGE: &str = "\
ferrum-dump - Dump a Redis-compatible database as a replayable script

Usage: ferrum-dump [OPTIONS]

Options:
  -a, --address <HOST:PORT>  Store address (default 127.0.0.1:6379)
      --password <PASSWORD>  Store password (default none)
  -d, --db <N>               Logical database index (default 0)
  -f, --filter <PATTERN>     Glob-style key filter (default *)
  -h, --help                 Print this help
";

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout carries nothing but the dump itself
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match parse_args(std::env::args().skip(1)) {
        Ok(Some(config)) => config,
        Ok(None) => {
            print!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            error!("{}", msg);
            eprint!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Connect and drive the export to completion
async fn run(config: DumpConfig) -> anyhow::Result<()> {
    let mut client = RedisConnection::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", config.address, e))?;

    info!("Dumping database with filter {}", config.filter);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    dump::export(&mut client, &config.filter, &mut out).await?;

    Ok(())
}

/// Parse command-line flags into a config
///
/// Returns Ok(None) when help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<DumpConfig>, String> {
    let mut config = DumpConfig::default();

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "-h" | "--help" => return Ok(None),
            "-a" | "--address" => config.address = take_value(&flag, &mut args)?,
            "--password" => config.password = take_value(&flag, &mut args)?,
            "-d" | "--db" => {
                let value = take_value(&flag, &mut args)?;
                config.db = value
                    .parse()
                    .map_err(|_| format!("Invalid database index: {}", value))?;
            }
            "-f" | "--filter" => config.filter = take_value(&flag, &mut args)?,
            other => return Err(format!("Unknown option: {}", other)),
        }
    }

    Ok(Some(config))
}

fn take_value(
    flag: &str,
    args: &mut impl Iterator<Item = String>,
) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{} needs a value", flag))
}
