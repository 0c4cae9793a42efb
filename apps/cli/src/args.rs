use std::env;
use std::path::PathBuf;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub import_on_start: bool,
    pub import_only: bool,
}

pub fn parse_args() -> Result<CliArgs, String> {
    parse_from(env::args().skip(1))
}

fn parse_from(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --port".to_string())?;
                let port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port value: {value}"))?;
                parsed.port = Some(port);
            }
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --config".to_string())?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--import" => {
                parsed.import_on_start = true;
            }
            "--import-only" => {
                parsed.import_only = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }

    Ok(parsed)
}

pub fn print_help() {
    println!(
        "Usage Tracker\n\n\
Usage:\n  usage-tracker [--port <port>] [--config <file>] [--import | --import-only]\n\n\
Options:\
\n  --port <port>    Override the configured port for this run only\
\n  --config <file>  Read configuration from <file> instead of the default location\
\n  --import         Run one telemetry import in the background after startup\
\n  --import-only    Run one telemetry import, print the run record and exit\
\n  -h, --help       Show this help message\n\n\
Environment:\
\n  LANGFUSE_HOST, LANGFUSE_PUBLIC_KEY, LANGFUSE_SECRET_KEY, USAGE_TRACKER_DB_PATH\
\n  override the config file; RUST_LOG sets the log filter (default info)\n"
    );
}
