mod logging;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use sgtier_core::{load_run_config, probe_grid, resolve_credentials, run_once, write_report};
use sgtier_error::{Result, SgError};
use sgtier_grid::GridClient;
use tracing::{error, info};

const USAGE_EXIT: u8 = 64;

#[derive(Debug, PartialEq, Eq)]
struct CliConfig {
    config_path: PathBuf,
    log_file: Option<PathBuf>,
    report_path: Option<PathBuf>,
    verbose: bool,
    probe: bool,
}

fn print_help() {
    let help = "\
sgtier: keep StorageGRID bucket ILM policy tags in line with account tiers

USAGE:
    sgtier --config <PATH> [OPTIONS]

OPTIONS:
    --config <PATH>      Run configuration JSON file (required)
    --log-file <PATH>    Append JSON-lines logs here (overrides log_file in the config)
    --report <PATH>      Write the run report JSON to this path
    --probe              Authenticate against the grid and exit
    -v, --verbose        Show debug output on the terminal
    -h, --help           Show this help

ENVIRONMENT:
    SGTIER_USERNAME / SGTIER_PASSWORD   Tenant console credentials (names configurable)
    RUST_LOG                            Terminal log filter override
";
    println!("{help}");
}

fn parse_args(args: &[String]) -> std::result::Result<CliConfig, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut log_file: Option<PathBuf> = None;
    let mut report_path: Option<PathBuf> = None;
    let mut verbose = false;
    let mut probe = false;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--config" => {
                index += 1;
                if index >= args.len() {
                    return Err("--config requires a value".to_owned());
                }
                config_path = Some(PathBuf::from(&args[index]));
            }
            "--log-file" => {
                index += 1;
                if index >= args.len() {
                    return Err("--log-file requires a value".to_owned());
                }
                log_file = Some(PathBuf::from(&args[index]));
            }
            "--report" => {
                index += 1;
                if index >= args.len() {
                    return Err("--report requires a value".to_owned());
                }
                report_path = Some(PathBuf::from(&args[index]));
            }
            "--probe" => probe = true,
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            unknown => return Err(format!("unknown option: {unknown}")),
        }
        index += 1;
    }

    Ok(CliConfig {
        config_path: config_path.ok_or_else(|| "--config is required".to_owned())?,
        log_file,
        report_path,
        verbose,
        probe,
    })
}

fn run(cli: &CliConfig) -> Result<()> {
    let config = load_run_config(&cli.config_path)?;
    let log_file = cli.log_file.as_ref().or(config.log_file.as_ref());
    logging::init_logging(log_file.map(PathBuf::as_path), cli.verbose)?;

    let credentials = resolve_credentials(&config.credentials, |var| env::var(var).ok())?;
    let client = GridClient::new(config.grid.endpoint()?, &config.grid.client_settings())?;

    if cli.probe {
        return probe_grid(&client, &credentials);
    }

    let notifier = config.email.transport.build();
    let outcome = run_once(&config, &client, &credentials, notifier.as_ref())?;

    if let Some(path) = &cli.report_path {
        write_report(path, &outcome.report)?;
        info!(path = %path.display(), "Run report written");
    }
    outcome.into_result().map(|_| ())
}

fn exit_code_for(err: &SgError) -> ExitCode {
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) if message.is_empty() => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("run `sgtier --help` for usage");
            return ExitCode::from(USAGE_EXIT);
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "sgtier run failed");
            eprintln!("error: {err}");
            if let Some(hint) = err.suggestion() {
                eprintln!("hint: {hint}");
            }
            exit_code_for(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn full_argument_set() {
        let cli = parse_args(&args(&[
            "--config",
            "/etc/sgtier/run.json",
            "--log-file",
            "/var/log/sgtier.log",
            "--report",
            "report.json",
            "-v",
        ]))
        .expect("valid args");
        assert_eq!(
            cli,
            CliConfig {
                config_path: PathBuf::from("/etc/sgtier/run.json"),
                log_file: Some(PathBuf::from("/var/log/sgtier.log")),
                report_path: Some(PathBuf::from("report.json")),
                verbose: true,
                probe: false,
            }
        );
    }

    #[test]
    fn config_is_required() {
        assert_eq!(
            parse_args(&args(&["--verbose"])).expect_err("missing config"),
            "--config is required"
        );
    }

    #[test]
    fn option_values_are_required() {
        for flag in ["--config", "--log-file", "--report"] {
            let err = parse_args(&args(&[flag])).expect_err("dangling flag");
            assert_eq!(err, format!("{flag} requires a value"));
        }
    }

    #[test]
    fn unknown_options_are_rejected() {
        assert_eq!(
            parse_args(&args(&["--config", "a.json", "--dry-run"])).expect_err("unknown"),
            "unknown option: --dry-run"
        );
    }

    #[test]
    fn probe_flag() {
        let cli = parse_args(&args(&["--probe", "--config", "a.json"])).expect("probe");
        assert!(cli.probe);
        assert!(!cli.verbose);
    }

    #[test]
    fn help_yields_empty_error() {
        assert_eq!(parse_args(&args(&["-h"])).expect_err("help"), "");
    }

    #[test]
    fn missing_config_file_fails_before_logging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = CliConfig {
            config_path: dir.path().join("absent.json"),
            log_file: None,
            report_path: None,
            verbose: false,
            probe: false,
        };
        let err = run(&cli).expect_err("missing config");
        assert!(matches!(err, SgError::ConfigMissing { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}
