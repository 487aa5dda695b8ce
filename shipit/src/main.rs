//! shipit - Entry Point
//!
//! Deploys a repository's containerized app to one remote host, behind nginx.

use std::collections::HashMap;
use std::env;

use colored::Colorize;
use is_terminal::IsTerminal;
use secrecy::SecretString;

use shipit::app::config::{ConfigResolver, DefaultsPrompter, Prompter, ACCESS_TOKEN_ENV};
use shipit::app::prompt::TerminalPrompter;
use shipit::app::run::{run, RunOptions};
use shipit::errors::GENERIC_FAILURE;
use shipit::filesys::dir::Dir;
use shipit::logs::{init_logging, LogLevel, LogOptions, RunLog};
use shipit::process::ProcessRunner;
use shipit::storage::layout::StorageLayout;
use shipit::storage::settings::{expand_home, Settings};
use shipit::utils::version_info;

#[tokio::main]
async fn main() {
    let code = run_cli().await;
    std::process::exit(code);
}

fn parse_args() -> HashMap<String, String> {
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // --key=value
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else {
            // --flag, or a bare word such as `cleanup`
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    cli_args
}

async fn run_cli() -> i32 {
    let cli_args = parse_args();

    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return 0;
    }

    let layout = StorageLayout::default();
    let settings_file = layout.settings_file();
    let (settings, settings_error) = match Settings::load(&settings_file).await {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    let log_level = match cli_args.get("log-level") {
        Some(level) => level.parse::<LogLevel>().unwrap_or_else(|e| {
            eprintln!("{}; using {}", e, settings.log_level.to_filter_string());
            settings.log_level.clone()
        }),
        None => settings.log_level.clone(),
    };
    let log_options = LogOptions {
        log_level,
        json_format: cli_args.contains_key("log-json"),
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = layout.setup().await {
        eprintln!("{} {}", "[ERROR]".red().bold(), e);
        return GENERIC_FAILURE;
    }
    let log = match RunLog::create(layout.logs_dir().path()) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("{} Unable to create run log: {}", "[ERROR]".red().bold(), e);
            return GENERIC_FAILURE;
        }
    };
    log.info(format!("shipit {} ({})", version.version, version.git_hash));
    // Reported only now that logging is up
    if let Some(e) = settings_error {
        log.warn(format!(
            "Ignoring unreadable settings file {}: {}",
            settings_file.path().display(),
            e
        ));
    }

    let interactive = !cli_args.contains_key("defaults") && std::io::stdin().is_terminal();
    let prompter: Box<dyn Prompter> = if interactive {
        Box::new(TerminalPrompter::new())
    } else {
        log.info("Non-interactive run, using defaults");
        Box::new(DefaultsPrompter)
    };

    let env_token = env::var(ACCESS_TOKEN_ENV).ok().map(SecretString::from);
    let config = ConfigResolver::new(&settings.defaults)
        .with_env_token(env_token)
        .resolve(prompter.as_ref(), &log);

    let working_copy = match cli_args.get("workdir") {
        Some(dir) => Dir::new(expand_home(dir)),
        None => layout.workspace_dir().subdir(&config.repo_name()),
    };
    let options = RunOptions {
        working_copy,
        cleanup: cli_args.contains_key("cleanup"),
    };

    let runner = ProcessRunner::new();
    let result = run(&config, &options, &runner, &log).await;

    let log_path = log.path().to_path_buf();
    let code = match &result {
        Ok(report) => {
            println!();
            println!(
                "{} Deployment successful! Access your app at {}",
                "[SUCCESS]".green().bold(),
                report.validation.url
            );
            if !report.validation.probe_ok {
                println!(
                    "{} The HTTP probe did not succeed; check {}",
                    "[WARN]".yellow().bold(),
                    log_path.display()
                );
            }
            if report.cleaned_up {
                println!("{} Deployment removed from the host", "[CLEANUP]".cyan().bold());
            }
            0
        }
        // The pipeline already logged the failing stage and the log path
        Err(e) => e.exit_code(),
    };

    if let Err(e) = log.finish(settings.log_retention) {
        eprintln!("Failed to prune old logs: {e}");
    }
    code
}
