mod action;
mod parser;

use std::io::{self, Write};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use log::{error, info};

use flex_report::config::Config;
use flex_report::core::{EmptyResult, GenericError};
use flex_report::flex::{self, FlexError};
use flex_report::report;

use self::action::Action;
use self::parser::Parser;

fn main() -> ExitCode {
    let parser = Parser::new();

    let global = match parser.global() {
        Ok(global) => global,
        Err(err) => {
            let _ = writeln!(io::stderr(), "{err}.");
            return ExitCode::FAILURE;
        },
    };

    if let Err(err) = easy_logging::init(module_path!(), global.log_level) {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {err}.");
        return ExitCode::FAILURE;
    }

    if let Err(err) = run(&global.config_dir, &parser) {
        let message = err.to_string();

        if message.contains('\n') {
            error!("{err}");
        } else {
            error!("{err}.");
        }

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(config_dir: &str, parser: &Parser) -> EmptyResult {
    let config = Config::new(config_dir)?;

    match parser.action()? {
        Action::Fetch {json, watch: None} => fetch(&config, json)?,
        Action::Fetch {json, watch: Some(interval)} => watch(&config, json, interval),
        Action::Status => {
            let connectivity = config.flex.connectivity();
            println!("{}", serde_json::to_string(&connectivity)?);
        },
    }

    Ok(())
}

fn fetch(config: &Config, json: bool) -> EmptyResult {
    let records = config.flex.credentials()
        .and_then(|credentials| flex::fetch_report(&config.flex, &credentials))
        .map_err(describe_error)?;

    if json {
        report::print_json(&records)?;
    } else {
        report::print(&records);
    }

    Ok(())
}

fn describe_error(err: FlexError) -> GenericError {
    format!("{err} ({})", err.kind()).into()
}

// Runs are strictly sequential: the next one is scheduled only after the previous one completes
fn watch(config: &Config, json: bool, interval: Duration) {
    loop {
        if let Err(err) = fetch(config, json) {
            error!("Failed to fetch the report: {err}.");
        }

        info!("Next fetch in {interval:?}.");
        thread::sleep(interval);
    }
}
