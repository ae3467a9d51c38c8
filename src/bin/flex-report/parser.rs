use clap::{ArgAction, ArgMatches};

use flex_report::cli;
use flex_report::core::GenericResult;
use flex_report::time;

use super::action::Action;

pub struct Parser {
    matches: ArgMatches,
}

pub struct GlobalOptions {
    pub log_level: log::Level,
    pub config_dir: String,
}

const DEFAULT_CONFIG_DIR_PATH: &str = "~/.flex-report";

impl Parser {
    pub fn new() -> Parser {
        let app = cli::new_app("flex-report", "Fetches Interactive Brokers Flex Query reports")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .args([
                cli::new_arg("config", "Configuration directory path")
                    .short('c').long("config")
                    .value_name("PATH")
                    .default_value(DEFAULT_CONFIG_DIR_PATH),

                cli::new_arg("verbose", "Set verbosity level")
                    .short('v').long("verbose")
                    .action(ArgAction::Count),
            ])

            .subcommand(cli::new_subcommand(
                "fetch", "Fetch the report and show account metrics and open positions")
                .long_about("\
                    Requests Flex Query statement generation, waits for the report to become ready \
                    and shows account metrics, portfolio summary and open positions.")
                .args([
                    cli::new_arg("json", "Output the normalized report in JSON format")
                        .long("json")
                        .action(ArgAction::SetTrue),

                    cli::new_arg("watch", "Refetch the report with the specified interval (in $number{s|m|h} format)")
                        .short('w').long("watch")
                        .value_name("DURATION"),
                ]))

            .subcommand(cli::new_subcommand(
                "status", "Check whether Flex Web Service credentials are configured"));

        Parser {
            matches: app.get_matches(),
        }
    }

    pub fn global(&self) -> GenericResult<GlobalOptions> {
        let log_level = match self.matches.get_count("verbose") {
            0 => log::Level::Info,
            1 => log::Level::Debug,
            2 => log::Level::Trace,
            _ => return Err("Invalid verbosity level".into()),
        };

        let config_dir = self.matches.get_one::<String>("config").cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_DIR_PATH.to_owned());

        Ok(GlobalOptions {log_level, config_dir})
    }

    pub fn action(&self) -> GenericResult<Action> {
        let Some((command, matches)) = self.matches.subcommand() else {
            return Err("Command is not specified".into());
        };

        Ok(match command {
            "fetch" => Action::Fetch {
                json: matches.get_flag("json"),
                watch: matches.get_one::<String>("watch").map(|interval| {
                    time::parse_duration(interval).map_err(|_| format!(
                        "Invalid watch interval: {interval:?}"))
                }).transpose()?,
            },
            "status" => Action::Status,
            _ => return Err(format!("Unsupported command: {command:?}").into()),
        })
    }
}
