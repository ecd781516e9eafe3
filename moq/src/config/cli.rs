use clap::{ColorChoice, Parser, Subcommand};

use crate::config::logging::*;

#[derive(Parser, Debug)]
#[clap(author, version, color = ColorChoice::Always)]
pub struct Opts {
    #[clap(flatten)]
    pub logging_opts: LoggingOpts,

    #[clap(subcommand)]
    pub command: SubCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    /// Run the web server answering with the mocked routes
    Server(crate::server::ServerCommandConfig),
}

#[test]
fn test_parse_server_command() {
    let opts = Opts::try_parse_from([
        "moq",
        "-d",
        "server",
        "--config",
        "demo/moq.toml",
        "--listen",
        "0.0.0.0:8080",
    ])
    .unwrap();

    assert_eq!(1, opts.logging_opts.debug);
    let SubCommands::Server(server) = opts.command;
    assert_eq!(std::path::PathBuf::from("demo/moq.toml"), server.config_file);
    assert_eq!("0.0.0.0:8080", server.listen_address);
}
