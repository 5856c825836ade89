// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bgp::config::{parse_router_id, RouterConfig, DEFAULT_HOLD_TIME};
use bgp::dispatcher::Dispatcher;
use bgp::error::Error;
use clap::Parser;
use slog::info;

#[derive(Parser, Debug)]
#[command(version, about = "Passive BGP route observer", long_about = None)]
struct Cli {
    /// Router id as a dotted quad.
    #[arg(long, default_value = "0.0.0.1")]
    rid: String,

    /// Local autonomous system number.
    #[arg(long, default_value_t = 64512)]
    asn: u32,

    /// TCP listen port.
    #[arg(long, default_value_t = bgp::BGP_PORT)]
    port: u16,

    /// Append log output to this file instead of stdout.
    #[arg(long, default_value = "")]
    log: String,

    /// Do not log a family's updates until its end-of-rib has arrived.
    #[arg(long, default_value_t = false)]
    endofrib: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("bgpwatchd: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let id = parse_router_id(&cli.rid)?;
    let log = if cli.log.is_empty() {
        bgp::log::stdout_logger()
    } else {
        bgp::log::file_logger(&cli.log)?
    };

    let config = RouterConfig {
        id,
        asn: cli.asn,
        port: cli.port,
        hold_time: DEFAULT_HOLD_TIME,
        log_after_eor: cli.endofrib,
    };

    let dispatcher = Dispatcher::new(config, log.clone())?;
    info!(log, "listening on port {}", cli.port);
    dispatcher.run();
    Ok(())
}
