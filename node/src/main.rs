use node::{cli, Config, Daemon};
use tracing::{error, info};

fn main() {
    let args = cli::parse_args();
    init_logging(&args);

    let mut config = if let Some(network) = &args.network {
        Config::for_network(network).unwrap_or_else(|_| Config::default())
    } else if let Some(config_path) = &args.config_path {
        Config::load(config_path).unwrap_or_else(|_| Config::default())
    } else {
        Config::default()
    };
    config.apply_cli_overrides(&args);

    info!(network = %config.network.network_id, data_dir = ?config.storage.data_dir, "starting node");

    match Daemon::new(config) {
        Ok(_daemon) => {
            info!("store opened and genesis parameters in place; no network/RPC/mining collaborator wired in this core");
        }
        Err(e) => {
            error!("failed to initialize daemon: {e}");
            std::process::exit(1);
        }
    }
}

fn init_logging(args: &cli::Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(true).init();
}
