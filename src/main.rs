use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use movie_search::config::ClientConfig;
use movie_search::logging;
use movie_search::model::{
    probe_address, ConnectivityMonitor, OmdbClient, ProbeConnectivity, ReqwestExchange,
    RetryingTransport, WatchConnectivity, PROBE_INTERVAL,
};
use movie_search::{MovieKind, SearchController, UiState};

const HELP: &str = "commands: title <text> | year <text> | type <movie|series|episode|game|all> | more | reset | online | offline | quit";

/// Where connectivity comes from: typed by the user, or probed
enum Network {
    Manual(Arc<WatchConnectivity>),
    Probed(CancellationToken),
}

#[tokio::main]
async fn main() -> Result<()> {
    // dropping the guard at the end of main flushes buffered log lines
    let _log_guard = match logging::init_logging(&logging::log_dir()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {e:#}");
            None
        }
    };

    tracing::info!("=== Movie Search Starting ===");

    let config = ClientConfig::from_env().context("failed to load configuration")?;

    let exchange = ReqwestExchange::new(config.request_timeout)?;
    let transport = RetryingTransport::new(exchange, config.api_key.clone(), config.retry_policy());
    let backend = Arc::new(OmdbClient::new(config.base_url.clone(), transport));

    let probe = std::env::args().any(|arg| arg == "--probe");
    let (network, monitor): (Network, Arc<dyn ConnectivityMonitor>) = if probe {
        let addr = probe_address(&config.base_url)
            .with_context(|| format!("cannot probe base url {}", config.base_url))?;
        let cancel = CancellationToken::new();
        let monitor = ProbeConnectivity::spawn(addr, PROBE_INTERVAL, cancel.clone());
        (Network::Probed(cancel), Arc::new(monitor))
    } else {
        let monitor = Arc::new(WatchConnectivity::new(true));
        (Network::Manual(monitor.clone()), monitor)
    };

    let controller = SearchController::spawn(&config, backend, monitor);
    let printer = tokio::spawn(print_updates(controller.clone()));

    println!("{HELP}");
    let res = run_prompt(&controller, &network).await;

    controller.shutdown();
    if let Network::Probed(cancel) = &network {
        cancel.cancel();
    }
    printer.abort();

    if let Err(err) = &res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("Movie Search shutting down");
    res
}

async fn run_prompt(controller: &SearchController, network: &Network) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => {}
            "title" => controller.on_title_change(arg),
            "year" => controller.on_year_change(arg),
            "type" => match arg.trim() {
                "all" | "" => controller.on_type_change(None),
                kind => match kind.parse::<MovieKind>() {
                    Ok(kind) => controller.on_type_change(Some(kind)),
                    Err(e) => println!("{e}"),
                },
            },
            "more" => controller.load_more(),
            "reset" => controller.reset(),
            "online" | "offline" => match network {
                Network::Manual(monitor) => monitor.set_connected(command == "online"),
                Network::Probed(_) => println!("connectivity is probed, {command} ignored"),
            },
            "quit" | "exit" => break,
            _ => println!("{HELP}"),
        }
    }

    Ok(())
}

async fn print_updates(controller: SearchController) {
    let mut states = controller.subscribe_ui();
    let mut connectivity = controller.subscribe_connectivity();

    loop {
        tokio::select! {
            Some(state) = states.next_value() => print_state(&state),
            Some(connected) = connectivity.next_value() => {
                println!("[{}]", if connected { "online" } else { "offline" });
            }
            else => break,
        }
    }
}

fn print_state(state: &UiState) {
    match state {
        UiState::Error(message) => println!("error: {message}"),
        UiState::Success(result) => {
            let Some(query) = &result.query else {
                println!("(no search)");
                return;
            };
            println!(
                "{} of {} results for \"{}\"",
                result.items.len(),
                result.total_count,
                query.title
            );
            for item in &result.items {
                println!(
                    "  {} ({}) [{}] {}",
                    item.title,
                    item.year,
                    item.kind.label(),
                    item.poster().unwrap_or("no poster")
                );
            }
        }
    }
}
