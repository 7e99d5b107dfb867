// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Sieppari launcher
//!
//! Starts any subset of the three listeners (proxy, dashboard, callback)
//! inside one process and shuts them down together on Ctrl-C.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tokio::sync::oneshot;

use sieppari::{api, proxy, AppState, ProxyConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sieppari=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "run" => run(&args[2..]).await,
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("sieppari {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Sieppari - Intercepting HTTP Proxy for Security Testing

USAGE:
    sieppari <COMMAND> [OPTIONS]

COMMANDS:
    run             Start the proxy, dashboard and callback listeners
    help            Show this help message
    version         Show version information

RUN OPTIONS:
    --proxy                 Start the proxy listener
    --dashboard             Start the dashboard listener
    --callback              Start the callback listener
                            (no component flag means start all three)
    --proxy-port <N>        Proxy listener port      (default 8080)
    --dashboard-port <N>    Dashboard listener port  (default 6000)
    --callback-port <N>     Callback listener port   (default 5000)
    --log-dir <PATH>        State and log directory  (default logs)
    --set <KEY=VALUE>       Override a config key (dashboard_url,
                            callback_base); repeatable

EXAMPLES:
    sieppari run
    sieppari run --proxy --proxy-port 8081
    sieppari run --set callback_base=http://10.0.0.5:5000/callback

For more information, see: https://github.com/bountyyfi/sieppari
"#
    );
}

#[derive(Debug)]
struct RunOptions {
    proxy: bool,
    dashboard: bool,
    callback: bool,
    proxy_port: Option<u16>,
    dashboard_port: Option<u16>,
    callback_port: Option<u16>,
    log_dir: PathBuf,
    overrides: HashMap<String, String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            proxy: false,
            dashboard: false,
            callback: false,
            proxy_port: None,
            dashboard_port: None,
            callback_port: None,
            log_dir: PathBuf::from("logs"),
            overrides: HashMap::new(),
        }
    }
}

fn parse_run_options(args: &[String]) -> Result<RunOptions, String> {
    let mut opts = RunOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--proxy" => opts.proxy = true,
            "--dashboard" => opts.dashboard = true,
            "--callback" => opts.callback = true,
            "--proxy-port" => opts.proxy_port = Some(parse_port(iter.next(), arg)?),
            "--dashboard-port" => opts.dashboard_port = Some(parse_port(iter.next(), arg)?),
            "--callback-port" => opts.callback_port = Some(parse_port(iter.next(), arg)?),
            "--log-dir" => {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("{} expects a path", arg))?;
                opts.log_dir = PathBuf::from(value);
            }
            "--set" => {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("{} expects key=value", arg))?;
                let (key, value) = value
                    .split_once('=')
                    .ok_or_else(|| format!("{} expects key=value, got {:?}", arg, value))?;
                opts.overrides
                    .insert(key.to_string(), value.to_string());
            }
            other => return Err(format!("unknown option: {}", other)),
        }
    }

    // no component flags means all components
    if !(opts.proxy || opts.dashboard || opts.callback) {
        opts.proxy = true;
        opts.dashboard = true;
        opts.callback = true;
    }
    Ok(opts)
}

fn parse_port(value: Option<&String>, flag: &str) -> Result<u16, String> {
    let value = value.ok_or_else(|| format!("{} expects a port number", flag))?;
    value
        .parse()
        .map_err(|_| format!("{} expects a port number, got {:?}", flag, value))
}

async fn run(args: &[String]) -> ExitCode {
    let opts = match parse_run_options(args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            return ExitCode::from(1);
        }
    };

    let mut config = ProxyConfig::resolve(&opts.log_dir, &opts.overrides);
    if let Some(port) = opts.proxy_port {
        config = config.proxy_port(port);
    }
    if let Some(port) = opts.dashboard_port {
        config = config.dashboard_port(port);
    }
    if let Some(port) = opts.callback_port {
        config = config.callback_port(port);
    }

    tracing::info!(
        "dashboard_url={} callback_base={}",
        config.dashboard_url,
        config.callback_base
    );

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to initialize: {}", e);
            return ExitCode::from(1);
        }
    };

    let _purge = state
        .broker
        .spawn_purge(Duration::from_secs(30), Duration::from_secs(120));

    let mut shutdowns = Vec::new();
    let mut servers = Vec::new();

    if opts.proxy {
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        servers.push(tokio::spawn(proxy::start_proxy(state.clone(), rx)));
    }
    if opts.dashboard {
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        servers.push(tokio::spawn(api::start_dashboard(state.clone(), rx)));
    }
    if opts.callback {
        let (tx, rx) = oneshot::channel();
        shutdowns.push(tx);
        servers.push(tokio::spawn(api::start_callback(state.clone(), rx)));
    }

    let all_servers = futures::future::join_all(servers);
    tokio::pin!(all_servers);

    let mut finished = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, stopping listeners");
            for tx in shutdowns {
                let _ = tx.send(());
            }
        }
        results = &mut all_servers => finished = Some(results),
    };

    // after a shutdown signal, wait for the listeners to drain
    let results = match finished {
        Some(results) => results,
        None => all_servers.await,
    };

    let mut failed = false;
    for result in results {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                eprintln!("Listener error: {:#}", e);
                failed = true;
            }
            Err(e) => {
                eprintln!("Listener task panicked: {}", e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
