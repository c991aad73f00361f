//! Network Speed Tester - Main CLI Application
//!
//! Runs one download/upload/latency test against a speed test server and
//! optionally keeps watching the server's reachability afterwards.

use clap::Parser;
use network_speed_tester::{
    cli::Cli,
    client::{HttpClient, NetworkClient},
    config::{load_config, validate_config, EnvManager},
    engine::{EngineEvent, LiveGauge, PhaseStateMachine},
    error::{AppError, ErrorReporter, Result},
    logging::LoggerFactory,
    monitor::LiveHealthMonitor,
    output::{format_speed, OutputFormatter, OutputFormatterFactory},
    probe::ProbeSampler,
    Config, PKG_NAME, VERSION,
};
use std::io::Write;
use std::process;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

type SharedFormatter = Arc<dyn OutputFormatter + Send + Sync>;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run_application(cli).await {
        if e.is_cancelled() {
            eprintln!();
            eprintln!("Test cancelled");
        } else {
            reporter.report_error(&e);
            print_error_suggestions(&e);
        }
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    cli.validate().map_err(AppError::config)?;

    if cli.env_help {
        println!("{}", EnvManager::display_env_help());
        return Ok(());
    }
    if let Some(ref path) = cli.write_env_example {
        EnvManager::save_example_env_file(path)?;
        println!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    if cli.debug {
        print_build_info();
    }

    let config = load_config(cli.clone())?;
    colored::control::set_override(config.enable_color);

    for warning in validate_config(&config)? {
        eprintln!("{}", warning.format(config.enable_color));
    }

    let formatter: SharedFormatter = OutputFormatterFactory::from_config(&config).into();
    let logger = LoggerFactory::new(config.clone()).create_logger("nst").await;
    logger.add_context_field("server_id".to_string(), &config.server_id).await;

    let client: Arc<dyn HttpClient> = Arc::new(NetworkClient::new(config.connect_timeout())?);
    let test_config = config.test_config();
    let engine = Arc::new(PhaseStateMachine::new(client.clone(), test_config.clone()).with_logger(&logger));
    let endpoint = config.endpoint();

    let monitor = if cli.monitor {
        let sampler = ProbeSampler::from_config(client, &test_config).with_logger(&logger);
        let monitor = Arc::new(
            LiveHealthMonitor::new(sampler, endpoint.trace_url.clone(), config.health_interval())
                .observing(engine.context()),
        );
        engine.attach_monitor(monitor.clone());
        Some(monitor)
    } else {
        None
    };

    if !config.json {
        println!("{}", formatter.format_header(&format!("Speed test: {}", config.server_name))?);
        println!();
    }

    let printer = tokio::spawn(print_progress(engine.subscribe(), formatter.clone()));

    let mut handle = engine
        .start(endpoint)
        .ok_or_else(|| AppError::internal("a speed test is already running"))?;

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            engine.cancel();
            (&mut handle).await
        }
    };
    let _ = printer.await;
    let result = joined??;

    println!("{}", formatter.format_result(&result, &config.server_name)?);

    if let Some(monitor) = monitor {
        run_monitor(&monitor, &config, formatter.as_ref()).await?;
    }

    Ok(())
}

/// Draw live progress on stderr until the run completes or aborts
async fn print_progress(mut events: broadcast::Receiver<EngineEvent>, formatter: SharedFormatter) {
    let live = formatter.shows_progress();
    let mut stderr = std::io::stderr();

    loop {
        match events.recv().await {
            Ok(EngineEvent::Progress { phase, percent, mbps }) if live => {
                let line = formatter.format_progress(&LiveGauge { phase, percent, mbps });
                let _ = write!(stderr, "\r\x1b[2K{}", line);
                let _ = stderr.flush();
            }
            Ok(EngineEvent::LatencyMeasured(estimate)) if live => {
                if let Ok(line) = formatter.format_latency(&estimate) {
                    eprintln!("{}", line);
                }
            }
            Ok(EngineEvent::ThroughputMeasured { direction, mbps }) if live => {
                let _ = write!(stderr, "\r\x1b[2K");
                eprintln!("{:<9} {}", format!("{}:", direction), format_speed(mbps));
            }
            Ok(EngineEvent::Completed(_)) => {
                if live {
                    eprintln!();
                }
                break;
            }
            Ok(EngineEvent::Aborted { .. }) => {
                if live {
                    let _ = write!(stderr, "\r\x1b[2K");
                    let _ = stderr.flush();
                }
                break;
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

/// Print health readings until Ctrl-C
async fn run_monitor(monitor: &Arc<LiveHealthMonitor>, config: &Config, formatter: &dyn OutputFormatter) -> Result<()> {
    let mut readings = monitor.subscribe();
    monitor.start();

    eprintln!();
    eprintln!(
        "Monitoring {} every {}ms, press Ctrl-C to stop",
        config.trace_url, config.health_interval_ms
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = readings.changed() => {
                if changed.is_err() {
                    break;
                }
                let reading = *readings.borrow_and_update();
                if let Some(reading) = reading {
                    println!("{}", formatter.format_health(&reading)?);
                }
            }
        }
    }

    monitor.stop().await;
    Ok(())
}

fn print_build_info() {
    eprintln!("{} v{}", PKG_NAME, VERSION);
    eprintln!("  Built:  {}", option_env!("BUILD_TIME").unwrap_or("unknown"));
    eprintln!("  Commit: {}", option_env!("GIT_COMMIT").unwrap_or("unknown"));
    eprintln!("  Target: {}", option_env!("TARGET_TRIPLE").unwrap_or("unknown"));
    eprintln!("Debug mode enabled");
    eprintln!();
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Run with --env-help to list supported environment variables");
            eprintln!("  - Check your .env file format");
            eprintln!("  - URLs must start with http:// or https://");
        }
        AppError::Network(_) | AppError::HttpRequest(_) | AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Try another server with --server");
            eprintln!("  - Raise --connect-timeout on slow links");
        }
        AppError::TestExecution(_) => {
            eprintln!();
            eprintln!("Execution troubleshooting:");
            eprintln!("  - Reduce concurrency with --streams");
            eprintln!("  - Run again with --debug for per-stream logs");
        }
        _ => {}
    }
}
