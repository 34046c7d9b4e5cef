use anyhow::{Context, Result, bail};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use duosida_direct::config::Config;
use duosida_direct::logging::{get_logger, init_logging};
use duosida_direct::session::{ChargerSession, MonitorOptions};
use duosida_direct::{ChargerStatus, discover_chargers};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(
    name = "duosida",
    version = env!("APP_VERSION"),
    about = "Direct control tool for Duosida EV chargers"
)]
struct Cli {
    /// YAML configuration file; defaults to the first of the standard locations
    #[arg(long, short, env = "DUOSIDA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Charger IP address or host name
    #[arg(long, env = "DUOSIDA_HOST", global = true)]
    host: Option<String>,

    /// Charger TCP port
    #[arg(long, env = "DUOSIDA_PORT", global = true)]
    port: Option<u16>,

    /// Charger device id
    #[arg(long, env = "DUOSIDA_DEVICE_ID", global = true)]
    device_id: Option<String>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Discover chargers on the local network
    Discover {
        /// Listen time in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the charger status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the maximum charging current (6-32 A)
    SetCurrent { amps: u32 },
    /// Write a raw vendor configuration key
    SetConfig { key: String, value: String },
    /// Set the connection timeout (30-900 s)
    SetTimeout { seconds: u32 },
    /// Set the maximum temperature (85-95 C)
    SetMaxTemp { celsius: u32 },
    /// Set the maximum voltage (265-290 V)
    SetMaxVoltage { volts: u32 },
    /// Set the minimum voltage (70-110 V)
    SetMinVoltage { volts: u32 },
    /// Enable or disable direct work mode
    SetDirectMode {
        #[arg(value_parser = BoolishValueParser::new())]
        enabled: bool,
    },
    /// Set the LED brightness (0 off, 1 low, 3 high)
    SetLed { level: u8 },
    /// Enable or disable stopping when the vehicle disconnects
    SetStopOnDisconnect {
        #[arg(value_parser = BoolishValueParser::new())]
        enabled: bool,
    },
    /// Start charging
    Start,
    /// Stop charging
    Stop {
        /// Session id to stop; defaults to one derived from the clock
        #[arg(long)]
        session_id: Option<u32>,
    },
    /// Poll the status until interrupted
    Monitor {
        /// Poll interval in seconds; defaults to the configured interval
        #[arg(long, value_parser = parse_seconds)]
        interval: Option<Duration>,
        /// Stop after this many seconds
        #[arg(long, value_parser = parse_seconds)]
        duration: Option<Duration>,
        /// Print each status as one JSON line
        #[arg(long)]
        json: bool,
    },
}

fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if secs <= 0.0 {
        return Err("must be a positive number of seconds".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::Discover { timeout, json } => discover(Duration::from_secs(timeout), json).await,
        Command::Monitor {
            interval,
            duration,
            json,
        } => {
            let options = MonitorOptions {
                interval: interval.unwrap_or(config.polling.interval()),
                duration,
                retries: config.polling.retries,
                use_cache: config.polling.use_cache,
            };
            monitor(config, options, json).await
        }
        command => {
            tokio::task::spawn_blocking(move || run_command(&config, command))
                .await
                .context("Charger task panicked")?
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_from(cli.config.as_deref())?;
    if let Some(host) = &cli.host {
        config.charger.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.charger.port = port;
    }
    if let Some(device_id) = &cli.device_id {
        config.charger.device_id.clone_from(device_id);
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    config.validate()?;
    Ok(config)
}

async fn discover(timeout: Duration, json: bool) -> Result<bool> {
    if !json {
        println!("Discovering Duosida chargers (timeout: {}s)...\n", timeout.as_secs());
    }
    let chargers = discover_chargers(timeout).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chargers)?);
        return Ok(!chargers.is_empty());
    }

    if chargers.is_empty() {
        println!("No devices found.");
        println!("\nPossible reasons:");
        println!("  - No Duosida chargers on this network");
        println!("  - Charger is on a different subnet");
        println!("  - Firewall blocking UDP port 48899");
        return Ok(false);
    }

    println!("Found {} device(s):\n", chargers.len());
    for (i, charger) in chargers.iter().enumerate() {
        println!("  {}. {}", i + 1, charger.ip);
        if !charger.device_id.is_empty() {
            println!("     Device ID: {}", charger.device_id);
        }
        println!("     MAC: {}", charger.mac);
        println!("     Type: {}", charger.kind);
        if !charger.firmware.is_empty() {
            println!("     Firmware: {}", charger.firmware);
        }
        println!();
    }
    Ok(true)
}

fn connect(config: &Config) -> Result<ChargerSession> {
    if config.charger.device_id.trim().is_empty() {
        bail!("A device id is required (--device-id or charger.device_id)");
    }
    let mut session = ChargerSession::from_config(config);
    session.try_connect().with_context(|| {
        format!(
            "Could not connect to {}:{}",
            config.charger.host, config.charger.port
        )
    })?;
    Ok(session)
}

fn print_status(status: &ChargerStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&status.snapshot())?);
    } else {
        println!("{}", status);
    }
    Ok(())
}

fn run_command(config: &Config, command: Command) -> Result<bool> {
    let mut session = connect(config)?;
    let retries = config.polling.retries;
    let use_cache = config.polling.use_cache;

    let ok = match command {
        Command::Status { json } => match session.get_status(retries, use_cache)? {
            Some(status) => {
                print_status(&status, json)?;
                true
            }
            None => {
                eprintln!("No status received from charger");
                false
            }
        },
        Command::SetCurrent { amps } => {
            let ok = session.set_max_current(amps);
            if ok {
                println!("Max current set to {} A", amps);
                std::thread::sleep(Duration::from_secs(1));
                if let Ok(Some(status)) = session.get_status(retries, use_cache) {
                    println!("\nNew status:");
                    print_status(&status, false)?;
                }
            }
            ok
        }
        Command::SetConfig { key, value } => session.set_config(&key, &value),
        Command::SetTimeout { seconds } => session.set_connection_timeout(seconds),
        Command::SetMaxTemp { celsius } => session.set_max_temperature(celsius),
        Command::SetMaxVoltage { volts } => session.set_max_voltage(volts),
        Command::SetMinVoltage { volts } => session.set_min_voltage(volts),
        Command::SetDirectMode { enabled } => session.set_direct_work_mode(enabled),
        Command::SetLed { level } => session.set_led_brightness(level),
        Command::SetStopOnDisconnect { enabled } => session.set_stop_on_disconnect(enabled),
        Command::Start => session.start_charging(),
        Command::Stop { session_id } => session.stop_charging(session_id),
        Command::Discover { .. } | Command::Monitor { .. } => {
            bail!("Command does not use a charger session")
        }
    };

    if !ok {
        eprintln!("Command failed, see log for details");
    }
    session.disconnect();
    Ok(ok)
}

async fn monitor(config: Config, options: MonitorOptions, json: bool) -> Result<bool> {
    let logger = get_logger("cli");
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut session = connect(&config)?;
        if !json {
            println!("Monitoring charger (Ctrl+C to stop)...");
        }
        let mut print = |status: &ChargerStatus| {
            let printed = if json {
                serde_json::to_string(&status.snapshot())
                    .map(|line| println!("{}", line))
                    .map_err(anyhow::Error::from)
            } else {
                print_status(status, false)
            };
            if let Err(e) = printed {
                eprintln!("Failed to print status: {}", e);
            }
        };
        let summary = session.monitor(&options, &cancel_rx, Some(&mut print));
        session.disconnect();
        Ok(summary)
    })
    .await
    .context("Monitor task panicked")??;

    logger.info(&format!(
        "Monitor finished: {} ticks, {} updates, {} errors",
        summary.ticks, summary.updates, summary.errors
    ));
    Ok(true)
}
