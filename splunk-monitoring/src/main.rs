//! splunk-monitoring - send metrics and errors to Splunk from the command line
//!
//! This tool provides commands for:
//! - Checking the collector configuration
//! - Logging metrics, errors and GraphQL failures
//! - Running a demo component behind an error boundary
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/splunk-monitoring/config.toml (~/.config/splunk-monitoring/config.toml)

mod demo;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use splunk_monitoring_core::config::LoggingConfig;
use splunk_monitoring_core::{
    Config, ErrorLog, EventData, FieldValue, GraphQlError, GraphQlErrorEntry, GraphQlErrorLog,
    GraphQlOperation, HecTransport, MemoryTransport, MetricLog, MonitoringClient,
    MonitoringConfig, Transport,
};

#[derive(Parser)]
#[command(name = "splunk-monitoring")]
#[command(about = "Send metrics and errors to a Splunk HTTP Event Collector")]
#[command(version)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print events as JSON instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show collector configuration and status
    Status,

    #[command(flatten)]
    Log(LogCommand),
}

#[derive(Subcommand)]
enum LogCommand {
    /// Log a metric
    Metric {
        /// Metric name
        name: String,

        /// Metric data as key=value (repeatable)
        #[arg(short, long, value_parser = parse_field)]
        data: Vec<(String, FieldValue)>,

        /// Extra fields as key=value, overriding data (repeatable)
        #[arg(short, long, value_parser = parse_field)]
        extra: Vec<(String, FieldValue)>,

        /// Percentage of calls that are sent (0-100)
        #[arg(short, long, allow_negative_numbers = true)]
        log_rate: Option<f64>,
    },

    /// Log an application error
    Error {
        /// Error message
        message: String,

        /// Component or call site that failed
        #[arg(short, long)]
        instance: Option<String>,

        /// Extra fields as key=value (repeatable)
        #[arg(short, long, value_parser = parse_field)]
        extra: Vec<(String, FieldValue)>,
    },

    /// Log a failed GraphQL query or mutation
    GraphqlError {
        /// Error message reported by the server
        message: String,

        /// Operation name
        #[arg(short, long)]
        instance: String,

        /// The failed operation was a mutation
        #[arg(short, long)]
        mutation: bool,

        /// Operation variables as JSON
        #[arg(long)]
        variables: Option<String>,
    },

    /// Render a component that explodes, behind an error boundary
    Demo {
        /// Delay of the simulated user lookup used for enrichment
        #[arg(long, default_value_t = 2000)]
        delay_ms: u64,
    },
}

/// Error built from a message given on the command line.
#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CliError {}

/// Parse `key=value`, reading numbers and booleans where possible
fn parse_field(raw: &str) -> std::result::Result<(String, FieldValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))?;

    if key.is_empty() {
        return Err(format!("empty key in {:?}", raw));
    }

    let value = if let Some(number) = value.parse::<f64>().ok().filter(|n| n.is_finite()) {
        FieldValue::Number(number)
    } else if let Ok(flag) = value.parse::<bool>() {
        FieldValue::Bool(flag)
    } else {
        FieldValue::from(value)
    };

    Ok((key.to_string(), value))
}

fn to_event_data(fields: Vec<(String, FieldValue)>) -> Option<EventData> {
    if fields.is_empty() {
        None
    } else {
        Some(fields.into_iter().collect())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    let logging = LoggingConfig {
        level: if args.verbose {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        },
    };

    let command = match args.command {
        Command::Status => {
            splunk_monitoring_core::logging::init_stderr(&logging);
            return cmd_status(&config);
        }
        Command::Log(command) => command,
    };

    if args.dry_run {
        splunk_monitoring_core::logging::init_stderr(&logging);
        let client: Arc<MonitoringClient<MemoryTransport>> =
            Arc::new(MonitoringClient::new(dry_run_config(&config)));
        let result = run(&client, command).await;

        if let Some(transport) = client.transport() {
            for event in transport.events() {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        return result;
    }

    let _log_guard = splunk_monitoring_core::logging::init(&logging)
        .context("failed to initialize logging")?;

    let monitoring = config
        .monitoring()
        .context("Splunk is not configured. Run 'status' for details.")?;
    let client: Arc<MonitoringClient<HecTransport>> = Arc::new(MonitoringClient::new(monitoring));
    let result = run(&client, command).await;

    if let Some(transport) = client.transport() {
        transport.flush().await;
        tracing::info!(
            sent = transport.sent_count(),
            failed = transport.failed_count(),
            "Flushed events"
        );
        if transport.failed_count() > 0 {
            eprintln!(
                "{} event(s) could not be delivered to {}. See {} for details.",
                transport.failed_count(),
                transport.url(),
                splunk_monitoring_core::logging::log_file_path().display()
            );
        }
    }

    result
}

/// Dry runs need no credentials; fill in placeholders when they are missing.
fn dry_run_config(config: &Config) -> MonitoringConfig {
    config.monitoring().unwrap_or_else(|_| {
        let mut monitoring = MonitoringConfig::new("dry-run", "http://localhost:8088")
            .inject_additional_info(config.splunk.inject_additional_info)
            .with_options(config.splunk.options.clone());
        monitoring.context = config.context.clone();
        monitoring
    })
}

async fn run<T: Transport + 'static>(
    client: &Arc<MonitoringClient<T>>,
    command: LogCommand,
) -> Result<()> {
    match command {
        LogCommand::Metric {
            name,
            data,
            extra,
            log_rate,
        } => {
            let mut metric = MetricLog::new(name.clone());
            metric.data = to_event_data(data);
            metric.extra = to_event_data(extra);
            metric.log_rate = log_rate;

            match client.log_metric(metric) {
                Some(_) => println!("Metric '{}' logged", name),
                None => println!("Metric '{}' not sent", name),
            }
            Ok(())
        }

        LogCommand::Error {
            message,
            instance,
            extra,
        } => {
            let error = CliError(message);
            let mut log = ErrorLog::new(&error);
            log.instance = instance;
            log.args.extra = to_event_data(extra);

            match client.log_error(log).await? {
                Some(_) => println!("Error logged"),
                None => println!("Error not sent"),
            }
            Ok(())
        }

        LogCommand::GraphqlError {
            message,
            instance,
            mutation,
            variables,
        } => {
            let error = GraphQlError::from_entries(vec![GraphQlErrorEntry {
                message,
                path: Vec::new(),
                extensions: None,
            }]);
            let kind = if mutation {
                GraphQlOperation::Mutation
            } else {
                GraphQlOperation::Query
            };

            let mut log = GraphQlErrorLog::new(&error, instance, kind);
            if let Some(variables) = variables {
                let variables: serde_json::Value =
                    serde_json::from_str(&variables).context("--variables must be valid JSON")?;
                log = log.variables(variables);
            }

            match client.log_graphql_error(log) {
                Some(_) => println!("GraphQL error logged"),
                None => println!("GraphQL error not sent"),
            }
            Ok(())
        }

        LogCommand::Demo { delay_ms } => demo::run(Arc::clone(client), delay_ms).await,
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Splunk Monitoring Configuration");
    println!("===============================");
    println!();

    let splunk = &config.splunk;

    println!(
        "Endpoint:        {}",
        splunk.endpoint.as_deref().unwrap_or("<not set>")
    );
    let token_set = splunk.token.as_deref().is_some_and(|t| !t.is_empty());
    println!(
        "Token:           {}",
        if token_set {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!("Path:            {}", splunk.options.path);
    println!("Sourcetype:      {}", splunk.options.sourcetype);
    println!(
        "Index:           {}",
        splunk.options.index.as_deref().unwrap_or("<token default>")
    );
    println!("Additional Info: {}", splunk.inject_additional_info);
    println!("Timeout:         {}s", splunk.options.timeout_secs);

    println!();
    match &config.context {
        Some(context) => {
            println!("Account:         {}", context.runtime_info.account);
            println!("Workspace:       {}", context.runtime_info.workspace);
            println!(
                "App:             {}@{}",
                context.app_info.app_id, context.app_info.app_version
            );
        }
        None => println!("Context:         <not set, placeholder will be used>"),
    }

    println!();
    if splunk.is_ready() {
        println!("Status: Ready to send");
    } else {
        println!("Status: Not ready (missing token or endpoint)");
        println!();
        println!("Configure it in {}:", Config::config_path().display());
        println!();
        println!("  [splunk]");
        println!("  endpoint = \"https://splunk.example.com:8088\"");
        println!("  token = \"00000000-0000-0000-0000-000000000000\"");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_types() {
        assert_eq!(
            parse_field("items=3").unwrap(),
            ("items".to_string(), FieldValue::Number(3.0))
        );
        assert_eq!(
            parse_field("vip=true").unwrap(),
            ("vip".to_string(), FieldValue::Bool(true))
        );
        assert_eq!(
            parse_field("path=/cart?x=1").unwrap(),
            ("path".to_string(), FieldValue::from("/cart?x=1"))
        );
    }

    #[test]
    fn test_parse_field_keeps_non_finite_as_text() {
        assert_eq!(
            parse_field("x=NaN").unwrap(),
            ("x".to_string(), FieldValue::from("NaN"))
        );
        assert_eq!(
            parse_field("x=inf").unwrap(),
            ("x".to_string(), FieldValue::from("inf"))
        );
        assert_eq!(
            parse_field("x=-1.5").unwrap(),
            ("x".to_string(), FieldValue::Number(-1.5))
        );
    }

    #[test]
    fn test_parse_field_rejects_malformed() {
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=value").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "splunk-monitoring",
            "--dry-run",
            "metric",
            "checkout",
            "--data",
            "items=3",
            "--log-rate",
            "50",
        ])
        .unwrap();

        assert!(args.dry_run);
        match args.command {
            Command::Log(LogCommand::Metric {
                name, log_rate, ..
            }) => {
                assert_eq!(name, "checkout");
                assert_eq!(log_rate, Some(50.0));
            }
            _ => panic!("expected metric command"),
        }
    }
}
