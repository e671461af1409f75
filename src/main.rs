use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use typesense_node::typesense::scoped_key::generate_scoped_search_key;
use typesense_node::{Config, Parameters, Protocol, ResourceRegistry, ResourceType, TypesenseNode, VERSION};

/// Run Typesense node operations from the command line
#[derive(Parser, Debug)]
#[command(name = "typesense-node", version = VERSION, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Typesense host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Typesense port (443 for https, 8108 for http when unset)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Protocol used to reach Typesense
    #[arg(long, global = true, value_enum)]
    protocol: Option<ProtocolArg>,

    /// Admin or scoped API key
    #[arg(long, global = true, env = "TYPESENSE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a batch of items
    Run {
        /// JSON or YAML file holding an array of item parameters
        #[arg(short, long)]
        input: PathBuf,

        /// Write the output records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Turn item failures into {"error": ...} records
        #[arg(long)]
        continue_on_fail: bool,
    },

    /// List the supported resources
    Resources,

    /// Print the node description, or one resource's manifest
    Manifest {
        #[arg(short, long)]
        resource: Option<String>,
    },

    /// Derive a scoped search key locally
    ScopedKey {
        #[arg(long)]
        search_key: String,

        /// Embedded search parameters as a JSON object
        #[arg(long)]
        params: String,
    },

    /// Save the connection flags to the config file
    Configure,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Http,
    Https,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Http => Protocol::Http,
            ProtocolArg::Https => Protocol::Https,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("typesense-node {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("typesense-node").join("typesense-node.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".typesense-node").join("typesense-node.log");
    }
    PathBuf::from("typesense-node.log")
}

/// Config file, then environment, then flags
fn resolve_config(args: &Args) -> Config {
    let flags = Config {
        api_key: args.api_key.clone(),
        host: args.host.clone(),
        port: args.port,
        protocol: args.protocol.map(Protocol::from),
        timeout_seconds: args.timeout,
    };
    Config::load().with_env().merge(flags)
}

/// Items are a JSON array, or YAML when the file says so
fn read_items(path: &Path) -> Result<Vec<Parameters>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {:?}", path))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: Value = if is_yaml {
        serde_yaml::from_str(&content).context("Input is not valid YAML")?
    } else {
        serde_json::from_str(&content).context("Input is not valid JSON")?
    };

    let entries = match value {
        Value::Array(entries) => entries,
        single @ Value::Object(_) => vec![single],
        _ => anyhow::bail!("Input must be an array of item parameter objects"),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            Parameters::from_value(entry).with_context(|| format!("Invalid parameters for item {}", idx))
        })
        .collect()
}

fn print_json(value: &Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("Failed to write output file {:?}", path))?,
        None => println!("{}", text),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let registry = ResourceRegistry::new();

    match &args.command {
        Command::Run {
            input,
            output,
            continue_on_fail,
        } => {
            let items = read_items(input)?;
            let config = resolve_config(&args);
            tracing::debug!("Resolved config: {:?}", config);

            let node = TypesenseNode::new(&registry, config.credentials().as_ref())?;
            let records = node.execute(&items, *continue_on_fail).await?;
            print_json(&Value::Array(records), output.as_deref())?;
        }
        Command::Resources => {
            let names = registry.resource_display_names()?;
            print_json(&Value::Array(names), None)?;
        }
        Command::Manifest { resource } => {
            let description = match resource {
                Some(name) => {
                    let kind = ResourceType::from_str(name)
                        .with_context(|| format!("Unknown resource {:?}", name))?;
                    serde_json::to_value(registry.resource(kind)?.manifest())?
                }
                None => registry.node_description()?,
            };
            print_json(&description, None)?;
        }
        Command::ScopedKey { search_key, params } => {
            let embedded: serde_json::Map<String, Value> = serde_json::from_str(params)
                .context("--params must be a JSON object")?;
            let key = generate_scoped_search_key(search_key, &embedded)?;
            println!("{}", key);
        }
        Command::Configure => {
            let config = resolve_config(&args);
            config.save().context("Failed to save config")?;
            if let Some(path) = Config::config_path() {
                println!("Saved {:?}", path);
            }
        }
    }

    Ok(())
}
