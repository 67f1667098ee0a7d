//! influxql2promql CLI
//!
//! Command-line interface for the translator:
//! - Translate InfluxQL queries into PromQL
//! - Dump the parsed form of a query
//! - Generate a default config file

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use influxql2promql::config::{generate_default_config, Config, LoggingConfig};
use influxql2promql::influxql::parse_statement;
use influxql2promql::translator::{TimeRange, Translator};

#[derive(Parser)]
#[command(name = "influxql2promql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Translate InfluxQL SELECT statements into PromQL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate one or more queries
    Translate {
        /// InfluxQL queries
        queries: Vec<String>,
        /// Also read queries from stdin, one per line
        #[arg(long)]
        stdin: bool,
        /// Evaluate now() at this RFC3339 instant instead of the current time
        #[arg(long)]
        now: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Parse a query and print its syntax tree
    Parse {
        /// InfluxQL query
        query: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct TranslationOutput<'a> {
    query: &'a str,
    promql: &'a str,
    time_range: Option<TimeRange>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), std::io::stderr)?;
    init_logging(&config.logging);
    config.validate()?;

    match cli.command {
        Commands::Translate {
            queries,
            stdin,
            now,
            format,
        } => {
            let now = match now.as_deref() {
                Some(s) => DateTime::parse_from_rfc3339(s)
                    .with_context(|| format!("Invalid --now timestamp: {}", s))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };

            let mut queries = queries;
            if stdin {
                for line in std::io::stdin().lock().lines() {
                    let line = line.context("Failed to read stdin")?;
                    if !line.trim().is_empty() {
                        queries.push(line);
                    }
                }
            }
            if queries.is_empty() {
                anyhow::bail!("No queries given (pass them as arguments or use --stdin)");
            }

            let translator = Translator::new(config.translator_options());
            let mut failed = 0;

            for query in &queries {
                match translator.translate_str_at(query, now) {
                    Ok(translation) => match format {
                        OutputFormat::Text => {
                            println!("{}", translation.query);
                            if let Some(range) = &translation.time_range {
                                println!("  time range: {}", range);
                            }
                        }
                        OutputFormat::Json => {
                            let output = TranslationOutput {
                                query,
                                promql: &translation.query,
                                time_range: translation.time_range,
                            };
                            println!("{}", serde_json::to_string(&output)?);
                        }
                    },
                    Err(e) => {
                        failed += 1;
                        eprintln!("Failed to translate '{}': {}", query, e);
                    }
                }
            }

            if failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Parse { query } => {
            let stmt = parse_statement(&query)?;
            println!("{}", stmt);
            println!();
            println!("{:#?}", stmt);
        }

        Commands::Config { output } => {
            let content = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("influxql2promql={}", default_level)))
}

/// Load the config under a temporary subscriber writing to `writer`; the
/// configured one does not exist until the config is read
fn load_config<W>(path: Option<&Path>, writer: W) -> Result<Config>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(writer)
        .finish();

    tracing::subscriber::with_default(bootstrap, || -> Result<Config> {
        match path {
            Some(path) => Ok(Config::load_with_env(path)?),
            None => Ok(Config::load_default()),
        }
    })
}

/// Log to stderr so stdout carries only translations; `RUST_LOG` wins when set
fn init_logging(config: &LoggingConfig) {
    let filter = env_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_warnings_are_logged() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[translator]\ndefault_window = \"5m\"\n").unwrap();
        std::env::set_var("INFLUXQL2PROMQL_MAX_DEPTH", "bogus");

        let captured = Captured::default();
        let writer = captured.clone();
        let config = load_config(Some(file.path()), move || writer.clone()).unwrap();
        std::env::remove_var("INFLUXQL2PROMQL_MAX_DEPTH");

        assert_eq!(config.translator.default_window, "5m");
        assert_eq!(config.translator.max_depth, 64);
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Ignoring invalid INFLUXQL2PROMQL_MAX_DEPTH: bogus"));
    }

    #[test]
    fn test_missing_config_file_fails() {
        let err = load_config(Some(Path::new("/nonexistent/config.toml")), std::io::sink).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
