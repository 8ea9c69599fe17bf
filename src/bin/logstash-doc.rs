//! logstash-doc CLI - serialize NDJSON events into LogStash-style documents
//!
//! Reads one event per line (`{"body": "...", "headers": {...}}`) and writes
//! one index request (or bare document) per line.

use clap::Parser;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use logstash_doc::config::{context_from_yaml_str, env_context};
use logstash_doc::{Event, IndexRequestFactory, SerializerConfig};

#[derive(Parser)]
#[command(name = "logstash-doc")]
#[command(version, about = "Serialize pipeline events into LogStash-style documents", long_about = None)]
struct Cli {
    /// NDJSON event file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// YAML file with serializer settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a setting, e.g. `--set collateObjects=true` (repeatable)
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    settings: Vec<String>,

    /// Index name prefix
    #[arg(long, default_value = "flume")]
    index_prefix: String,

    /// Document type
    #[arg(long, default_value = "log")]
    index_type: String,

    /// Print only the serialized documents
    #[arg(short, long)]
    documents_only: bool,
}

/// Settings precedence: `--set` > config file > environment
fn load_context(cli: &Cli) -> Result<HashMap<String, String>, String> {
    let mut context = env_context();

    if let Some(path) = &cli.config {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        let file_context = context_from_yaml_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;
        context.extend(file_context);
    }

    for setting in &cli.settings {
        let (key, value) = setting
            .split_once('=')
            .ok_or_else(|| format!("Invalid setting '{}', expected KEY=VALUE", setting))?;
        context.insert(key.trim().to_string(), value.to_string());
    }

    Ok(context)
}

fn run(cli: Cli) -> Result<usize, String> {
    let context = load_context(&cli)?;
    let factory = IndexRequestFactory::new(SerializerConfig::from_context(&context));
    tracing::debug!("Serializer configuration: {:?}", factory.serializer().config());

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let mut failures = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Failed to read input: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Skipping line {}: invalid event: {}", index + 1, e);
                failures += 1;
                continue;
            }
        };

        let request = match factory.prepare(&cli.index_prefix, &cli.index_type, &event) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Skipping line {}: {}", index + 1, e);
                failures += 1;
                continue;
            }
        };

        if cli.documents_only {
            writer
                .write_all(&request.source)
                .and_then(|_| writeln!(writer))
                .map_err(|e| format!("Failed to write output: {}", e))?;
        } else {
            let source: Value = serde_json::from_slice(&request.source)
                .map_err(|e| format!("Failed to re-read document: {}", e))?;
            let line = json!({
                "index": request.index,
                "type": request.doc_type,
                "id": request.id.map(|id| id.value),
                "source": source,
            });
            serde_json::to_writer(&mut writer, &line)
                .map_err(|e| format!("Failed to write output: {}", e))?;
            writeln!(writer).map_err(|e| format!("Failed to write output: {}", e))?;
        }
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to write output: {}", e))?;
    Ok(failures)
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => {}
        Ok(failures) => {
            tracing::error!("{} event(s) failed", failures);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
