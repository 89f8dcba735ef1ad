use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use teastore::config::ensure_indexes;
use teastore::{Filter, FindOptions, MemoryStore, Pipeline, SortSpec, StoreConfig, Update};

/// teastore CLI — query and edit a teastore snapshot from the command line
#[derive(Parser)]
#[command(name = "teastore", version, about)]
struct Cli {
    /// Snapshot file to load, created on first write
    #[arg(long, default_value = "teastore.json")]
    data: PathBuf,

    /// Store configuration (YAML). Defaults to the forum's collections and indexes
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List matching documents
    Find {
        /// Collection name
        collection: String,
        /// Query object (e.g. --filter '{"tag":"campus"}')
        #[arg(long)]
        filter: Option<String>,
        /// Sort specification (e.g. --sort '{"score":-1,"created_at":-1}')
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// 0 returns everything after --skip
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Show the first matching document
    FindOne {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Count matching documents
    Count {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Insert a new document
    Insert {
        collection: String,
        /// Field values (e.g. --field title="Hall drama" --field score=0)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Whole document as a JSON object, merged under --field values
        #[arg(long)]
        json: Option<String>,
    },

    /// Set fields on the first matching document
    Update {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
        /// Fields to set (e.g. --set '{"score":3}')
        #[arg(long)]
        set: String,
    },

    /// Delete the first matching document, or all of them with --many
    Delete {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        many: bool,
    },

    /// Run a group-and-count pipeline
    Aggregate {
        collection: String,
        /// Pipeline stages as a JSON array
        #[arg(long)]
        pipeline: String,
    },

    /// Bulk export a collection
    Export { collection: String },

    /// Show document counts and identifier counters per collection
    Status,

    /// Liveness probe
    Ping,

    /// Request every configured index
    Indexes,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    let store = open_store(&cli.data, &config)?;

    let mut dirty = false;
    let output = match cli.command {
        Command::Find {
            collection,
            filter,
            sort,
            skip,
            limit,
        } => {
            let filter = parse_filter(filter.as_deref())?;
            let mut options = FindOptions::new().skip(skip).limit(limit);
            if let Some(sort) = sort {
                options = options.sort(SortSpec::from_json(&serde_json::from_str(&sort)?)?);
            }
            let docs = store.collection(&collection).find(&filter, &options);
            serde_json::to_value(docs)?
        }

        Command::FindOne { collection, filter } => {
            let filter = parse_filter(filter.as_deref())?;
            let doc = store.collection(&collection).find_one(&filter);
            serde_json::to_value(doc)?
        }

        Command::Count { collection, filter } => {
            let filter = parse_filter(filter.as_deref())?;
            let count = store.collection(&collection).count_documents(&filter);
            serde_json::json!({ "count": count })
        }

        Command::Insert {
            collection,
            fields,
            json,
        } => {
            let doc = build_document(json.as_deref(), &fields)?;
            let result = store.collection(&collection).insert_one(doc);
            dirty = true;
            serde_json::to_value(result)?
        }

        Command::Update {
            collection,
            filter,
            set,
        } => {
            let filter = parse_filter(filter.as_deref())?;
            let fields: serde_json::Value = serde_json::from_str(&set)?;
            let update = Update::from_json(&serde_json::json!({ "$set": fields }))?;
            let result = store.collection(&collection).update_one(&filter, &update);
            dirty = result.modified_count > 0;
            serde_json::to_value(result)?
        }

        Command::Delete {
            collection,
            filter,
            many,
        } => {
            let filter = parse_filter(filter.as_deref())?;
            let col = store.collection(&collection);
            let result = if many {
                col.delete_many(&filter)
            } else {
                col.delete_one(&filter)
            };
            dirty = result.deleted_count > 0;
            serde_json::to_value(result)?
        }

        Command::Aggregate {
            collection,
            pipeline,
        } => {
            let pipeline = Pipeline::from_json(&serde_json::from_str(&pipeline)?);
            if !pipeline.is_supported() {
                log::warn!("Pipeline shape is not supported; the result is always empty");
            }
            let rows = store.collection(&collection).aggregate(&pipeline);
            serde_json::to_value(rows)?
        }

        Command::Export { collection } => {
            let docs = store
                .collection(&collection)
                .find(&Filter::all(), &FindOptions::new());
            serde_json::to_value(docs)?
        }

        Command::Status => serde_json::json!({
            "data": cli.data.display().to_string(),
            "collections": store.stats(),
        }),

        Command::Ping => serde_json::to_value(store.admin().ping())?,

        Command::Indexes => {
            let created = ensure_indexes(&store, &config).await;
            dirty = true;
            serde_json::json!({ "ok": 1, "indexes": created })
        }
    };

    print_output(&output, &cli.format)?;

    if dirty {
        store.snapshot().write_to(&cli.data)?;
        log::debug!("Wrote snapshot to {}", cli.data.display());
    }

    Ok(())
}

fn open_store(path: &Path, config: &StoreConfig) -> teastore::Result<MemoryStore> {
    if !path.exists() {
        log::info!("No snapshot at {}, starting empty", path.display());
        return Ok(MemoryStore::with_config(config));
    }
    let store = MemoryStore::open_snapshot(path)?;
    for name in &config.collections {
        store.collection(name);
    }
    Ok(store)
}

fn parse_filter(raw: Option<&str>) -> Result<Filter, Box<dyn std::error::Error>> {
    match raw {
        Some(raw) => Ok(Filter::from_json(&serde_json::from_str(raw)?)?),
        None => Ok(Filter::all()),
    }
}

fn build_document(
    json: Option<&str>,
    fields: &[(String, String)],
) -> Result<teastore::Document, Box<dyn std::error::Error>> {
    let mut doc = match json {
        Some(raw) => match serde_json::from_str(raw)? {
            serde_json::Value::Object(map) => map,
            _ => return Err("--json must be a JSON object".into()),
        },
        None => teastore::Document::new(),
    };
    for (key, val) in fields {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let value = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        doc.insert(key.clone(), value);
    }
    Ok(doc)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
