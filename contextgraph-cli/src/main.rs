mod repl;

use clap::{Parser, Subcommand, ValueEnum};
use contextgraph::{Db, Format, Options, Params, QueryResult, Value};
use contextgraph_storage::persistence::json_to_property;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "contextgraph", version, arg_required_else_help = true)]
struct Cli {
    /// Log level (error, warn, info, debug, trace, off); RUST_LOG is used when absent
    #[arg(short = 'l', long = "log-level", global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one query and print its rows
    Query(QueryArgs),
    /// Interactive shell
    Repl(ReplArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Ndjson,
    Table,
}

#[derive(clap::Args)]
struct GraphArgs {
    /// Saved graph to load; `.json` files use the portable format
    #[arg(long)]
    db: Option<PathBuf>,

    /// Treat relationships as undirected when creating a new graph
    #[arg(long)]
    undirected: bool,

    /// Ceiling for open-ended variable-length relationships
    #[arg(long, default_value_t = contextgraph::DEFAULT_MAX_VAR_LENGTH_HOPS)]
    max_hops: u32,
}

#[derive(clap::Args)]
struct QueryArgs {
    #[command(flatten)]
    graph: GraphArgs,

    /// Query string
    #[arg(long, conflicts_with = "file")]
    cypher: Option<String>,

    /// Read the query from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Parameters as a JSON object (e.g. '{\"name\":\"alice\"}')
    #[arg(long)]
    params_json: Option<String>,

    #[arg(long, value_enum, default_value = "ndjson")]
    format: OutputFormat,

    /// Write the graph back to --db after the query
    #[arg(long, requires = "db")]
    save: bool,
}

#[derive(clap::Args)]
struct ReplArgs {
    #[command(flatten)]
    graph: GraphArgs,
}

/// Opens `--db` when it exists, otherwise starts an empty graph.
fn open_db(args: &GraphArgs) -> Result<Db, String> {
    match args.db.as_deref() {
        Some(path) if path.exists() => {
            let mut db = Db::load(path, Format::from_path(path))
                .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
            db.set_max_var_length_hops(args.max_hops);
            Ok(db)
        }
        _ => Ok(Db::with_options(
            Options::new()
                .directed(!args.undirected)
                .max_var_length_hops(args.max_hops),
        )),
    }
}

fn parse_params_json(raw: Option<&str>) -> Result<Params, String> {
    let Some(raw) = raw else {
        return Ok(Params::new());
    };
    if raw.trim().is_empty() {
        return Ok(Params::new());
    }
    let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| format!("params_json must be a JSON object: {e}"))?;
    Ok(parsed
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(json_to_property(v))))
        .collect())
}

fn read_query(args: &QueryArgs) -> Result<String, String> {
    if let Some(query) = args.cypher.as_ref() {
        return Ok(query.clone());
    }
    let Some(path) = args.file.as_ref() else {
        return Err("either --cypher or --file is required".to_string());
    };
    std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read query file {}: {e}", path.display()))
}

fn write_ndjson(out: &mut impl Write, result: &QueryResult) -> Result<(), String> {
    for record in result.records() {
        serde_json::to_writer(&mut *out, &record.to_map()).map_err(|e| e.to_string())?;
        out.write_all(b"\n").map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn run_query(args: QueryArgs) -> Result<(), String> {
    let query = read_query(&args)?;
    let params = parse_params_json(args.params_json.as_deref())?;
    let mut db = open_db(&args.graph)?;

    let result = db.execute(&query, &params).map_err(|e| e.to_string())?;
    let mut stdout = std::io::stdout().lock();
    match args.format {
        OutputFormat::Ndjson => write_ndjson(&mut stdout, &result)?,
        OutputFormat::Table => {
            writeln!(stdout, "{}", result.to_table()).map_err(|e| e.to_string())?;
        }
    }

    if args.save
        && let Some(path) = args.graph.db.as_deref()
    {
        db.save(path, Format::from_path(path))
            .map_err(|e| format!("failed to save {}: {e}", path.display()))?;
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if let Some(level) = cli.log_level {
        logger.filter_level(level.to_level_filter());
    }
    logger.init();

    let result = match cli.command {
        Commands::Query(args) => run_query(args),
        Commands::Repl(args) => {
            open_db(&args.graph).and_then(|db| repl::run_repl(db, args.graph.db))
        }
    };

    if let Err(message) = result {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_json_becomes_values() {
        let params = parse_params_json(Some(r#"{"name": "alice", "age": 3, "tags": ["a"]}"#))
            .unwrap();
        assert_eq!(params.get("name"), Some(&Value::from("alice")));
        assert_eq!(params.get("age"), Some(&Value::Int(3)));
        assert_eq!(
            params.get("tags"),
            Some(&Value::List(vec![Value::from("a")]))
        );
        assert!(parse_params_json(Some("  ")).unwrap().is_empty());
        assert!(parse_params_json(Some("[1]")).is_err());
    }

    #[test]
    fn ndjson_keeps_column_order() {
        let mut db = Db::new();
        let result = db
            .execute("RETURN 2 AS b, 'x' AS a, null AS c", &Params::new())
            .unwrap();
        let mut out = Vec::new();
        write_ndjson(&mut out, &result).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"b\":2,\"a\":\"x\",\"c\":null}\n"
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
