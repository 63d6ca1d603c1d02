use contextgraph::{Db, Format, Params, Value};
use contextgraph_storage::persistence::json_to_property;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::time::Instant;

const HELP: &str = "\
Commands:
  .exit, .quit          Exit the REPL
  .help                 Show this help message
  .begin                Start a transaction
  .commit               Keep the changes since .begin
  .rollback             Undo the changes since .begin
  .param <name> <json>  Set a query parameter ($name)
  .params               List query parameters
  .save [path]          Save the graph (.json is portable, anything else binary)
  .load <path>          Replace the graph with a saved one
  .clear                Remove every node and relationship
  <query>               Execute a query";

/// What the loop should do after a dot command.
#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Exit,
}

struct Session {
    db: Db,
    params: Params,
    path: Option<PathBuf>,
}

impl Session {
    fn command(&mut self, line: &str) -> Result<Flow, String> {
        let mut parts = line.splitn(3, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

        match name {
            ".exit" | ".quit" => return Ok(Flow::Exit),
            ".help" => println!("{HELP}"),
            ".begin" => {
                self.db.begin().map_err(|e| e.to_string())?;
                println!("Transaction started.");
            }
            ".commit" => {
                self.db.commit().map_err(|e| e.to_string())?;
                println!("Committed.");
            }
            ".rollback" => {
                self.db.rollback().map_err(|e| e.to_string())?;
                println!("Rolled back.");
            }
            ".param" => {
                let (Some(key), Some(raw)) = (arg, rest) else {
                    return Err("usage: .param <name> <json>".to_string());
                };
                let json: serde_json::Value =
                    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
                self.params
                    .insert(key.trim_start_matches('$'), Value::from(json_to_property(&json)));
            }
            ".params" => {
                if self.params.is_empty() {
                    println!("No parameters set.");
                }
                for (key, value) in self.params.iter() {
                    println!("${key} = {value}");
                }
            }
            ".save" => {
                let path = arg
                    .map(PathBuf::from)
                    .or_else(|| self.path.clone())
                    .ok_or_else(|| "usage: .save <path>".to_string())?;
                self.db
                    .save(&path, Format::from_path(&path))
                    .map_err(|e| e.to_string())?;
                println!("Saved to {}.", path.display());
                self.path = Some(path);
            }
            ".load" => {
                let path = PathBuf::from(arg.ok_or_else(|| "usage: .load <path>".to_string())?);
                if self.db.in_transaction() {
                    return Err("finish the active transaction before .load".to_string());
                }
                let mut db =
                    Db::load(&path, Format::from_path(&path)).map_err(|e| e.to_string())?;
                db.set_max_var_length_hops(self.db.options().var_length_ceiling());
                println!(
                    "Loaded {} nodes and {} relationships.",
                    db.store().node_count(),
                    db.store().relationship_count()
                );
                self.db = db;
                self.path = Some(path);
            }
            ".clear" => {
                self.db.clear();
                println!("Graph cleared.");
            }
            _ => return Err(format!("Unknown command: {line}")),
        }
        Ok(Flow::Continue)
    }

    fn query(&mut self, text: &str) {
        let start = Instant::now();
        let in_transaction = self.db.in_transaction();
        match self.db.execute(text, &self.params) {
            Ok(result) => {
                if !result.columns().is_empty() {
                    println!("{}", result.to_table());
                }
                let stats = result.stats();
                if stats.contains_updates() {
                    println!(
                        "Created {} nodes, {} relationships; deleted {} nodes, {} relationships; set {} properties.",
                        stats.nodes_created,
                        stats.relationships_created,
                        stats.nodes_deleted,
                        stats.relationships_deleted,
                        stats.properties_set
                    );
                }
                println!(
                    "({} rows, {:.4}s)",
                    result.len(),
                    start.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                println!("Error: {e}");
                if in_transaction && !self.db.in_transaction() {
                    println!("Transaction rolled back.");
                }
            }
        }
    }
}

pub fn run_repl(db: Db, path: Option<PathBuf>) -> Result<(), String> {
    println!("contextgraph REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type .help for instructions, .exit to quit.\n");

    let mut session = Session {
        db,
        params: Params::new(),
        path,
    };
    let mut rl = DefaultEditor::new().map_err(|e| e.to_string())?;

    loop {
        let prompt = if session.db.in_transaction() {
            "contextgraph*> "
        } else {
            "contextgraph> "
        };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line.starts_with('.') {
                    match session.command(line) {
                        Ok(Flow::Exit) => {
                            println!("Bye!");
                            break;
                        }
                        Ok(Flow::Continue) => {}
                        Err(message) => println!("{message}"),
                    }
                    continue;
                }
                session.query(line);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
