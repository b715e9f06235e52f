use chrono::{Datelike, Local};
use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use hrdesk::client::{ClientRegistry, CollectionClient, TracingNotifier};
use hrdesk::collections;
use hrdesk::config::Config;
use hrdesk::hr::{EmployeeLeaves, Leave, Timesheet, Timesheets, WeekId};
use hrdesk::logging;
use hrdesk::store::{Criteria, Direction, Record, SearchOptions};

#[derive(Parser, Debug)]
#[command(name = "hrdesk")]
#[command(about = "Query and edit HR collections in a document store")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hrdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Every document of a collection
  List { collection: String },
  /// One document by id
  Get { collection: String, id: String },
  /// Documents matching all equality filters
  Search {
    collection: String,
    /// Filter as field=value, repeatable. Values are JSON when they parse.
    #[arg(short = 'w', long = "where", value_parser = parse_filter)]
    filters: Vec<(String, Value)>,
    #[command(flatten)]
    options: OrderArgs,
  },
  /// Documents whose field contains a text, ignoring case
  Find {
    collection: String,
    field: String,
    needle: String,
    #[command(flatten)]
    options: OrderArgs,
  },
  /// Create a document from a JSON object
  Add { collection: String, json: String },
  /// Merge a JSON object into a document
  Update {
    collection: String,
    id: String,
    json: String,
  },
  /// Delete a document
  Remove { collection: String, id: String },
  /// Leaves of one employee, or all pending leaves
  Leaves {
    #[arg(short, long)]
    employee: Option<String>,
  },
  /// Paid-leave balance of an employee
  Balance {
    employee: String,
    /// Defaults to the current year
    #[arg(short, long)]
    year: Option<i32>,
    /// Paid days granted per year
    #[arg(long, default_value_t = 25)]
    entitlement: u32,
  },
  /// Set the days an employee spends on a project in a week
  Allocate {
    employee: String,
    project: String,
    days: f64,
    /// ISO week such as 2026-W42, defaults to the current week
    #[arg(short, long)]
    week: Option<String>,
  },
}

#[derive(ClapArgs, Debug)]
struct OrderArgs {
  #[arg(long)]
  order_by: Option<String>,
  /// Sort descending
  #[arg(long, requires = "order_by")]
  desc: bool,
  #[arg(long)]
  limit: Option<usize>,
}

impl OrderArgs {
  fn options(&self) -> SearchOptions {
    let mut options = SearchOptions::default();
    if let Some(field) = &self.order_by {
      let direction = if self.desc { Direction::Desc } else { Direction::Asc };
      options = options.order_by(field.clone(), direction);
    }
    if let Some(limit) = self.limit {
      options = options.limit(limit);
    }
    options
  }
}

fn parse_filter(raw: &str) -> Result<(String, Value), String> {
  let (field, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected field=value, got {:?}", raw))?;
  let field = field.trim();
  if field.is_empty() {
    return Err(format!("missing field name in {:?}", raw));
  }
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((field.to_string(), value))
}

fn parse_object(json: &str) -> Result<Record> {
  match serde_json::from_str(json).map_err(|e| eyre!("Invalid JSON: {}", e))? {
    Value::Object(record) => Ok(record),
    other => Err(eyre!("Expected a JSON object, got {}", other)),
  }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Map a user-typed name or alias to its collection, or explain what it might be.
fn collection(registry: &ClientRegistry, input: &str) -> Result<CollectionClient<Record>> {
  if let Some(info) = collections::resolve(input) {
    return Ok(registry.collection(info.name));
  }
  let hints: Vec<_> = collections::suggestions(input)
    .iter()
    .take(3)
    .map(|c| c.name)
    .collect();
  if hints.is_empty() {
    Err(eyre!("Unknown collection {:?}", input))
  } else {
    Err(eyre!("Unknown collection {:?}. Did you mean: {}?", input, hints.join(", ")))
  }
}

async fn run(command: Command, registry: &ClientRegistry) -> Result<()> {
  match command {
    Command::List { collection: name } => {
      print(&collection(registry, &name)?.get_all().await?)?;
    }
    Command::Get {
      collection: name,
      id,
    } => match collection(registry, &name)?.get_by_id(&id).await? {
      Some(doc) => print(&doc)?,
      None => return Err(eyre!("No document {} in {}", id, name)),
    },
    Command::Search {
      collection: name,
      filters,
      options,
    } => {
      let criteria: Criteria = filters.into_iter().collect();
      let docs = collection(registry, &name)?
        .search(criteria, options.options())
        .await?;
      print(&docs)?;
    }
    Command::Find {
      collection: name,
      field,
      needle,
      options,
    } => {
      let docs = collection(registry, &name)?
        .search_contains(&field, &needle, options.options())
        .await?;
      print(&docs)?;
    }
    Command::Add {
      collection: name,
      json,
    } => {
      let record = parse_object(&json)?;
      print(&collection(registry, &name)?.add(&record).await?)?;
    }
    Command::Update {
      collection: name,
      id,
      json,
    } => {
      let patch = parse_object(&json)?;
      print(&collection(registry, &name)?.update(&id, &patch).await?)?;
    }
    Command::Remove {
      collection: name,
      id,
    } => {
      let removed = collection(registry, &name)?.remove(&id).await?;
      println!("{}", removed);
    }
    Command::Leaves { employee } => {
      let leaves = EmployeeLeaves::new(registry.client::<Leave>());
      let docs = match employee {
        Some(employee) => leaves.for_employee(&employee).await?,
        None => leaves.pending().await?,
      };
      print(&docs)?;
    }
    Command::Balance {
      employee,
      year,
      entitlement,
    } => {
      let leaves = EmployeeLeaves::new(registry.client::<Leave>());
      let year = year.unwrap_or_else(|| Local::now().year());
      print(&leaves.balance(&employee, year, entitlement).await?)?;
    }
    Command::Allocate {
      employee,
      project,
      days,
      week,
    } => {
      let week = match week {
        Some(raw) => raw.parse::<WeekId>()?,
        None => WeekId::containing(Local::now().date_naive()),
      };
      let sheets = Timesheets::new(registry.client::<Timesheet>());
      match sheets.allocate(&employee, week, &project, days).await? {
        Some(sheet) => print(&sheet)?,
        None => println!("No timesheet for {} in {}, nothing to store", employee, week),
      }
    }
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _guard = logging::init(&config.log)?;

  let registry = ClientRegistry::new(config.open_store()?, Arc::new(TracingNotifier))
    .with_settings(config.cache.settings());

  run(args.command, &registry).await
}
