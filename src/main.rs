//! rowexpr - evaluate one expression against every row of a table

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::info;
use rowexpr::expression::{Expression, ExpressionParser};
use rowexpr::table::{load_table, parse_column_spec, ColumnTable, MacroTable};
use std::path::PathBuf;
use std::sync::Arc;

/// rowexpr - typed expression evaluation over tabular data
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Expression to evaluate
    #[arg(short, long)]
    expr: String,

    /// Table file: a `name:TYPE,...` header line and comma-separated rows
    #[arg(short, long)]
    table: Option<PathBuf>,

    /// Extra column as `name:TYPE=v1,v2,...` (repeatable)
    #[arg(short, long = "column", value_name = "SPEC")]
    columns: Vec<String>,

    /// Macro as `name=value`, referenced as %{name} (repeatable)
    #[arg(short, long = "macro", value_name = "NAME=VALUE")]
    macros: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut builder = ExpressionParser::builder();
    let mut rows = 0;

    // Command line columns take precedence over the table file.
    if !args.columns.is_empty() {
        let columns = column_table(&args.columns)?;
        rows = rows.max(columns.row_count());
        builder = builder.with_resolver(Arc::new(columns));
    }

    if let Some(path) = &args.table {
        let table = load_table(path)?;
        info!(
            "Loaded {} columns and {} rows from {}",
            table.column_count(),
            table.row_count(),
            path.display()
        );
        rows = rows.max(table.row_count());
        builder = builder.with_resolver(Arc::new(table));
    }

    let macros = MacroTable::new();
    for definition in &args.macros {
        let (name, value) = definition
            .split_once('=')
            .with_context(|| format!("Invalid macro '{}', expected name=value", definition))?;
        macros.set(name.trim(), value);
    }
    let parser = builder.with_macro_resolver(Arc::new(macros)).build();

    let expression = parser
        .parse(&args.expr)
        .with_context(|| format!("Failed to build expression '{}'", args.expr))?;
    info!(
        "Expression type {} (constant: {})",
        expression.expression_type(),
        expression.is_constant()
    );

    if rows == 0 || expression.is_constant() {
        println!("{}", render(&expression)?);
        return Ok(());
    }
    for row in 0..rows {
        expression.set_index(row as i64);
        println!("{}", render(&expression).with_context(|| format!("Row {}", row + 1))?);
    }
    Ok(())
}

/// Build one table from all `name:TYPE=v1,v2,...` arguments.
fn column_table(specs: &[String]) -> Result<ColumnTable> {
    let mut builder = ColumnTable::builder();
    for spec in specs {
        let (header, values) = spec
            .split_once('=')
            .with_context(|| format!("Invalid column '{}', expected name:TYPE=v1,v2", spec))?;
        let (name, ty) = parse_column_spec(header)?;
        builder = builder.text_column(&name, ty, values.split(','))?;
    }
    Ok(builder.build())
}

/// Text of the current value, `?` for missing.
fn render(expression: &Expression) -> Result<String> {
    Ok(expression
        .evaluate_text()?
        .unwrap_or_else(|| "?".to_string()))
}
