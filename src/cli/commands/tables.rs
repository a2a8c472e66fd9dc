//! Describe the synchronized tables as currently configured.

use colored::Colorize;

use crate::config::load_settings;
use crate::error::Result;
use crate::model::{ColumnSource, TableSpec};

/// Execute the tables command.
///
/// # Errors
///
/// Returns an error if the settings file is invalid.
pub fn execute(json: bool) -> Result<()> {
    let specs = load_settings()?.table_specs()?;

    if json {
        println!("{}", serde_json::to_string(&specs)?);
        return Ok(());
    }

    for (i, spec) in specs.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_spec(spec);
    }
    Ok(())
}

fn print_spec(spec: &TableSpec) {
    let loading = if spec.append_only {
        "replaced each run".to_string()
    } else {
        format!("upsert on {}", spec.key_column)
    };
    println!("{} ({}, {loading})", spec.name.bold(), spec.kind.source_key());

    for col in &spec.columns {
        let origin = match col.source {
            ColumnSource::Field(field) if field == col.target => String::new(),
            ColumnSource::Field(field) => format!(" <- {field}"),
            ColumnSource::ParentId => " <- parent id".to_string(),
        };
        let marker = if spec.change_columns.iter().any(|c| c == col.target) {
            "*".cyan()
        } else {
            " ".normal()
        };
        println!("  {marker} {:<32} {:<9}{}", col.target, col.ty.sql_type(), origin.dimmed());
    }

    if !spec.append_only {
        println!("  {}", "* participates in change detection".dimmed());
    }
}
