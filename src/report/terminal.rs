use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

use crate::models::Dependency;

/// Render a colored terminal report of resolved dependencies.
pub fn render(deps: &[Dependency], path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!("Resolved: {}", deps.len());
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-locatr".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Scanning: {}\n", path.display());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Version").add_attribute(Attribute::Bold),
        Cell::new("Source").add_attribute(Attribute::Bold),
        Cell::new("License location").add_attribute(Attribute::Bold),
    ];
    if verbose {
        header.push(Cell::new("Summary").add_attribute(Attribute::Bold));
        header.push(Cell::new("Homepage").add_attribute(Attribute::Bold));
    }
    table.set_header(header);

    for dep in deps {
        let mut row = vec![
            Cell::new(&dep.name),
            Cell::new(&dep.version),
            Cell::new(dep.kind.to_string()),
            Cell::new(dep.path.display().to_string()),
        ];
        if verbose {
            row.push(Cell::new(dep.summary.as_deref().unwrap_or("")));
            row.push(Cell::new(dep.homepage.as_deref().unwrap_or("")));
        }
        table.add_row(row);
    }

    println!("{table}");
    println!(
        "\n {} {} dependencies resolved",
        "✓".green(),
        deps.len()
    );

    Ok(())
}
