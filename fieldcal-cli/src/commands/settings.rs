//! `fieldcal settings import <seed.yaml>` and `fieldcal settings show`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fieldcal_core::SettingsSeed;
use fieldcal_store::SettingsStore;

use super::Ctx;

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Merge custom equipment types, templates and dropdown items from a
    /// YAML seed file into the stored settings.
    Import { file: PathBuf },

    /// Summarize the stored settings.
    Show {
        /// Print the whole bundle as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "section")]
    section: &'static str,
    #[tabled(rename = "entries")]
    entries: usize,
}

pub fn run(ctx: &Ctx, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Import { file } => import(ctx, &file),
        SettingsCommand::Show { json } => show(ctx, json),
    }
}

fn import(ctx: &Ctx, file: &std::path::Path) -> Result<()> {
    let seed = SettingsSeed::load(file).with_context(|| format!("failed to read seed {}", file.display()))?;
    let repo = ctx.repo();
    let (_, summary) = SettingsStore::new()
        .import_seed(&repo, seed)
        .context("failed to import seed")?;

    println!("{} Imported {}", "✓".green(), file.display());
    println!(
        "  equipment types: {} added, {} updated",
        summary.types_added, summary.types_updated
    );
    println!(
        "  templates: {} added, {} updated",
        summary.templates_added, summary.templates_updated
    );
    println!("  dropdown items: {} added", summary.dropdown_items_added);
    Ok(())
}

fn show(ctx: &Ctx, json: bool) -> Result<()> {
    let repo = ctx.repo();
    let session = ctx.session(&repo);
    let settings = session.catalog().settings();

    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let rows = vec![
        CountRow { section: "custom equipment types", entries: settings.custom_equipment_types.len() },
        CountRow { section: "templates", entries: settings.templates.len() },
        CountRow { section: "dropdown lists", entries: settings.dropdown_options.len() },
        CountRow { section: "comment library", entries: settings.comment_library.len() },
        CountRow { section: "categories", entries: settings.categories.len() },
        CountRow { section: "units", entries: settings.units.len() },
        CountRow { section: "condition colours", entries: settings.condition_colors.len() },
    ];
    println!("{}", Table::new(rows).with(Style::rounded()));
    match settings.updated_at {
        Some(at) => println!("last saved {}", at.format("%Y-%m-%d %H:%M UTC")),
        None => println!("{}", "never saved, showing defaults".dimmed()),
    }
    Ok(())
}
