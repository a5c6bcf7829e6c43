//! `fieldcal templates list` and `fieldcal templates duplicate <id>`

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use super::Ctx;

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// List parameter templates.
    List {
        /// Only templates offered for this equipment type.
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        equipment_type: Option<String>,
    },

    /// Copy a template under a new id and save the settings.
    Duplicate {
        /// Template id to copy.
        id: String,
    },
}

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "type")]
    equipment_type: String,
    #[tabled(rename = "params")]
    params: usize,
    #[tabled(rename = "default")]
    is_default: String,
}

pub fn run(ctx: &Ctx, command: TemplatesCommand) -> Result<()> {
    match command {
        TemplatesCommand::List { equipment_type } => list(ctx, equipment_type.as_deref()),
        TemplatesCommand::Duplicate { id } => duplicate(ctx, &id),
    }
}

fn list(ctx: &Ctx, equipment_type: Option<&str>) -> Result<()> {
    let repo = ctx.repo();
    let session = ctx.session(&repo);
    let settings = session.catalog().settings();

    let templates: Vec<_> = match equipment_type {
        Some(ty) => settings.templates_for(ty).collect(),
        None => settings.templates.iter().collect(),
    };
    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }

    let rows: Vec<TemplateRow> = templates
        .iter()
        .map(|t| TemplateRow {
            id: t.id.to_string(),
            name: t.name.clone(),
            equipment_type: t.equipment_type.to_string(),
            params: t.params.len(),
            is_default: if t.is_default { "yes".into() } else { String::new() },
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn duplicate(ctx: &Ctx, id: &str) -> Result<()> {
    let repo = ctx.repo();
    let mut session = ctx.session(&repo);
    let new_id = session
        .update_settings(|s| s.duplicate_template(id))
        .with_context(|| format!("failed to duplicate template '{id}'"))?;
    session
        .save_settings(&repo)
        .context("failed to save settings")?;

    let name = session
        .catalog()
        .template(new_id.as_str())
        .map(|t| t.name.clone())
        .unwrap_or_default();
    println!("{} Duplicated '{id}' as '{new_id}' ({name})", "✓".green());
    Ok(())
}
