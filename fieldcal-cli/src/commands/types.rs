//! `fieldcal types list`

use anyhow::Result;
use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};

use super::Ctx;

#[derive(Subcommand, Debug)]
pub enum TypesCommand {
    /// List built-in and custom equipment types.
    List {
        /// Emit the full type definitions as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "label")]
    label: String,
    #[tabled(rename = "prefix")]
    prefix: String,
    #[tabled(rename = "steps")]
    steps: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
}

pub fn run(ctx: &Ctx, command: TypesCommand) -> Result<()> {
    match command {
        TypesCommand::List { json } => list(ctx, json),
    }
}

fn list(ctx: &Ctx, json: bool) -> Result<()> {
    let repo = ctx.repo();
    let session = ctx.session(&repo);
    let types = session.catalog().registry().list_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }

    let rows: Vec<TypeRow> = types
        .iter()
        .map(|t| TypeRow {
            id: t.id.to_string(),
            label: t.label.clone(),
            prefix: t.report_code_prefix.clone(),
            steps: t.steps.iter().map(|s| s.key.as_str()).collect::<Vec<_>>().join(", "),
            kind: if t.is_built_in { "built-in" } else { "custom" },
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
