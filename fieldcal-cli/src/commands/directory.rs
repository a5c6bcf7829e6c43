//! `fieldcal directory import <file>` and `fieldcal directory list`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Deserialize;
use tabled::{settings::Style, Table, Tabled};

use fieldcal_core::{Customer, Site};
use fieldcal_store::Directory;

use super::Ctx;

#[derive(Subcommand, Debug)]
pub enum DirectoryCommand {
    /// Import customers and sites from a JSON file
    /// (`{"customers": [...], "sites": [...]}`).
    Import {
        file: PathBuf,
    },

    /// List sites and their assets.
    List,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirectoryFile {
    customers: Vec<Customer>,
    sites: Vec<Site>,
}

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "site")]
    site: String,
    #[tabled(rename = "asset")]
    asset: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "code")]
    code: String,
    #[tabled(rename = "reports")]
    reports: usize,
}

pub fn run(ctx: &Ctx, command: DirectoryCommand) -> Result<()> {
    match command {
        DirectoryCommand::Import { file } => import(ctx, &file),
        DirectoryCommand::List => list(ctx),
    }
}

fn import(ctx: &Ctx, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let parsed: DirectoryFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a directory file", file.display()))?;

    let repo = ctx.repo();
    let dir = Directory::new(&repo);
    for customer in &parsed.customers {
        dir.save_customer(customer)
            .with_context(|| format!("failed to save customer '{}'", customer.name))?;
    }
    for site in &parsed.sites {
        dir.save_site(site)
            .with_context(|| format!("failed to save site '{}'", site.name))?;
    }
    println!(
        "{} Imported {} customers and {} sites",
        "✓".green(),
        parsed.customers.len(),
        parsed.sites.len()
    );
    Ok(())
}

fn list(ctx: &Ctx) -> Result<()> {
    let repo = ctx.repo();
    let sites = Directory::new(&repo).sites().context("failed to read sites")?;
    if sites.is_empty() {
        println!("No sites found.");
        println!("Run: fieldcal directory import <file.json>");
        return Ok(());
    }

    let rows: Vec<AssetRow> = sites
        .iter()
        .flat_map(|site| {
            site.service_data.iter().map(move |a| AssetRow {
                site: site.id.clone(),
                asset: a.id.clone(),
                name: a.name.clone(),
                code: a.code.clone(),
                reports: a.reports.len(),
            })
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
