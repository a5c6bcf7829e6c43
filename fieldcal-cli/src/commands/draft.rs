//! `fieldcal draft`: list, show, edit and delete drafts.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tokio::io::{AsyncBufReadExt, BufReader};

use fieldcal_autosave::{AutosaveConfig, SharedRepository, SharedSession};
use fieldcal_core::{DraftStatus, ParamValue};
use fieldcal_store::{list_drafts, load_draft, DocumentRepository, ReportSession};

use super::Ctx;

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    /// List resumable drafts, most recent first.
    List {
        /// Include drafts whose report has been finalized.
        #[arg(long)]
        all: bool,
    },

    /// Print a stored draft as JSON.
    Show { id: String },

    /// Edit a draft with commands read from stdin. Edits are autosaved.
    ///
    /// One command per line: `comments <text>`, `date <YYYY-MM-DD>`,
    /// `job <n>`, `cv <code>`, `interval <months>`, `service-type <text>`,
    /// `tech <identity>`, `type <id>`, `template <id>`, `asset <site> <asset>`,
    /// `field <key> <value>`, `cal <key> <value>`, `found <param> <value>`,
    /// `left <param> <value>`, `value <param> <value>`, `pct <param>`,
    /// `step next|back|<n>`, `save`, `quit`.
    Edit { id: String },

    /// Delete a draft.
    Delete { id: String },
}

#[derive(Tabled)]
struct DraftRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "customer")]
    customer: String,
    #[tabled(rename = "asset")]
    asset: String,
    #[tabled(rename = "type")]
    equipment_type: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "updated")]
    updated: String,
}

pub fn run(ctx: &Ctx, command: DraftCommand) -> Result<()> {
    match command {
        DraftCommand::List { all } => list(ctx, all),
        DraftCommand::Show { id } => show(ctx, &id),
        DraftCommand::Edit { id } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(edit(ctx, &id))
        }
        DraftCommand::Delete { id } => delete(ctx, &id),
    }
}

fn list(ctx: &Ctx, all: bool) -> Result<()> {
    let repo = ctx.repo();
    let drafts = list_drafts(&repo, all).context("failed to read drafts")?;
    if drafts.is_empty() {
        println!("No drafts.");
        return Ok(());
    }

    let rows: Vec<DraftRow> = drafts
        .iter()
        .map(|d| DraftRow {
            id: d.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            customer: d.customer_name.clone(),
            asset: d.asset_name.clone(),
            equipment_type: d.equipment_type.to_string(),
            status: match d.status {
                DraftStatus::Draft => d.status.to_string().yellow().to_string(),
                DraftStatus::Completed => d.status.to_string().green().to_string(),
            },
            updated: d
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn show(ctx: &Ctx, id: &str) -> Result<()> {
    let repo = ctx.repo();
    let draft = load_draft(&repo, id).with_context(|| format!("failed to load draft '{id}'"))?;
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}

fn delete(ctx: &Ctx, id: &str) -> Result<()> {
    let repo = ctx.repo();
    load_draft(&repo, id).with_context(|| format!("failed to load draft '{id}'"))?;
    let mut session = ctx.session(&repo);
    session
        .delete_draft(&repo, id)
        .with_context(|| format!("failed to delete draft '{id}'"))?;
    println!("{} Deleted draft '{id}'", "✓".green());
    Ok(())
}

// ---------------------------------------------------------------------------
// Interactive editing
// ---------------------------------------------------------------------------

async fn edit(ctx: &Ctx, id: &str) -> Result<()> {
    let repo: SharedRepository = Arc::new(ctx.repo());
    let mut session = ctx.session(repo.as_ref());
    session
        .resume_by_id(repo.as_ref(), id)
        .with_context(|| format!("failed to load draft '{id}'"))?;
    let session: SharedSession = Arc::new(Mutex::new(session));

    let config = AutosaveConfig::load_at(&ctx.home).context("failed to read autosave config")?;
    let autosave = fieldcal_autosave::spawn(session.clone(), repo.clone(), &config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let outcome = {
            let mut guard = session.lock().unwrap_or_else(|p| p.into_inner());
            apply_edit(&mut guard, repo.as_ref(), &line)
        };
        match outcome {
            Ok(Edit::Changed) => autosave.draft_edited(),
            Ok(Edit::Saved(saved)) => println!("{} Saved draft '{saved}'", "✓".green()),
            Ok(Edit::Nothing) => {}
            Ok(Edit::Quit) => break,
            Err(err) => eprintln!("{} {err:#}", "✗".red()),
        }
    }

    autosave.finish().await.context("autosave did not finish cleanly")?;
    let guard = session.lock().unwrap_or_else(|p| p.into_inner());
    let code = guard.state.report_code(guard.catalog().registry());
    println!("{} Draft '{id}' up to date ({code})", "✓".green());
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Edit {
    Changed,
    Saved(String),
    Nothing,
    Quit,
}

/// Apply one edit command to the session.
fn apply_edit(session: &mut ReportSession, repo: &dyn DocumentRepository, line: &str) -> Result<Edit> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Edit::Nothing);
    }
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "quit" | "exit" => return Ok(Edit::Quit),
        "save" => {
            let draft = session.manual_save(repo)?;
            return Ok(Edit::Saved(draft.id.map(|i| i.to_string()).unwrap_or_default()));
        }
        "comments" => session.state.comments = rest.replace("\\n", "\n"),
        "date" => session.state.service.date = rest.to_string(),
        "job" => session.state.service.job_number = rest.to_string(),
        "cv" => session.state.service.cv = rest.to_string(),
        "interval" => session.state.service.interval = rest.to_string(),
        "service-type" => session.state.service.service_type = rest.to_string(),
        "tech" => session.state.service.techs.push(rest.to_string()),
        "type" => {
            let (state, catalog) = session.form_mut();
            if !catalog.registry().contains(rest) {
                bail!("unknown equipment type '{rest}'");
            }
            if !state.set_equipment_type(catalog, rest) {
                return Ok(Edit::Nothing);
            }
        }
        "template" => {
            let (state, catalog) = session.form_mut();
            state.select_template_by_id(catalog, rest)?;
        }
        "asset" => {
            let (site, asset) = two_args(command, rest)?;
            session.select_asset(repo, site, asset)?;
        }
        "field" => {
            let (key, value) = two_args(command, rest)?;
            let (state, catalog) = session.form_mut();
            state.set_asset_field(catalog.registry(), key, value)?;
        }
        "cal" => {
            let (key, value) = two_args(command, rest)?;
            session.state.set_calibration(key, value)?;
        }
        "found" => {
            let (param, value) = two_args(command, rest)?;
            session.state.set_param_as_found(param, value)?;
        }
        "left" => {
            let (param, value) = two_args(command, rest)?;
            session.state.set_param_as_left(param, value)?;
        }
        "value" => {
            let (param, value) = two_args(command, rest)?;
            session.state.set_param_value(param, ParamValue::val(value))?;
        }
        "pct" => session.state.toggle_param_pct(rest)?,
        "step" => {
            let (state, catalog) = session.form_mut();
            match rest {
                "next" => {
                    state.advance_step(catalog.registry())?;
                }
                "back" => {
                    state.back_step();
                }
                n => {
                    let step = n.parse().map_err(|_| anyhow!("step expects next, back or a number"))?;
                    state.goto_step(catalog.registry(), step)?;
                }
            }
        }
        other => bail!("unknown edit command '{other}'"),
    }
    Ok(Edit::Changed)
}

fn two_args<'a>(command: &str, rest: &'a str) -> Result<(&'a str, &'a str)> {
    rest.split_once(' ')
        .map(|(a, b)| (a, b.trim()))
        .ok_or_else(|| anyhow!("'{command}' expects two arguments"))
}
