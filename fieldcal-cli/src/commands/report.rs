//! `fieldcal report`: copy-forward, render, finalize and delete reports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use fieldcal_store::{delete_archived_report, DocumentRepository, ReportSession};

use super::Ctx;

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Start a new draft pre-filled from an asset's most recent report.
    CopyLast(AssetArgs),

    /// Render a draft to a document.
    Render(RenderArgs),

    /// Render, store and archive a draft, then mark it completed.
    Finalize(FinalizeArgs),

    /// Delete a finalized report (admin only).
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct AssetArgs {
    #[arg(long)]
    pub site: String,

    #[arg(long)]
    pub asset: String,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(long)]
    pub draft: String,

    /// Write the document here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FinalizeArgs {
    #[arg(long)]
    pub draft: String,

    /// Site to archive under. Defaults to the draft's selection.
    #[arg(long, requires = "asset")]
    pub site: Option<String>,

    /// Asset to archive under. Defaults to the draft's selection.
    #[arg(long, requires = "site")]
    pub asset: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(long)]
    pub site: String,

    #[arg(long)]
    pub asset: String,

    /// Archival record id.
    #[arg(long)]
    pub record: i64,
}

pub fn run(ctx: &Ctx, command: ReportCommand) -> Result<()> {
    match command {
        ReportCommand::CopyLast(args) => copy_last(ctx, args),
        ReportCommand::Render(args) => render(ctx, args),
        ReportCommand::Finalize(args) => finalize(ctx, args),
        ReportCommand::Delete(args) => delete(ctx, args),
    }
}

fn resumed(ctx: &Ctx, repo: &dyn DocumentRepository, draft: &str) -> Result<ReportSession> {
    let mut session = ctx.session(repo);
    session
        .resume_by_id(repo, draft)
        .with_context(|| format!("failed to load draft '{draft}'"))?;
    Ok(session)
}

fn copy_last(ctx: &Ctx, args: AssetArgs) -> Result<()> {
    let repo = ctx.repo();
    let mut session = ctx.session(&repo);
    session
        .select_asset(&repo, &args.site, &args.asset)
        .with_context(|| format!("failed to load {}/{}", args.site, args.asset))?;
    let copied = session
        .copy_forward(&repo, &args.site, &args.asset)
        .context("failed to read the asset's reports")?;
    if !copied {
        println!(
            "{} No finalized report on {}/{}; starting from the directory",
            "!".yellow(),
            args.site,
            args.asset
        );
    }

    let draft = session
        .manual_save(&repo)
        .context("failed to save the new draft")?;
    let id = draft.id.map(|i| i.to_string()).unwrap_or_default();
    println!("{} Created draft '{id}'", "✓".green());
    Ok(())
}

fn render(ctx: &Ctx, args: RenderArgs) -> Result<()> {
    let repo = ctx.repo();
    let session = resumed(ctx, &repo, &args.draft)?;
    let doc = ctx
        .renderer()?
        .render_state(&session.state, session.catalog())
        .with_context(|| format!("failed to render draft '{}'", args.draft))?;

    match args.out {
        Some(path) => {
            std::fs::write(&path, &doc.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "{} Rendered {} ({} bytes) to {}",
                "✓".green(),
                doc.file_name,
                doc.bytes.len(),
                path.display()
            );
        }
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(&doc.bytes)
                .context("failed to write to stdout")?;
        }
    }
    Ok(())
}

fn finalize(ctx: &Ctx, args: FinalizeArgs) -> Result<()> {
    let repo = ctx.repo();
    let blobs = ctx.blobs();
    let renderer = ctx.renderer()?;
    let mut session = resumed(ctx, &repo, &args.draft)?;
    if let (Some(site), Some(asset)) = (&args.site, &args.asset) {
        session
            .select_asset(&repo, site, asset)
            .with_context(|| format!("failed to load {site}/{asset}"))?;
    }

    let outcome = session
        .finalize(&repo, &blobs, &renderer)
        .with_context(|| format!("failed to finalize draft '{}'", args.draft))?;

    let general = &outcome.record.data.general;
    println!(
        "{} Finalized {} as record {}",
        "✓".green(),
        general.report_id,
        outcome.record.id
    );
    match (&outcome.record.storage_url, &outcome.upload_error) {
        (Some(url), _) => println!("  stored at {url}"),
        (None, Some(err)) => println!("  {} document not stored: {err}", "!".yellow()),
        (None, None) => {}
    }
    if outcome.draft_completed {
        println!("  draft '{}' marked completed", args.draft);
    }
    Ok(())
}

fn delete(ctx: &Ctx, args: DeleteArgs) -> Result<()> {
    let repo = ctx.repo();
    let blobs = ctx.blobs();
    let removed = delete_archived_report(ctx.user.role, &repo, &blobs, &args.site, &args.asset, args.record)
        .with_context(|| format!("failed to delete record {}", args.record))?;
    println!(
        "{} Deleted {} from {}/{}",
        "✓".green(),
        removed.data.general.report_id,
        args.site,
        args.asset
    );
    Ok(())
}
