//! fieldcal: service report editor for field calibration work.
//!
//! # Usage
//!
//! ```text
//! fieldcal types list [--json]
//! fieldcal templates list [--type <id>]
//! fieldcal templates duplicate <id>
//! fieldcal code --date <YYYY-MM-DD> --job <n> --cv <code> [--type <id>]
//! fieldcal directory import <file.json>
//! fieldcal draft list [--all]
//! fieldcal draft show <id>
//! fieldcal draft edit <id>            (edit commands on stdin, autosaved)
//! fieldcal draft delete <id>
//! fieldcal report copy-last --site <id> --asset <id>
//! fieldcal report render --draft <id> [--out <file>]
//! fieldcal report finalize --draft <id> [--site <id> --asset <id>]
//! fieldcal report delete --site <id> --asset <id> --record <id>
//! fieldcal settings import <seed.yaml>
//! fieldcal settings show [--json]
//! ```

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    code::CodeArgs, directory::DirectoryCommand, draft::DraftCommand, report::ReportCommand,
    settings::SettingsCommand, templates::TemplatesCommand, types::TypesCommand, Ctx,
};
use fieldcal_core::Role;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fieldcal",
    version,
    about = "Prepare, save and finalize field calibration service reports",
    long_about = None,
)]
struct Cli {
    /// Id recorded as the author of new drafts.
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    /// Role of the person running the command: technician | manager | admin.
    #[arg(long, global = true, default_value = "technician")]
    role: RoleArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect equipment types.
    Types {
        #[command(subcommand)]
        command: TypesCommand,
    },

    /// Inspect and copy parameter templates.
    Templates {
        #[command(subcommand)]
        command: TemplatesCommand,
    },

    /// Print the report code and file name for a service.
    Code(CodeArgs),

    /// Load customers and sites into the local directory.
    Directory {
        #[command(subcommand)]
        command: DirectoryCommand,
    },

    /// Manage in-progress drafts.
    Draft {
        #[command(subcommand)]
        command: DraftCommand,
    },

    /// Render, finalize and delete reports.
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },

    /// Inspect and seed the reporting settings bundle.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

// ---------------------------------------------------------------------------
// Role argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `Role` from CLI args.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleArg(pub Role);

impl FromStr for RoleArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "technician" => Ok(Self(Role::Technician)),
            "manager" => Ok(Self(Role::Manager)),
            "admin" => Ok(Self(Role::Admin)),
            other => Err(format!(
                "unknown role '{other}'; expected: technician, manager, admin"
            )),
        }
    }
}

impl fmt::Display for RoleArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    fieldcal_autosave::init_tracing();
    let cli = Cli::parse();
    let ctx = Ctx::new(cli.user, cli.role.0)?;
    match cli.command {
        Commands::Types { command } => commands::types::run(&ctx, command),
        Commands::Templates { command } => commands::templates::run(&ctx, command),
        Commands::Code(args) => args.run(&ctx),
        Commands::Directory { command } => commands::directory::run(&ctx, command),
        Commands::Draft { command } => commands::draft::run(&ctx, command),
        Commands::Report { command } => commands::report::run(&ctx, command),
        Commands::Settings { command } => commands::settings::run(&ctx, command),
    }
}
