pub mod code;
pub mod directory;
pub mod draft;
pub mod report;
pub mod settings;
pub mod templates;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};

use fieldcal_core::Role;
use fieldcal_renderer::Renderer;
use fieldcal_store::{paths, DocumentRepository, FsBlobStore, FsRepository, ReportSession, SessionUser};

/// What every command needs: where the data lives and who is acting.
pub struct Ctx {
    pub home: PathBuf,
    pub user: SessionUser,
}

impl Ctx {
    pub fn new(user: String, role: Role) -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(Self {
            home,
            user: SessionUser::new(user, role),
        })
    }

    pub fn repo(&self) -> FsRepository {
        FsRepository::open_at(&self.home)
    }

    pub fn blobs(&self) -> FsBlobStore {
        FsBlobStore::open_at(&self.home)
    }

    pub fn session(&self, repo: &dyn DocumentRepository) -> ReportSession {
        ReportSession::open(repo, self.user.clone())
    }

    /// Embedded layouts, overridden by `~/.fieldcal/templates/*.tera`.
    pub fn renderer(&self) -> Result<Renderer> {
        let dir = paths::templates_dir_at(&self.home);
        if dir.is_dir() {
            Renderer::with_overrides(&dir)
                .with_context(|| format!("failed to load layout overrides from {}", dir.display()))
        } else {
            Renderer::new().context("failed to load report layouts")
        }
    }
}
