//! `fieldcal code`: report code and file name for a service.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

use fieldcal_core::{code, ServiceInfo};

use super::Ctx;

#[derive(Args, Debug)]
pub struct CodeArgs {
    /// Service date, `YYYY-MM-DD`. Today when omitted.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Job number.
    #[arg(long)]
    pub job: Option<String>,

    /// Conveyor code.
    #[arg(long)]
    pub cv: Option<String>,

    /// Equipment type id. Unknown ids fall back to the default type.
    #[arg(long = "type", short = 't', value_name = "TYPE", default_value = "belt_weigher")]
    pub equipment_type: String,
}

impl CodeArgs {
    pub fn run(self, ctx: &Ctx) -> Result<()> {
        let repo = ctx.repo();
        let session = ctx.session(&repo);
        let service = ServiceInfo {
            date: self
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            job_number: self.job.unwrap_or_default(),
            cv: self.cv.unwrap_or_default(),
            ..ServiceInfo::default()
        };
        let report_code = code::generate(&service, &self.equipment_type, session.catalog().registry());
        println!("{report_code}");
        println!("{}", code::file_name(&report_code));
        Ok(())
    }
}
