//! Customer/site/asset directory on top of the `customers` and `sites`
//! collections.
//!
//! Lookups are read-only. The one write path appends or removes archival
//! records on an asset, as a read-modify-write of the owning site. Keys the
//! typed records do not model ride along in their `extra` maps.

use fieldcal_core::{ArchivalRecord, Asset, Customer, Site};

use crate::error::StoreError;
use crate::repository::{get_typed, list_typed, save_typed, DocumentRepository, CUSTOMERS, SITES};

pub struct Directory<'a> {
    repo: &'a dyn DocumentRepository,
}

impl<'a> Directory<'a> {
    pub fn new(repo: &'a dyn DocumentRepository) -> Self {
        Self { repo }
    }

    pub fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        list_typed(self.repo, CUSTOMERS)
    }

    pub fn customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        get_typed(self.repo, CUSTOMERS, id)
    }

    pub fn sites(&self) -> Result<Vec<Site>, StoreError> {
        list_typed(self.repo, SITES)
    }

    /// Sites belonging to one customer.
    pub fn sites_for(&self, customer_id: &str) -> Result<Vec<Site>, StoreError> {
        Ok(self
            .sites()?
            .into_iter()
            .filter(|s| s.customer_id == customer_id)
            .collect())
    }

    pub fn site(&self, id: &str) -> Result<Option<Site>, StoreError> {
        get_typed(self.repo, SITES, id)
    }

    pub fn require_site(&self, id: &str) -> Result<Site, StoreError> {
        self.site(id)?.ok_or_else(|| StoreError::NotFound {
            collection: SITES.to_string(),
            id: id.to_string(),
        })
    }

    pub fn asset(&self, site_id: &str, asset_id: &str) -> Result<Option<Asset>, StoreError> {
        Ok(self.site(site_id)?.and_then(|s| s.asset(asset_id).cloned()))
    }

    /// Most recent record on an asset, if any.
    pub fn latest_report(&self, site_id: &str, asset_id: &str) -> Result<Option<ArchivalRecord>, StoreError> {
        Ok(self
            .asset(site_id, asset_id)?
            .and_then(|a| a.latest_report().cloned()))
    }

    pub fn save_site(&self, site: &Site) -> Result<Site, StoreError> {
        save_typed(self.repo, SITES, site)
    }

    pub fn save_customer(&self, customer: &Customer) -> Result<Customer, StoreError> {
        save_typed(self.repo, CUSTOMERS, customer)
    }

    /// Append `record` to an asset's history.
    pub fn append_report(&self, site_id: &str, asset_id: &str, record: ArchivalRecord) -> Result<(), StoreError> {
        let mut site = self.require_site(site_id)?;
        let asset = site.asset_mut(asset_id).ok_or_else(|| missing_asset(site_id, asset_id))?;
        tracing::info!("appending report {} to {site_id}/{asset_id}", record.id);
        asset.reports.push(record.into());
        self.save_site(&site)?;
        Ok(())
    }

    /// Remove a record from an asset's history and return it.
    pub fn remove_report(&self, site_id: &str, asset_id: &str, record_id: i64) -> Result<ArchivalRecord, StoreError> {
        let mut site = self.require_site(site_id)?;
        let asset = site.asset_mut(asset_id).ok_or_else(|| missing_asset(site_id, asset_id))?;
        let (idx, removed) = asset
            .reports
            .iter()
            .enumerate()
            .find_map(|(i, entry)| entry.record().filter(|r| r.id == record_id).map(|r| (i, r.clone())))
            .ok_or_else(|| StoreError::NotFound {
                collection: format!("{SITES}/{site_id}/{asset_id}/reports"),
                id: record_id.to_string(),
            })?;
        asset.reports.remove(idx);
        self.save_site(&site)?;
        Ok(removed)
    }
}

pub(crate) fn missing_asset(site_id: &str, asset_id: &str) -> StoreError {
    StoreError::NotFound {
        collection: format!("{SITES}/{site_id}/assets"),
        id: asset_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use chrono::{TimeZone, Utc};
    use fieldcal_core::archive::encode_at;
    use fieldcal_core::{Catalog, ReportFormState};

    fn seeded(repo: &MemoryRepository) {
        let dir = Directory::new(repo);
        dir.save_customer(&Customer { id: "c1".into(), name: "Acme".into() }).unwrap();
        dir.save_site(&Site {
            id: "s1".into(),
            customer_id: "c1".into(),
            name: "North Pit".into(),
            service_data: vec![Asset { id: "a1".into(), name: "Feed".into(), code: "CV12".into(), ..Default::default() }],
            ..Default::default()
        })
        .unwrap();
    }

    fn record(day: u32) -> ArchivalRecord {
        let c = Catalog::default();
        let s = ReportFormState::new(&c);
        let at = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
        encode_at(&s, c.registry(), None, "x.pdf", at)
    }

    #[test]
    fn lookups() {
        let repo = MemoryRepository::new();
        seeded(&repo);
        let dir = Directory::new(&repo);
        assert_eq!(dir.customers().unwrap().len(), 1);
        assert_eq!(dir.sites_for("c1").unwrap().len(), 1);
        assert!(dir.sites_for("c2").unwrap().is_empty());
        assert_eq!(dir.asset("s1", "a1").unwrap().unwrap().code, "CV12");
        assert!(dir.asset("s1", "zz").unwrap().is_none());
        assert!(dir.latest_report("s1", "a1").unwrap().is_none());
    }

    #[test]
    fn append_then_remove_reports() {
        let repo = MemoryRepository::new();
        seeded(&repo);
        let dir = Directory::new(&repo);
        let older = record(1);
        let newer = record(9);
        dir.append_report("s1", "a1", newer.clone()).unwrap();
        dir.append_report("s1", "a1", older.clone()).unwrap();
        assert_eq!(dir.latest_report("s1", "a1").unwrap().unwrap().id, newer.id);

        let removed = dir.remove_report("s1", "a1", newer.id).unwrap();
        assert_eq!(removed, newer);
        assert_eq!(dir.latest_report("s1", "a1").unwrap().unwrap().id, older.id);
        assert!(matches!(dir.remove_report("s1", "a1", 1), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn write_back_keeps_unmodelled_site_data() {
        let repo = MemoryRepository::new();
        repo.save(
            SITES,
            serde_json::json!({
                "id": "s1",
                "customerId": "c1",
                "name": "North Pit",
                "rollerData": {"count": 42},
                "specData": {"beltWidth": "1200"},
                "serviceData": [{
                    "id": "a1",
                    "name": "Feed",
                    "code": "CV12",
                    "frequency": "monthly",
                    "reports": [{"id": "rep-1699920000", "date": "2023-11-14"}]
                }]
            }),
        )
        .unwrap();
        let dir = Directory::new(&repo);
        assert_eq!(dir.sites().unwrap().len(), 1);

        let rec = record(3);
        dir.append_report("s1", "a1", rec.clone()).unwrap();
        assert_eq!(dir.latest_report("s1", "a1").unwrap().unwrap().id, rec.id);
        dir.remove_report("s1", "a1", rec.id).unwrap();

        let raw = repo.get_by_id(SITES, "s1").unwrap().unwrap();
        assert_eq!(raw["rollerData"]["count"], 42);
        assert_eq!(raw["specData"]["beltWidth"], "1200");
        let asset = &raw["serviceData"][0];
        assert_eq!(asset["frequency"], "monthly");
        assert_eq!(asset["reports"].as_array().map(Vec::len), Some(1));
        assert_eq!(asset["reports"][0]["id"], "rep-1699920000");
        assert_eq!(asset["reports"][0]["date"], "2023-11-14");
    }

    #[test]
    fn append_to_unknown_asset_fails() {
        let repo = MemoryRepository::new();
        seeded(&repo);
        let dir = Directory::new(&repo);
        assert!(dir.append_report("s1", "nope", record(1)).is_err());
        assert!(dir.append_report("s9", "a1", record(1)).is_err());
    }
}
