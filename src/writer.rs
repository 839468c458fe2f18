use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::limiter::TaskPool;
use crate::mapping::ProductMapping;
use crate::model::Checkin;
use crate::store::model::CheckinPost;
use crate::store::RemoteStore;

/// Counts from one or more [`CheckinWriter::write_all`] calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub processed: usize,
    pub written: usize,
    pub skipped: usize,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.processed += other.processed;
        self.written += other.written;
        self.skipped += other.skipped;
    }
}

/// Pushes checkins to the destination through a bounded pool. Checkins whose
/// beer has no destination product are skipped.
pub struct CheckinWriter<'a> {
    store: &'a dyn RemoteStore,
    mapping: &'a ProductMapping,
    pool: TaskPool,
}

impl<'a> CheckinWriter<'a> {
    pub fn new(store: &'a dyn RemoteStore, mapping: &'a ProductMapping, pool: TaskPool) -> Self {
        Self { store, mapping, pool }
    }

    #[instrument(skip_all, fields(count = checkins.len()))]
    pub async fn write_all(&self, checkins: &[Checkin]) -> Result<WriteReport> {
        let outcomes = self
            .pool
            .run(checkins, |checkin| self.write_one(checkin))
            .await?;
        let written = outcomes.iter().filter(|w| **w).count();
        info!("{} checkins processed.", outcomes.len());
        Ok(WriteReport {
            processed: outcomes.len(),
            written,
            skipped: outcomes.len() - written,
        })
    }

    /// Returns whether a write was issued.
    async fn write_one(&self, checkin: &Checkin) -> Result<bool> {
        let Some(product) = self.mapping.get(checkin.beer.bid) else {
            debug!(checkin_id = checkin.checkin_id, bid = checkin.beer.bid, "no product for beer");
            return Ok(false);
        };
        let post = CheckinPost::new(checkin, product.id)?;
        self.store
            .create_checkin(&post)
            .await
            .with_context(|| format!("failed to store checkin {}", checkin.checkin_id))?;
        Ok(true)
    }
}
