//! Checkpointed backfill over the checkin feed.
//!
//! With a checkpoint the walk runs forward (`min_id`) until it catches up
//! with the present; without one it runs backward (`max_id`) from the most
//! recent page until the data runs out or gets older than a year. Each
//! page's writes finish before the next page is requested.
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use crate::feed::{CheckinFeed, Cursor, FeedTarget, PAGE_LIMIT};
use crate::model::Checkin;
use crate::rotator::TokenRotator;
use crate::writer::{CheckinWriter, WriteReport};

const MAX_BACKFILL_AGE_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Catch up from a checkpoint toward the present.
    Forward,
    /// Backfill history from the most recent page.
    Backward,
}

/// How an under-full page is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderfullPolicy {
    /// Location feeds: forward walks are caught up, backward walks have
    /// reached the oldest data.
    ByMode,
    /// Venue feeds: any under-full page means the oldest data was reached,
    /// whatever the mode.
    AlwaysOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The feed returned an empty page.
    Exhausted,
    /// Forward walk got a short page.
    CaughtUp,
    /// Short page: nothing older left for this target.
    ReachedOldest,
    /// Oldest checkin on a full backward page is a year old or more.
    AgeCutoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue(Cursor),
    Stop(StopReason),
}

/// Decide what follows a page that has just been written.
pub fn next_step(
    mode: WalkMode,
    policy: UnderfullPolicy,
    page: &[Checkin],
    limit: usize,
    now: DateTime<Utc>,
) -> Step {
    let (Some(newest), Some(oldest)) = (page.first(), page.last()) else {
        return Step::Stop(StopReason::Exhausted);
    };

    if page.len() < limit {
        return Step::Stop(match (policy, mode) {
            (UnderfullPolicy::ByMode, WalkMode::Forward) => StopReason::CaughtUp,
            _ => StopReason::ReachedOldest,
        });
    }

    match mode {
        WalkMode::Forward => Step::Continue(Cursor::MinId(newest.checkin_id)),
        WalkMode::Backward => {
            if now - oldest.created_at >= Duration::days(MAX_BACKFILL_AGE_DAYS) {
                Step::Stop(StopReason::AgeCutoff)
            } else {
                Step::Continue(Cursor::MaxId(oldest.checkin_id))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub mode: WalkMode,
    pub pages: usize,
    pub writes: WriteReport,
    pub stop: StopReason,
}

pub struct BackfillWalker<'a> {
    feed: &'a dyn CheckinFeed,
    tokens: &'a TokenRotator,
    writer: CheckinWriter<'a>,
    policy: UnderfullPolicy,
}

impl<'a> BackfillWalker<'a> {
    pub fn new(
        feed: &'a dyn CheckinFeed,
        tokens: &'a TokenRotator,
        writer: CheckinWriter<'a>,
        policy: UnderfullPolicy,
    ) -> Self {
        Self { feed, tokens, writer, policy }
    }

    #[instrument(skip_all, fields(%target, checkpoint = ?checkpoint))]
    pub async fn walk(&self, target: &FeedTarget, checkpoint: Option<u64>) -> Result<WalkSummary> {
        let (mode, mut cursor) = match checkpoint {
            Some(id) => (WalkMode::Forward, Cursor::MinId(id)),
            None => (WalkMode::Backward, Cursor::Latest),
        };
        let mut pages = 0;
        let mut writes = WriteReport::default();

        loop {
            let token = self.tokens.next();
            let page = self.feed.checkins(token, target, cursor).await?;
            pages += 1;
            writes.merge(self.writer.write_all(&page).await?);

            match next_step(mode, self.policy, &page, PAGE_LIMIT, Utc::now()) {
                Step::Continue(next) => cursor = next,
                Step::Stop(stop) => {
                    info!(?mode, ?stop, pages, written = writes.written, "backfill finished");
                    return Ok(WalkSummary { mode, pages, writes, stop });
                }
            }
        }
    }
}
