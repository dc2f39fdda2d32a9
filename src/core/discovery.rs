//! Walks the paginated events index until it is confirmed exhausted.
//!
//! The end of the index is only accepted after `empty_pages_to_stop`
//! consecutive pages that bring no new competition ids, so a single flaky
//! empty response does not cut discovery short. Request failures are a
//! separate path: they are retried with backoff and, once retries run out,
//! discovery fails instead of pretending the index ended.

use crate::config::options::DiscoveryOptions;
use crate::domain::model::CompetitionRef;
use crate::domain::payload::IndexPage;
use crate::domain::ports::ResultsApi;
use crate::utils::error::{EtlError, Result};
use crate::utils::retry::retry_transient;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Discoverer {
    api: Arc<dyn ResultsApi>,
    options: DiscoveryOptions,
    next_page: u32,
    empty_streak: u32,
    seen: HashSet<String>,
    finished: bool,
}

impl Discoverer {
    pub fn new(api: Arc<dyn ResultsApi>, options: DiscoveryOptions) -> Self {
        let next_page = options.start_page;
        Self {
            api,
            options,
            next_page,
            empty_streak: 0,
            seen: HashSet::new(),
            finished: false,
        }
    }

    /// 從指定頁碼繼續（例如上次中斷的位置）
    pub fn resume_from(mut self, page: u32) -> Self {
        self.next_page = page;
        self.empty_streak = 0;
        self.finished = false;
        self
    }

    pub fn current_page(&self) -> u32 {
        self.next_page
    }

    /// Fetches one page. `Ok(Some(refs))` holds the ids new on that page (possibly
    /// none while the end is not yet confirmed); `Ok(None)` means exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<CompetitionRef>>> {
        if self.finished {
            return Ok(None);
        }

        let page = self.next_page;
        let index_page = self.request_page(page).await?;
        self.next_page += 1;

        let mut fresh = Vec::new();
        for event in index_page.events {
            let Some(id) = event.isu_id.filter(|id| !id.is_empty()) else {
                continue;
            };
            if self.seen.insert(id.clone()) {
                fresh.push(CompetitionRef {
                    id,
                    season: event.season,
                    page,
                });
            }
        }

        if fresh.is_empty() {
            self.empty_streak += 1;
            tracing::debug!(
                "📭 Page {} brought no new competitions ({}/{}, end signalled: {})",
                page,
                self.empty_streak,
                self.options.empty_pages_to_stop,
                index_page.end_of_results
            );
            if self.empty_streak >= self.options.empty_pages_to_stop.max(1) {
                self.finished = true;
                tracing::info!(
                    "🏁 Index exhausted after page {} ({} competitions)",
                    page,
                    self.seen.len()
                );
                return Ok(None);
            }
        } else {
            self.empty_streak = 0;
            tracing::debug!("📄 Page {}: {} new competitions", page, fresh.len());
        }

        Ok(Some(fresh))
    }

    /// Runs to exhaustion and returns every discovered competition.
    pub async fn discover(mut self) -> Result<Vec<CompetitionRef>> {
        tracing::info!("🔎 Discovering competitions from page {}", self.next_page);
        let mut refs = Vec::new();
        while let Some(batch) = self.next_page().await? {
            refs.extend(batch);
        }
        tracing::info!("🔎 Discovered {} competitions", refs.len());
        Ok(refs)
    }

    async fn request_page(&self, page: u32) -> Result<IndexPage> {
        let api = self.api.clone();
        let retried = retry_transient(&self.options.retry, &format!("events page {}", page), || {
            let api = api.clone();
            async move { api.events_page(page).await }
        })
        .await;

        match retried.result {
            Ok(index_page) => Ok(index_page),
            // 格式錯誤代表 API 改版，直接往上拋
            Err(e @ EtlError::SchemaError { .. }) => Err(e),
            Err(e) => {
                tracing::error!("❌ Discovery failed at page {}: {}", page, e);
                Err(EtlError::DiscoveryError {
                    page,
                    attempts: retried.attempts,
                    message: e.to_string(),
                })
            }
        }
    }
}
