//! Listing scanner — load an infinite-scroll result list to exhaustion.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::{SiteProfile, Timings};
use crate::scraping::page::Page;

/// Safety valve for a listing that keeps growing forever.
///
/// Real result lists stop at a few hundred cards, far below this, so the
/// scan always ends on an unchanged count. The cap only guards against a
/// page that appends cards on every scroll.
pub const MAX_SCROLL_ROUNDS: usize = 10_000;

/// Navigate to `url`, scroll until the card count stops changing, scroll
/// back to the top and return the converged count.
pub async fn scan_listing(
    page: &dyn Page,
    url: &str,
    site: &SiteProfile,
    timings: &Timings,
) -> Result<usize> {
    page.goto(url)
        .await
        .with_context(|| format!("failed to open listing {}", url))?;

    let card = &site.selectors.job_card;
    let mut last: Option<usize> = None;
    let mut rounds = 0usize;
    let count = loop {
        page.scroll_to_bottom().await.context("listing scroll failed")?;
        tokio::time::sleep(timings.scroll_settle).await;

        let current = page.count(card).await.context("failed to count job cards")?;
        if last == Some(current) {
            break current;
        }
        last = Some(current);

        rounds += 1;
        if rounds >= MAX_SCROLL_ROUNDS {
            warn!(
                "listing: still growing after {} scrolls, stopping at {} cards",
                rounds, current
            );
            break current;
        }
    };

    page.scroll_to_top().await.context("listing scroll failed")?;
    tokio::time::sleep(timings.settle).await;

    info!("listing: all cards loaded, total={}", count);
    Ok(count)
}
