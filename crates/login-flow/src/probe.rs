//! Concurrent selector probing.
//!
//! Fallback steps carry several candidate selectors. All candidates are
//! probed for visibility at the same time (parallel waiting, no parallel
//! mutation) and the winner is picked by declared priority order, never by
//! completion order, so behavior stays deterministic under timing noise.

use cdp_driver::PageDriver;
use futures::future::join_all;
use std::time::Duration;
use tracing::debug;

/// Probe all candidates concurrently and return the first visible one in
/// declared order, if any.
pub async fn first_visible(
    driver: &dyn PageDriver,
    candidates: &[String],
    timeout: Duration,
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let probes = candidates.iter().map(|selector| {
        let selector = selector.clone();
        async move {
            let visible = driver.wait_for_visible(&selector, timeout).await.is_ok();
            (selector, visible)
        }
    });

    let results = join_all(probes).await;
    let winner = results
        .into_iter()
        .find(|(_, visible)| *visible)
        .map(|(selector, _)| selector);
    debug!(?winner, candidates = candidates.len(), "visibility probe finished");
    winner
}

/// Probe each candidate and return the visible ones, preserving declared
/// order. Used for the multi-field OTP layout where every digit input must
/// be located.
pub async fn all_visible(
    driver: &dyn PageDriver,
    candidates: &[String],
    timeout: Duration,
) -> Vec<String> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let probes = candidates.iter().map(|selector| {
        let selector = selector.clone();
        async move {
            let visible = driver.wait_for_visible(&selector, timeout).await.is_ok();
            (selector, visible)
        }
    });

    join_all(probes)
        .await
        .into_iter()
        .filter(|(_, visible)| *visible)
        .map(|(selector, _)| selector)
        .collect()
}
