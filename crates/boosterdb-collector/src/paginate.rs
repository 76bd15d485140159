//! Cursor-driven retrieval of a bounded item list for one entity.

use std::future::Future;
use std::time::Duration;

use boosterdb_core::post::POST_KIND;
use boosterdb_core::{Page, PostObservation, TwitterUpstream, UndecodedItem, UpstreamError};

/// Bounds for one paginated walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Stop once this many kept items are collected.
    pub max_items: usize,
    /// Stop after this many successful page requests.
    pub max_pages: usize,
    /// Pause before every page after the first.
    pub page_delay: Duration,
}

/// What one paginated walk gathered.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWalk<T> {
    /// Kept items in upstream order, at most `max_items` of them.
    pub items: Vec<T>,
    /// Records from the walked pages that did not decode.
    pub undecoded: Vec<UndecodedItem>,
}

/// Walk a cursor listing until one of the limits is hit or the upstream
/// runs out of pages.
///
/// `fetch` receives the cursor for the next page (`None` for the first).
/// Items for which `keep` returns `false` are dropped but the page still
/// counts towards the budget. A page with no item array ends the walk
/// quietly with whatever was gathered so far.
///
/// Returns at most `limits.max_items` items in upstream order, plus every
/// undecodable record seen on the pages walked.
///
/// # Errors
///
/// Returns the first [`UpstreamError`] produced by `fetch`; items from
/// earlier pages are discarded.
pub async fn collect_pages<T, F, Fut, K>(
    limits: &PageLimits,
    mut fetch: F,
    keep: K,
) -> Result<PageWalk<T>, UpstreamError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, UpstreamError>>,
    K: Fn(&T) -> bool,
{
    let mut collected: Vec<T> = Vec::new();
    let mut undecoded: Vec<UndecodedItem> = Vec::new();
    if limits.max_items == 0 || limits.max_pages == 0 {
        return Ok(PageWalk {
            items: collected,
            undecoded,
        });
    }

    let mut cursor: Option<String> = None;
    let mut page_count: usize = 0;
    let mut is_first_page = true;

    loop {
        if !is_first_page && !limits.page_delay.is_zero() {
            tokio::time::sleep(limits.page_delay).await;
        }
        is_first_page = false;

        let page = fetch(cursor.take()).await?;
        page_count += 1;
        undecoded.extend(page.undecoded);

        let Some(items) = page.items else {
            tracing::debug!(page_count, "page has no item array; stopping");
            break;
        };
        if items.is_empty() {
            tracing::debug!(page_count, "empty page; stopping");
            break;
        }

        let before = collected.len();
        collected.extend(items.into_iter().filter(|item| keep(item)));
        tracing::debug!(
            page_count,
            kept = collected.len() - before,
            total = collected.len(),
            "fetched page"
        );

        if collected.len() >= limits.max_items || page_count >= limits.max_pages {
            break;
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    collected.truncate(limits.max_items);
    Ok(PageWalk {
        items: collected,
        undecoded,
    })
}

/// The most recent posts for one profile, retweets and other item kinds
/// excluded. Undecodable records of another known kind are dropped too.
///
/// # Errors
///
/// Returns the first page failure as an [`UpstreamError`].
pub async fn fetch_recent_posts<U>(
    upstream: &U,
    user_id: &str,
    limits: &PageLimits,
) -> Result<PageWalk<PostObservation>, UpstreamError>
where
    U: TwitterUpstream + ?Sized,
{
    let mut walk = collect_pages(
        limits,
        move |cursor| async move { upstream.fetch_posts_page(user_id, cursor.as_deref()).await },
        PostObservation::is_post,
    )
    .await?;
    walk.undecoded
        .retain(|item| item.kind.as_deref().is_none_or(|kind| kind == POST_KIND));
    Ok(walk)
}
