//! Numbered-batch pagination.
//!
//! The API serves large result sets as batches `1, 2, 3, ...` and signals the
//! end with an empty batch. [`exhaust`] turns a batch fetcher into a lazy
//! stream of pages and [`unpaginate`] flattens such a stream.

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{trace, warn};

/// What to do when fetching a page fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageErrors {
    /// Yield the error and stop.
    #[default]
    Propagate,

    /// Log the error and stop as if the page were empty.
    ///
    /// Data after the failed page is silently missing from the result.
    Truncate,
}

/// Stream pages `start, start + 1, ...` until a page comes back empty.
///
/// Nothing is fetched until the stream is polled, and page `i + 1` is only
/// requested once page `i` has arrived. Calling `exhaust` again with a fresh
/// `start` restarts the sequence.
pub fn exhaust<T, E, F, Fut>(
    fetch_page: F,
    start: u32,
    errors: PageErrors,
) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
    E: Display,
{
    stream::unfold(Some((fetch_page, start)), move |state| async move {
        let (mut fetch_page, index) = state?;

        match fetch_page(index).await {
            Ok(page) if page.is_empty() => {
                trace!(index, "empty page, pagination complete");
                None
            }
            Ok(page) => {
                // No batch can follow `u32::MAX`.
                let next = index.checked_add(1).map(|next| (fetch_page, next));
                Some((Ok(page), next))
            }
            Err(e) => match errors {
                PageErrors::Propagate => Some((Err(e), None)),
                PageErrors::Truncate => {
                    warn!(index, error = %e, "page fetch failed, treating as end of data");
                    None
                }
            },
        }
    })
}

/// Concatenate every page, in order. Stops at the first error.
pub async fn unpaginate<T, E, S>(pages: S) -> Result<Vec<T>, E>
where
    S: Stream<Item = Result<Vec<T>, E>>,
{
    pages.try_concat().await
}
