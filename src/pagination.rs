//! Cursor-based pagination.
//!
//! [`Paginator`] turns a page-fetch callback into a lazy, forward-only
//! sequence of items. The next page is fetched only once the current one has
//! been drained.

use std::collections::VecDeque;
use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::SdkError;

/// One page of a list endpoint: `{"data": [...], "has_more": bool, "next_cursor"?: string}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page followed by another at `next_cursor`.
    pub fn more(data: Vec<T>, next_cursor: impl Into<String>) -> Self {
        Self {
            data,
            has_more: true,
            next_cursor: Some(next_cursor.into()),
        }
    }

    /// The final page.
    pub fn last(data: Vec<T>) -> Self {
        Self {
            data,
            has_more: false,
            next_cursor: None,
        }
    }
}

type FetchPage<T, E> = Box<dyn FnMut(Option<String>) -> BoxFuture<'static, Result<Page<T>, E>> + Send>;

/// Lazy, single-pass iterator over every item of a paginated listing.
///
/// Items already yielded are not retained and there is no reset. The first
/// fetch error is returned once and ends iteration.
pub struct Paginator<T, E = SdkError> {
    fetch: FetchPage<T, E>,
    buffer: VecDeque<T>,
    cursor: Option<String>,
    has_more: bool,
    done: bool,
    pages_fetched: usize,
}

impl<T, E> Paginator<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// `fetch` receives `None` for the first page, then each `next_cursor`.
    pub fn new<F, Fut>(mut fetch: F) -> Self
    where
        F: FnMut(Option<String>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Page<T>, E>> + Send + 'static,
    {
        Self {
            fetch: Box::new(move |cursor| fetch(cursor).boxed()),
            buffer: VecDeque::new(),
            cursor: None,
            has_more: true,
            done: false,
            pages_fetched: 0,
        }
    }

    /// Resume from `cursor` instead of the first page.
    pub fn starting_at(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor.filter(|c| !c.is_empty());
        self
    }

    /// Next item, fetching a page if the buffer is drained.
    pub async fn try_next(&mut self) -> Result<Option<T>, E> {
        self.fill().await?;
        Ok(self.buffer.pop_front())
    }

    /// Whether another item is available. May fetch a page.
    pub async fn has_next(&mut self) -> Result<bool, E> {
        self.fill().await?;
        Ok(!self.buffer.is_empty())
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Drain the remaining items into a `Vec`.
    pub async fn collect_all(mut self) -> Result<Vec<T>, E> {
        let mut items = Vec::new();
        while let Some(item) = self.try_next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt into a `Stream`. Ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, E>> + Send {
        futures_util::stream::unfold(self, |mut paginator| async move {
            match paginator.try_next().await {
                Ok(Some(item)) => Some((Ok(item), paginator)),
                Ok(None) => None,
                // The paginator is already finished; the next poll ends the stream.
                Err(e) => Some((Err(e), paginator)),
            }
        })
    }

    async fn fill(&mut self) -> Result<(), E> {
        while self.buffer.is_empty() && !self.done {
            if !self.has_more {
                self.done = true;
                break;
            }

            let cursor = self.cursor.take();
            let page = match (self.fetch)(cursor.clone()).await {
                Ok(page) => page,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            };
            self.pages_fetched += 1;

            // A missing or repeated cursor cannot make progress.
            let stalled = page.next_cursor.is_none() || page.next_cursor == cursor;
            self.has_more = page.has_more && !stalled;
            self.cursor = page.next_cursor;
            self.buffer.extend(page.data);
        }
        Ok(())
    }
}

impl<T, E> std::fmt::Debug for Paginator<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("buffered", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("has_more", &self.has_more)
            .field("done", &self.done)
            .field("pages_fetched", &self.pages_fetched)
            .finish()
    }
}
