//! Cursor walking.

use std::future::Future;

use tracing::warn;

use crate::api::Page;

/// Walks a cursor-paginated listing one page at a time.
///
/// `fetch` receives `None` for the first page and the previous page's
/// `next_cursor` afterwards. The walk ends when a page reports
/// `has_more = false` or the caller calls [`stop`](Self::stop); cursor
/// nullness alone never ends it, except that a page claiming more results
/// without a cursor is treated as the last one.
pub struct Paginator<F> {
    fetch: F,
    cursor: Option<String>,
    done: bool,
    pages: u32,
}

impl<F> Paginator<F> {
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            cursor: None,
            done: false,
            pages: 0,
        }
    }

    /// Fetch the next page, or `None` once the walk is over.
    pub async fn next_page<T, E, Fut>(&mut self) -> Result<Option<Page<T>>, E>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        if self.done {
            return Ok(None);
        }

        let page = (self.fetch)(self.cursor.take()).await?;
        self.pages += 1;

        match (page.has_more, &page.next_cursor) {
            (true, Some(cursor)) => self.cursor = Some(cursor.clone()),
            (true, None) => {
                warn!(page = self.pages, "Page reported more results without a cursor");
                self.done = true;
            }
            (false, _) => self.done = true,
        }

        Ok(Some(page))
    }

    /// End the walk early; the next call to `next_page` returns `None`.
    pub fn stop(&mut self) {
        self.done = true;
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    fn page(items: &[u32], next: Option<&str>) -> Page<u32> {
        Page {
            items: items.to_vec(),
            has_more: next.is_some(),
            next_cursor: next.map(str::to_string),
            total_count: None,
            total_is_exact: false,
        }
    }

    type Script = Arc<Mutex<VecDeque<Page<u32>>>>;

    fn scripted(pages: Vec<Page<u32>>) -> (Script, Arc<Mutex<Vec<Option<String>>>>) {
        (
            Arc::new(Mutex::new(pages.into())),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    #[tokio::test]
    async fn visits_every_item_once_in_order() {
        let (script, cursors) = scripted(vec![
            page(&[1, 2], Some("c1")),
            page(&[3, 4], Some("c2")),
            page(&[5], None),
        ]);
        let seen_cursors = Arc::clone(&cursors);
        let mut pages = Paginator::new(move |cursor: Option<String>| {
            seen_cursors.lock().unwrap().push(cursor);
            let next = script.lock().unwrap().pop_front();
            async move { next.ok_or("script exhausted") }
        });

        let mut items = Vec::new();
        while let Some(page) = pages.next_page().await.unwrap() {
            items.extend(page.items);
        }

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(pages.pages(), 3);
        assert_eq!(
            *cursors.lock().unwrap(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn has_more_false_ends_the_walk_even_with_a_cursor() {
        let mut last = page(&[1], None);
        last.next_cursor = Some("stale".into());
        let (script, _) = scripted(vec![last, page(&[2], None)]);
        let mut pages = Paginator::new(move |_cursor: Option<String>| {
            let next = script.lock().unwrap().pop_front();
            async move { next.ok_or("script exhausted") }
        });

        assert!(pages.next_page().await.unwrap().is_some());
        assert!(pages.next_page().await.unwrap().is_none());
        assert_eq!(pages.pages(), 1);
    }

    #[tokio::test]
    async fn missing_cursor_with_more_results_stops() {
        let mut broken = page(&[1], None);
        broken.has_more = true;
        let (script, _) = scripted(vec![broken, page(&[2], None)]);
        let mut pages = Paginator::new(move |_cursor: Option<String>| {
            let next = script.lock().unwrap().pop_front();
            async move { next.ok_or("script exhausted") }
        });

        assert!(pages.next_page().await.unwrap().is_some());
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_ends_the_walk_early() {
        let (script, _) = scripted(vec![page(&[1], Some("c1")), page(&[2], None)]);
        let mut pages = Paginator::new(move |_cursor: Option<String>| {
            let next = script.lock().unwrap().pop_front();
            async move { next.ok_or("script exhausted") }
        });

        assert!(pages.next_page().await.unwrap().is_some());
        pages.stop();
        assert!(pages.is_done());
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let mut pages =
            Paginator::new(|_cursor: Option<String>| async { Err::<Page<u32>, _>("boom") });
        assert_eq!(pages.next_page().await.unwrap_err(), "boom");
    }
}
