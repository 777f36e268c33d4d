//! Drives repeated tracker searches until every matching ticket is read.

use std::time::Duration;

use crate::error::{EngineError, SourceError};
use crate::models::{Ticket, TicketQuery};
use crate::sources::IssueTracker;

/// Read all pages of `query`, in response order.
///
/// Each page reports the grand total. The next page starts after the records
/// already consumed and the loop stops once nothing remains. A failed page
/// aborts with [`EngineError::IncompleteResult`] carrying what was read so far.
pub async fn accumulate(
    tracker: &dyn IssueTracker,
    query: &TicketQuery,
    page_size: usize,
    timeout: Duration,
) -> Result<Vec<Ticket>, EngineError> {
    let mut collected: Vec<Ticket> = Vec::new();
    let mut start_at = 0usize;

    loop {
        let page = match tokio::time::timeout(timeout, tracker.search(query, start_at, page_size)).await {
            Ok(Ok(page)) => page,
            Ok(Err(source)) => return Err(incomplete(collected, source)),
            Err(_) => {
                return Err(incomplete(
                    collected,
                    SourceError::Timeout("tracker search page".to_string()),
                ))
            }
        };

        let consumed = page.tickets.len();
        let remaining = page.total as i64 - start_at as i64 - consumed as i64;
        tracing::debug!(start_at, consumed, total = page.total, remaining, "Read tracker page");
        collected.extend(page.tickets);

        if remaining <= 0 {
            return Ok(collected);
        }
        if consumed == 0 {
            return Err(incomplete(
                collected,
                SourceError::Parse(format!(
                    "tracker returned an empty page at {} of {}",
                    start_at, page.total
                )),
            ));
        }
        start_at += consumed;
    }
}

fn incomplete(collected: Vec<Ticket>, source: SourceError) -> EngineError {
    tracing::error!(
        collected = collected.len(),
        "Tracker search aborted before all pages were read: {}",
        source
    );
    EngineError::IncompleteResult { collected, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use futures::future::BoxFuture;

    use crate::models::TicketPage;

    /// Serves `total` numbered tickets and records every `start_at` it sees.
    struct PagedTracker {
        total: usize,
        fail_at: Option<usize>,
        requests: Mutex<Vec<usize>>,
    }

    impl PagedTracker {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_at: None,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn ticket(n: usize) -> Ticket {
        Ticket {
            key: format!("WEB-{}", n),
            epic_key: None,
            git_tags: Vec::new(),
            summary: String::new(),
            status: "Open".to_string(),
            author: "Dana".to_string(),
            updated: String::new(),
            url: String::new(),
        }
    }

    impl IssueTracker for PagedTracker {
        fn search<'a>(
            &'a self,
            _query: &'a TicketQuery,
            start_at: usize,
            page_size: usize,
        ) -> BoxFuture<'a, Result<TicketPage, SourceError>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(start_at);
                if self.fail_at == Some(start_at) {
                    return Err(SourceError::Status {
                        status: 500,
                        body: "boom".to_string(),
                    });
                }
                let end = (start_at + page_size).min(self.total);
                Ok(TicketPage {
                    total: self.total,
                    tickets: (start_at..end).map(ticket).collect(),
                })
            })
        }

        fn unknown_keys<'a>(&'a self, _keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, SourceError>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn create_filter<'a>(
            &'a self,
            _name: &'a str,
            _query: &'a TicketQuery,
        ) -> BoxFuture<'a, Result<String, SourceError>> {
            Box::pin(async { Ok(String::new()) })
        }
    }

    fn query() -> TicketQuery {
        TicketQuery::keys(vec!["WEB-1".to_string()])
    }

    #[tokio::test]
    async fn reads_every_page() {
        let tracker = PagedTracker::new(250);

        let tickets = accumulate(&tracker, &query(), 100, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(tickets.len(), 250);
        assert_eq!(*tracker.requests.lock().unwrap(), vec![0, 100, 200]);
        assert_eq!(tickets[249].key, "WEB-249");
    }

    #[tokio::test]
    async fn single_request_when_everything_fits() {
        let tracker = PagedTracker::new(40);

        let tickets = accumulate(&tracker, &query(), 100, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(tickets.len(), 40);
        assert_eq!(*tracker.requests.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn empty_result_is_a_single_request() {
        let tracker = PagedTracker::new(0);

        let tickets = accumulate(&tracker, &query(), 100, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(tickets.is_empty());
        assert_eq!(tracker.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_page_returns_partial_result_with_error() {
        let mut tracker = PagedTracker::new(250);
        tracker.fail_at = Some(200);

        let err = accumulate(&tracker, &query(), 100, Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            EngineError::IncompleteResult { collected, source } => {
                assert_eq!(collected.len(), 200);
                assert!(matches!(source, SourceError::Status { status: 500, .. }));
            }
            other => panic!("expected incomplete result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn smaller_pages_than_requested_advance_by_consumed_count() {
        struct CappedTracker(PagedTracker);

        impl IssueTracker for CappedTracker {
            fn search<'a>(
                &'a self,
                query: &'a TicketQuery,
                start_at: usize,
                _page_size: usize,
            ) -> BoxFuture<'a, Result<TicketPage, SourceError>> {
                self.0.search(query, start_at, 50)
            }

            fn unknown_keys<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, SourceError>> {
                self.0.unknown_keys(keys)
            }

            fn create_filter<'a>(
                &'a self,
                name: &'a str,
                query: &'a TicketQuery,
            ) -> BoxFuture<'a, Result<String, SourceError>> {
                self.0.create_filter(name, query)
            }
        }

        let tracker = CappedTracker(PagedTracker::new(120));

        let tickets = accumulate(&tracker, &query(), 100, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(tickets.len(), 120);
        assert_eq!(*tracker.0.requests.lock().unwrap(), vec![0, 50, 100]);
    }
}
