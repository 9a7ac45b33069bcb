//! Aggregator view state.
//!
//! The view owns the current query, the fetch result and a generation counter.
//! Events are applied through [`AggregatorView::apply`]; any event that changes
//! the query hands back a [`FetchRequest`] for the caller to run, and the
//! completion is fed back as [`ViewEvent::Settled`] carrying the same tag.

use tracing::{debug, error};

use crate::article::{Article, Category, QueryState};
use crate::fetcher::{FetchError, FETCH_FAILED_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTag(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Loading,
    Success(Vec<Article>),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub tag: RequestTag,
    pub query: QueryState,
}

#[derive(Debug)]
pub enum ViewEvent {
    Mount,
    SelectCategory(Category),
    SubmitQuery(String),
    Settled {
        tag: RequestTag,
        outcome: Result<Vec<Article>, FetchError>,
    },
}

#[derive(Debug)]
pub struct AggregatorView {
    query: QueryState,
    result: FetchResult,
    generation: u64,
    mounted: bool,
}

impl Default for AggregatorView {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorView {
    pub fn new() -> Self {
        Self {
            query: QueryState::default(),
            result: FetchResult::Loading,
            generation: 0,
            mounted: false,
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn result(&self) -> &FetchResult {
        &self.result
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn current_tag(&self) -> RequestTag {
        RequestTag(self.generation)
    }

    pub fn apply(&mut self, event: ViewEvent) -> Option<FetchRequest> {
        match event {
            ViewEvent::Mount => {
                if self.mounted {
                    return None;
                }
                self.mounted = true;
                Some(self.begin_fetch())
            }
            ViewEvent::SelectCategory(category) => {
                if category == self.query.category {
                    return None;
                }
                self.query.category = category;
                Some(self.begin_fetch())
            }
            ViewEvent::SubmitQuery(query) => {
                if query == self.query.query {
                    return None;
                }
                self.query.query = query;
                Some(self.begin_fetch())
            }
            ViewEvent::Settled { tag, outcome } => {
                self.settle(tag, outcome);
                None
            }
        }
    }

    fn begin_fetch(&mut self) -> FetchRequest {
        self.generation += 1;
        self.result = FetchResult::Loading;
        FetchRequest {
            tag: self.current_tag(),
            query: self.query.clone(),
        }
    }

    fn settle(&mut self, tag: RequestTag, outcome: Result<Vec<Article>, FetchError>) {
        if tag != self.current_tag() {
            debug!(
                "Discarding stale fetch result {:?} (current {:?})",
                tag,
                self.current_tag()
            );
            return;
        }

        self.result = match outcome {
            Ok(articles) => FetchResult::Success(articles),
            Err(e) => {
                error!(
                    "Failed to fetch news for category '{}' query '{}': {}",
                    self.query.category, self.query.query, e
                );
                FetchResult::Failure(FETCH_FAILED_MESSAGE.to_string())
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            description: None,
            url: format!("https://news.example.com/{}", title),
            url_to_image: None,
        }
    }

    fn settle(view: &mut AggregatorView, request: &FetchRequest, articles: Vec<Article>) {
        view.apply(ViewEvent::Settled {
            tag: request.tag,
            outcome: Ok(articles),
        });
    }

    mod mount_tests {
        use super::*;

        #[test]
        fn test_initial_state_is_loading() {
            let view = AggregatorView::new();
            assert_eq!(view.result(), &FetchResult::Loading);
            assert!(!view.is_mounted());
            assert_eq!(view.query(), &QueryState::default());
        }

        #[test]
        fn test_mount_issues_fetch_for_defaults() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();

            assert!(view.is_mounted());
            assert_eq!(request.query.category, Category::General);
            assert_eq!(request.query.query, "");
            assert_eq!(request.tag, view.current_tag());
        }

        #[test]
        fn test_second_mount_is_noop() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();
            settle(&mut view, &request, vec![article("a")]);

            assert!(view.apply(ViewEvent::Mount).is_none());
            assert_eq!(view.result(), &FetchResult::Success(vec![article("a")]));
        }
    }

    mod transition_tests {
        use super::*;

        #[test]
        fn test_category_change_resets_to_loading() {
            let mut view = AggregatorView::new();
            let first = view.apply(ViewEvent::Mount).unwrap();
            settle(&mut view, &first, vec![article("a")]);

            let request = view
                .apply(ViewEvent::SelectCategory(Category::Sports))
                .unwrap();

            assert_eq!(view.result(), &FetchResult::Loading);
            assert_eq!(request.query.category, Category::Sports);
            assert!(request.tag > first.tag);
        }

        #[test]
        fn test_same_category_does_not_refetch() {
            let mut view = AggregatorView::new();
            let first = view.apply(ViewEvent::Mount).unwrap();
            settle(&mut view, &first, vec![]);

            assert!(view
                .apply(ViewEvent::SelectCategory(Category::General))
                .is_none());
            assert_eq!(view.result(), &FetchResult::Success(vec![]));
        }

        #[test]
        fn test_query_submit_keeps_category() {
            let mut view = AggregatorView::new();
            view.apply(ViewEvent::Mount);
            view.apply(ViewEvent::SelectCategory(Category::Health));

            let request = view
                .apply(ViewEvent::SubmitQuery("flu".to_string()))
                .unwrap();

            assert_eq!(request.query.category, Category::Health);
            assert_eq!(request.query.query, "flu");
            assert_eq!(view.query().query, "flu");
        }

        #[test]
        fn test_clearing_query_refetches() {
            let mut view = AggregatorView::new();
            view.apply(ViewEvent::Mount);
            view.apply(ViewEvent::SubmitQuery("flu".to_string()));

            let request = view.apply(ViewEvent::SubmitQuery(String::new())).unwrap();
            assert_eq!(request.query.query, "");
        }

        #[test]
        fn test_success_then_loading_then_failure() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();
            assert_eq!(view.result(), &FetchResult::Loading);

            settle(&mut view, &request, vec![article("a"), article("b")]);
            match view.result() {
                FetchResult::Success(articles) => assert_eq!(articles.len(), 2),
                other => panic!("expected success, got {:?}", other),
            }

            let request = view
                .apply(ViewEvent::SelectCategory(Category::Business))
                .unwrap();
            view.apply(ViewEvent::Settled {
                tag: request.tag,
                outcome: Err(FetchError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR)),
            });

            assert_eq!(
                view.result(),
                &FetchResult::Failure(FETCH_FAILED_MESSAGE.to_string())
            );
        }

        #[test]
        fn test_parse_failure_uses_generic_message() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();
            let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();

            view.apply(ViewEvent::Settled {
                tag: request.tag,
                outcome: Err(FetchError::Parse(parse_error)),
            });

            assert_eq!(
                view.result(),
                &FetchResult::Failure("Error fetching news. Please try again later.".to_string())
            );
        }

        #[test]
        fn test_second_settle_for_same_tag_replaces_result() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();
            settle(&mut view, &request, vec![article("a")]);
            settle(&mut view, &request, vec![article("b")]);

            assert_eq!(view.result(), &FetchResult::Success(vec![article("b")]));
        }
    }

    mod logging_tests {
        use super::*;
        use std::io;
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        /// Collects formatted log lines in memory
        #[derive(Clone, Default)]
        struct LogBuffer(Arc<Mutex<Vec<u8>>>);

        impl LogBuffer {
            fn contents(&self) -> String {
                String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
            }
        }

        impl io::Write for LogBuffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for LogBuffer {
            type Writer = LogBuffer;

            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        fn capture_logs(f: impl FnOnce()) -> String {
            let buffer = LogBuffer::default();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(buffer.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            tracing::subscriber::with_default(subscriber, f);
            buffer.contents()
        }

        #[test]
        fn test_failure_cause_is_logged() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();

            let logs = capture_logs(|| {
                view.apply(ViewEvent::Settled {
                    tag: request.tag,
                    outcome: Err(FetchError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR)),
                });
            });

            assert!(logs.contains("ERROR"));
            assert!(logs.contains("HTTP 500 Internal Server Error"));
            assert_eq!(
                view.result(),
                &FetchResult::Failure(FETCH_FAILED_MESSAGE.to_string())
            );
        }

        #[test]
        fn test_success_logs_no_error() {
            let mut view = AggregatorView::new();
            let request = view.apply(ViewEvent::Mount).unwrap();

            let logs = capture_logs(|| {
                settle(&mut view, &request, vec![article("a")]);
            });

            assert!(!logs.contains("ERROR"));
        }

        #[test]
        fn test_stale_failure_not_logged_as_error() {
            let mut view = AggregatorView::new();
            let old = view.apply(ViewEvent::Mount).unwrap();
            view.apply(ViewEvent::SubmitQuery("rust".to_string()));

            let logs = capture_logs(|| {
                view.apply(ViewEvent::Settled {
                    tag: old.tag,
                    outcome: Err(FetchError::HttpStatus(StatusCode::BAD_GATEWAY)),
                });
            });

            assert!(!logs.contains("ERROR"));
            assert!(logs.contains("Discarding stale fetch result"));
        }
    }

    mod stale_result_tests {
        use super::*;

        #[test]
        fn test_stale_success_is_discarded() {
            let mut view = AggregatorView::new();
            let old = view.apply(ViewEvent::Mount).unwrap();
            let new = view
                .apply(ViewEvent::SubmitQuery("rust".to_string()))
                .unwrap();

            settle(&mut view, &old, vec![article("old")]);
            assert_eq!(view.result(), &FetchResult::Loading);

            settle(&mut view, &new, vec![article("new")]);
            assert_eq!(view.result(), &FetchResult::Success(vec![article("new")]));
        }

        #[test]
        fn test_late_stale_result_does_not_overwrite_fresh_one() {
            let mut view = AggregatorView::new();
            let old = view.apply(ViewEvent::Mount).unwrap();
            let new = view
                .apply(ViewEvent::SelectCategory(Category::Science))
                .unwrap();

            settle(&mut view, &new, vec![article("fresh")]);
            view.apply(ViewEvent::Settled {
                tag: old.tag,
                outcome: Err(FetchError::HttpStatus(StatusCode::BAD_GATEWAY)),
            });

            assert_eq!(view.result(), &FetchResult::Success(vec![article("fresh")]));
        }

        #[test]
        fn test_tags_increase_monotonically() {
            let mut view = AggregatorView::new();
            let mut tags = vec![view.apply(ViewEvent::Mount).unwrap().tag];
            for category in Category::ALL.iter().skip(1) {
                tags.push(
                    view.apply(ViewEvent::SelectCategory(*category))
                        .unwrap()
                        .tag,
                );
            }

            assert!(tags.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
