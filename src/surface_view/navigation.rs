use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error};

use crate::error::{SurfaceError, panic_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Deny,
}

/// Votes on a navigation request before the native surface follows it.
pub trait NavigationHandler: Send + Sync {
    fn handle_navigation(&self, url: &str) -> NavigationDecision;
}

impl<F> NavigationHandler for F
where
    F: Fn(&str) -> NavigationDecision + Send + Sync,
{
    fn handle_navigation(&self, url: &str) -> NavigationDecision {
        self(url)
    }
}

pub type NavigationHandlerRef = Arc<dyn NavigationHandler>;

fn same_handler(a: &NavigationHandlerRef, b: &NavigationHandlerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Outcome of one evaluation, including any handler that panicked.
#[derive(Debug)]
pub struct NavigationVerdict {
    pub permitted: bool,
    pub failures: Vec<SurfaceError>,
}

/// Priority-ordered veto chain.
///
/// Buckets are kept sorted by ascending priority and visited in that order.
/// Order inside a bucket is unspecified: handlers sharing a priority are
/// expected to be independent. The first `Deny` ends the evaluation.
#[derive(Clone, Default)]
pub struct NavigationInterceptorChain {
    buckets: Vec<(i32, Vec<NavigationHandlerRef>)>,
}

impl NavigationInterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the handler was already registered at `priority`.
    pub fn register(&mut self, priority: i32, handler: NavigationHandlerRef) -> bool {
        match self.buckets.binary_search_by_key(&priority, |(p, _)| *p) {
            Ok(idx) => {
                let bucket = &mut self.buckets[idx].1;
                if bucket.iter().any(|h| same_handler(h, &handler)) {
                    return false;
                }
                bucket.push(handler);
            }
            Err(idx) => self.buckets.insert(idx, (priority, vec![handler])),
        }
        true
    }

    /// Removes the handler from `priority`, dropping the bucket once it is empty.
    pub fn unregister(&mut self, priority: i32, handler: &NavigationHandlerRef) -> bool {
        let Ok(idx) = self.buckets.binary_search_by_key(&priority, |(p, _)| *p) else {
            return false;
        };
        let bucket = &mut self.buckets[idx].1;
        let before = bucket.len();
        bucket.retain(|h| !same_handler(h, handler));
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.buckets.remove(idx);
        }
        removed
    }

    pub fn priorities(&self) -> Vec<i32> {
        self.buckets.iter().map(|(p, _)| *p).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// `true` when every visited handler allows `url`; an empty chain allows everything.
    pub fn evaluate(&self, url: &str) -> bool {
        self.evaluate_verbose(url).permitted
    }

    /// Like [`evaluate`](Self::evaluate), but also reports panicking handlers,
    /// each of which counts as a `Deny`.
    pub fn evaluate_verbose(&self, url: &str) -> NavigationVerdict {
        for (priority, bucket) in &self.buckets {
            for handler in bucket {
                let decision =
                    panic::catch_unwind(AssertUnwindSafe(|| handler.handle_navigation(url)));
                match decision {
                    Ok(NavigationDecision::Allow) => {}
                    Ok(NavigationDecision::Deny) => {
                        debug!("[Navigation] '{}' denied at priority {}", url, priority);
                        return NavigationVerdict {
                            permitted: false,
                            failures: Vec::new(),
                        };
                    }
                    Err(payload) => {
                        let detail = panic_message(payload.as_ref());
                        error!(
                            "[Navigation] Handler at priority {} panicked on '{}': {}",
                            priority, url, detail
                        );
                        return NavigationVerdict {
                            permitted: false,
                            failures: vec![SurfaceError::ListenerPanicked {
                                listener: "navigation handler",
                                detail,
                            }],
                        };
                    }
                }
            }
        }
        NavigationVerdict {
            permitted: true,
            failures: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn allow() -> NavigationHandlerRef {
        Arc::new(|_: &str| NavigationDecision::Allow)
    }

    fn deny() -> NavigationHandlerRef {
        Arc::new(|_: &str| NavigationDecision::Deny)
    }

    #[test]
    fn empty_chain_permits() {
        assert!(NavigationInterceptorChain::new().evaluate("https://anything"));
    }

    #[test]
    fn deny_at_a_later_priority_still_wins() {
        let mut chain = NavigationInterceptorChain::new();
        chain.register(0, allow());
        chain.register(5, deny());
        assert!(!chain.evaluate("http://x"));
    }

    #[test]
    fn allow_and_deny_at_same_priority_denies() {
        let mut chain = NavigationInterceptorChain::new();
        chain.register(0, deny());
        chain.register(0, allow());
        assert!(!chain.evaluate("http://x"));

        let mut chain = NavigationInterceptorChain::new();
        chain.register(0, allow());
        chain.register(0, deny());
        assert!(!chain.evaluate("http://x"));
    }

    #[test]
    fn priorities_are_visited_in_ascending_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut chain = NavigationInterceptorChain::new();
        for priority in [10, -3, 4] {
            let order = order.clone();
            chain.register(
                priority,
                Arc::new(move |_: &str| {
                    order.lock().push(priority);
                    NavigationDecision::Allow
                }),
            );
        }
        assert!(chain.evaluate("https://example.com"));
        assert_eq!(*order.lock(), vec![-3, 4, 10]);
        assert_eq!(chain.priorities(), vec![-3, 4, 10]);
    }

    #[test]
    fn first_deny_short_circuits() {
        let later_ran = Arc::new(Mutex::new(false));
        let flag = later_ran.clone();
        let mut chain = NavigationInterceptorChain::new();
        chain.register(1, deny());
        chain.register(
            2,
            Arc::new(move |_: &str| {
                *flag.lock() = true;
                NavigationDecision::Allow
            }),
        );
        assert!(!chain.evaluate("https://example.com"));
        assert!(!*later_ran.lock());
    }

    #[test]
    fn url_reaches_handlers() {
        let mut chain = NavigationInterceptorChain::new();
        chain.register(
            0,
            Arc::new(|url: &str| {
                if url.starts_with("https://") {
                    NavigationDecision::Allow
                } else {
                    NavigationDecision::Deny
                }
            }),
        );
        assert!(chain.evaluate("https://example.com"));
        assert!(!chain.evaluate("file:///etc/passwd"));
    }

    #[test]
    fn unregister_drops_empty_buckets() {
        let mut chain = NavigationInterceptorChain::new();
        let h = deny();
        assert!(chain.register(3, h.clone()));
        assert!(!chain.register(3, h.clone()));
        assert!(!chain.unregister(4, &h));
        assert!(chain.unregister(3, &h));
        assert!(chain.is_empty());
        assert!(chain.evaluate("http://x"));
    }

    #[test]
    fn panicking_handler_counts_as_deny() {
        let mut chain = NavigationInterceptorChain::new();
        chain.register(0, Arc::new(|_: &str| -> NavigationDecision { panic!("bad handler") }));
        let verdict = chain.evaluate_verbose("http://x");
        assert!(!verdict.permitted);
        assert_eq!(verdict.failures.len(), 1);
    }
}
