use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::types::TaxonId;
use crate::error::LookupError;
use crate::resolver::{IdResolver, Resolution, ResolvedTaxon};

/// Wraps a resolver so that every call gives up after a fixed duration.
///
/// The wrapped call keeps running on its worker thread after a timeout; its
/// result is discarded.
pub struct TimedResolver {
    inner: Arc<dyn IdResolver>,
    timeout: Duration,
}

impl TimedResolver {
    pub fn new(inner: Arc<dyn IdResolver>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn call<K, T, F>(&self, keys: &[K], f: F) -> Result<Vec<T>, LookupError>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
        F: FnOnce(&dyn IdResolver, &[K]) -> Result<Vec<T>, LookupError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let keys = keys.to_vec();

        thread::spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(f(inner.as_ref(), &keys));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    resolver = self.inner.name(),
                    timeout = ?self.timeout,
                    "Resolver call timed out"
                );
                Err(LookupError::Timeout(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(LookupError::Resolver(format!(
                "{} resolver worker terminated unexpectedly",
                self.inner.name()
            ))),
        }
    }
}

impl IdResolver for TimedResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn resolve_by_name(&self, names: &[String]) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        self.call(names, |resolver, keys| resolver.resolve_by_name(keys))
    }

    fn resolve_lineage(
        &self,
        ids: &[TaxonId],
    ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError> {
        self.call(ids, |resolver, keys| resolver.resolve_lineage(keys))
    }

    fn resolve_id_from_item_id(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        self.call(item_ids, |resolver, keys| {
            resolver.resolve_id_from_item_id(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::null::NullResolver;

    struct SlowResolver(Duration);

    impl IdResolver for SlowResolver {
        fn name(&self) -> &str {
            "slow"
        }

        fn resolve_by_name(
            &self,
            names: &[String],
        ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
            thread::sleep(self.0);
            Ok(vec![Resolution::NotFound; names.len()])
        }

        fn resolve_lineage(
            &self,
            ids: &[TaxonId],
        ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError> {
            thread::sleep(self.0);
            Ok(vec![Resolution::NotFound; ids.len()])
        }

        fn resolve_id_from_item_id(
            &self,
            item_ids: &[String],
        ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
            thread::sleep(self.0);
            Ok(vec![Resolution::NotFound; item_ids.len()])
        }
    }

    #[test]
    fn test_slow_resolver_times_out() {
        let timeout = Duration::from_millis(20);
        let resolver = TimedResolver::new(Arc::new(SlowResolver(Duration::from_secs(2))), timeout);

        let result = resolver.resolve_by_name(&["Fungi".to_string()]);
        assert_eq!(result, Err(LookupError::Timeout(timeout)));
    }

    #[test]
    fn test_fast_resolver_passes_through() {
        let resolver = TimedResolver::new(Arc::new(NullResolver), Duration::from_secs(5));
        let result = resolver
            .resolve_lineage(&[TaxonId::from("4751")])
            .unwrap();
        assert_eq!(result, vec![Resolution::NotFound]);
        assert_eq!(resolver.name(), "none");
    }
}
