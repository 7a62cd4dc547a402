//! Values that only exist once provisioning operations complete.
//!
//! A [`Deferred`] is a handle, not a value. The core wires handles
//! together with [`Deferred::map`], [`Deferred::try_map`], [`join`],
//! [`join3`] and [`join_all`]; only the engine boundary ever calls
//! [`Deferred::resolve`].
//!
//! ```
//! use ponte::deferred::{self, Deferred};
//!
//! let url = Deferred::resolved("https://host/api/".to_string());
//! let tenant = Deferred::resolved("tenant-123".to_string());
//!
//! let line = deferred::join(url, tenant)
//!     .map(|(url, tenant)| format!("url={url};tenant={tenant}"));
//!
//! let text = futures::executor::block_on(line.resolve()).unwrap();
//! assert_eq!(text, "url=https://host/api/;tenant=tenant-123");
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared, try_join_all};

use crate::error::{DeployError, DeployResult};

type Resolution<T> = Shared<BoxFuture<'static, DeployResult<T>>>;

/// A typed handle to a value produced by one or more upstream
/// operations.
///
/// The underlying computation runs at most once no matter how many
/// clones of the handle are awaited. The secrecy flag is sticky:
/// every value derived from a secret handle is secret too.
pub struct Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    resolution: Resolution<T>,
    producers: Arc<BTreeSet<String>>,
    secret: bool,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A handle that is already resolved. Has no producers.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self::from_parts(BTreeSet::new(), false, async move { Ok(value) })
    }

    /// A handle whose producer has already failed.
    #[must_use]
    pub fn failed(err: DeployError) -> Self {
        Self::from_parts(BTreeSet::new(), false, async move { Err(err) })
    }

    /// Wrap the future of a single producing operation.
    pub fn from_future<F>(producer: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = DeployResult<T>> + Send + 'static,
    {
        let producers = BTreeSet::from([producer.into()]);
        Self::from_parts(producers, false, future)
    }

    pub(crate) fn from_parts<F>(producers: BTreeSet<String>, secret: bool, future: F) -> Self
    where
        F: Future<Output = DeployResult<T>> + Send + 'static,
    {
        Self {
            resolution: future.boxed().shared(),
            producers: Arc::new(producers),
            secret,
        }
    }

    /// Mark the handle secret. There is no way to clear the flag.
    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    #[must_use]
    pub const fn is_secret(&self) -> bool {
        self.secret
    }

    /// Names of the operations this value waits on.
    pub fn producers(&self) -> impl Iterator<Item = &str> {
        self.producers.iter().map(String::as_str)
    }

    /// Apply `f` to the resolved value.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let Self {
            resolution,
            producers,
            secret,
        } = self;
        Deferred {
            resolution: async move { resolution.await.map(f) }.boxed().shared(),
            producers,
            secret,
        }
    }

    /// Apply a fallible `f` to the resolved value.
    #[must_use]
    pub fn try_map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> DeployResult<U> + Send + 'static,
    {
        let Self {
            resolution,
            producers,
            secret,
        } = self;
        Deferred {
            resolution: async move { resolution.await.and_then(f) }.boxed().shared(),
            producers,
            secret,
        }
    }

    /// Materialize the value.
    ///
    /// Only the boundary that hands final data to a provisioning
    /// engine or a content store calls this.
    pub async fn resolve(self) -> DeployResult<T> {
        self.resolution.await
    }
}

impl<T> Clone for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            resolution: self.resolution.clone(),
            producers: Arc::clone(&self.producers),
            secret: self.secret,
        }
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("producers", &self.producers)
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}

impl<T> From<T> for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Self::resolved(value)
    }
}

fn union<'a>(sets: impl IntoIterator<Item = &'a BTreeSet<String>>) -> BTreeSet<String> {
    sets.into_iter().flatten().cloned().collect()
}

/// Resolve once both inputs have resolved.
#[must_use]
pub fn join<A, B>(a: Deferred<A>, b: Deferred<B>) -> Deferred<(A, B)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let producers = union([a.producers.as_ref(), b.producers.as_ref()]);
    let secret = a.secret || b.secret;
    Deferred::from_parts(producers, secret, async move {
        futures::try_join!(a.resolution, b.resolution)
    })
}

/// Resolve once all three inputs have resolved.
#[must_use]
pub fn join3<A, B, C>(a: Deferred<A>, b: Deferred<B>, c: Deferred<C>) -> Deferred<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    let producers = union([
        a.producers.as_ref(),
        b.producers.as_ref(),
        c.producers.as_ref(),
    ]);
    let secret = a.secret || b.secret || c.secret;
    Deferred::from_parts(producers, secret, async move {
        futures::try_join!(a.resolution, b.resolution, c.resolution)
    })
}

/// Resolve once every handle has resolved, preserving input order.
/// An empty input resolves immediately to an empty vector.
#[must_use]
pub fn join_all<T>(handles: Vec<Deferred<T>>) -> Deferred<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let producers = union(handles.iter().map(|h| h.producers.as_ref()));
    let secret = handles.iter().any(Deferred::is_secret);
    let futures: Vec<_> = handles.into_iter().map(|h| h.resolution).collect();
    Deferred::from_parts(producers, secret, try_join_all(futures))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn map_applies_function() {
        let d = Deferred::resolved(20).map(|n| n + 1);

        assert_eq!(d.resolve().await.unwrap(), 21);
    }

    #[tokio::test]
    async fn map_preserves_secrecy_and_producers() {
        let d = Deferred::from_future("app::key", async { Ok("k".to_string()) })
            .secret()
            .map(|k| k.len());

        assert!(d.is_secret());
        assert_eq!(d.producers().collect::<Vec<_>>(), vec!["app::key"]);
    }

    #[tokio::test]
    async fn join_is_secret_if_any_input_is() {
        let plain = Deferred::resolved(1);
        let hidden = Deferred::resolved(2).secret();

        let joined = join(plain, hidden);

        assert!(joined.is_secret());
        assert_eq!(joined.resolve().await.unwrap(), (1, 2));
    }

    #[tokio::test]
    async fn join_unions_producers() {
        let a = Deferred::from_future("a", async { Ok(1) });
        let b = Deferred::from_future("b", async { Ok(2) });
        let c = Deferred::from_future("a", async { Ok(3) });

        let joined = join3(a, b, c);

        assert_eq!(joined.producers().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn join_propagates_failure() {
        let ok = Deferred::resolved("https://host/api/".to_string());
        let bad: Deferred<String> = Deferred::failed(DeployError::upstream("tenant", "boom"));

        let err = join(ok, bad).resolve().await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::UpstreamResolution { ref producer, .. } if producer == "tenant"
        ));
    }

    #[tokio::test]
    async fn try_map_failure_surfaces() {
        let d = Deferred::resolved(1).try_map(|_| -> DeployResult<i32> {
            Err(DeployError::Other("nope".into()))
        });

        assert_eq!(d.resolve().await.unwrap_err().to_string(), "nope");
    }

    #[tokio::test]
    async fn join_all_keeps_order() {
        let handles = vec![
            Deferred::resolved("x".to_string()),
            Deferred::resolved("y".to_string()),
        ];

        let all = join_all(handles).resolve().await.unwrap();

        assert_eq!(all, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn join_all_empty() {
        let all = join_all(Vec::<Deferred<u8>>::new()).resolve().await.unwrap();

        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn resolves_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let d = Deferred::from_future("op", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        });

        let left = d.clone().map(|n| n * 2);
        let right = d.map(|n| n * 3);

        assert_eq!(join(left, right).resolve().await.unwrap(), (14, 21));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_hides_value() {
        let d = Deferred::resolved("hunter2".to_string()).secret();

        let shown = format!("{d:?}");

        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("secret: true"));
    }
}
