//! The mutator return protocol.

use crate::error::{BoxError, MutatorPanic};
use futures::future::{BoxFuture, FutureExt, TryFutureExt};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What a mutator hands back to the store.
///
/// Synchronous mutators return `Ready` (or `Failed`); asynchronous ones
/// return `Pending`. Which shape is accepted depends on the effective
/// `asynchronous` mode of the `set` call.
pub enum Mutation<S> {
    /// The next state.
    Ready(S),
    /// The mutator gave up; the store keeps its current state.
    Failed(BoxError),
    /// A future resolving to the next state.
    Pending(BoxFuture<'static, Result<S, BoxError>>),
}

impl<S> Mutation<S> {
    pub fn ready(state: S) -> Self {
        Mutation::Ready(state)
    }

    pub fn failed(cause: impl Into<BoxError>) -> Self {
        Mutation::Failed(cause.into())
    }

    /// Wrap a future as an asynchronous mutation.
    pub fn pending<F, E>(future: F) -> Self
    where
        S: 'static,
        F: Future<Output = Result<S, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Mutation::Pending(future.map_err(Into::<BoxError>::into).boxed())
    }

    /// Short name of the variant, for log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Ready(_) => "ready",
            Mutation::Failed(_) => "failed",
            Mutation::Pending(_) => "pending",
        }
    }
}

impl<S, E> From<std::result::Result<S, E>> for Mutation<S>
where
    E: Into<BoxError>,
{
    fn from(result: std::result::Result<S, E>) -> Self {
        match result {
            Ok(state) => Mutation::Ready(state),
            Err(e) => Mutation::Failed(e.into()),
        }
    }
}

impl<S> std::fmt::Debug for Mutation<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mutation::Failed(cause) => f.debug_tuple("Failed").field(cause).finish(),
            other => write!(f, "Mutation::{}", other.kind()),
        }
    }
}

/// Run a mutator against `state`, turning a panic into a `Failed` mutation.
pub(crate) fn invoke<S, F>(mutator: F, state: &S) -> Mutation<S>
where
    F: FnOnce(&S) -> Mutation<S>,
{
    match catch_unwind(AssertUnwindSafe(|| mutator(state))) {
        Ok(mutation) => mutation,
        Err(payload) => Mutation::Failed(Box::new(MutatorPanic::from_payload(payload.as_ref()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_ready() {
        let mutation = invoke(|x: &i32| Mutation::ready(x + 1), &1);
        assert!(matches!(mutation, Mutation::Ready(2)));
    }

    #[test]
    fn test_invoke_catches_panic() {
        let mutation = invoke(|_: &i32| -> Mutation<i32> { panic!("nope") }, &1);
        match mutation {
            Mutation::Failed(cause) => assert_eq!(cause.to_string(), "mutator panicked: nope"),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_from_result() {
        let ok: Mutation<i32> = Ok::<_, std::io::Error>(3).into();
        assert_eq!(ok.kind(), "ready");

        let err: Mutation<i32> = Err::<i32, _>("bad input").into();
        assert_eq!(err.kind(), "failed");
    }

    #[tokio::test]
    async fn test_pending_maps_error() {
        let mutation: Mutation<i32> =
            Mutation::pending(async { Err::<i32, _>(std::io::Error::other("late")) });
        match mutation {
            Mutation::Pending(future) => {
                let err = future.await.unwrap_err();
                assert_eq!(err.to_string(), "late");
            }
            other => panic!("Expected Pending, got {:?}", other),
        }
    }
}
