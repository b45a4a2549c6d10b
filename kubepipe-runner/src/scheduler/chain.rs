//! Sequential task composition
//!
//! A [`TaskChain`] runs continuations one after another on the tokio
//! runtime. Each continuation receives the settled result of its
//! predecessor, so a failure travels down the chain while every link still
//! gets to run.

use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{Result, RunError};

enum Link<T> {
    Settled(Result<T>),
    Running(JoinHandle<Result<T>>),
}

/// A chain of asynchronous steps producing a `T`
pub struct TaskChain<T> {
    link: Link<T>,
}

impl<T: Send + 'static> TaskChain<T> {
    /// A chain that has already produced `value`
    pub fn completed(value: T) -> Self {
        Self {
            link: Link::Settled(Ok(value)),
        }
    }

    /// Appends a continuation
    ///
    /// The continuation starts once the chain so far has settled. Fails
    /// with a composition error when there is no runtime to schedule it on.
    pub fn then<F, Fut>(self, label: &str, continuation: F) -> Result<Self>
    where
        F: FnOnce(Result<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| RunError::Composition {
            stage: label.to_string(),
            reason: e.to_string(),
        })?;

        let predecessor = self.link;
        let handle = runtime.spawn(async move {
            let settled = match predecessor {
                Link::Settled(result) => result,
                Link::Running(handle) => {
                    handle.await.unwrap_or_else(|e| Err(RunError::TaskFailed(e)))
                }
            };
            continuation(settled).await
        });

        Ok(Self {
            link: Link::Running(handle),
        })
    }

    /// Waits for the last link and returns its result
    pub async fn wait(self) -> Result<T> {
        match self.link {
            Link::Settled(result) => result,
            Link::Running(handle) => handle.await?,
        }
    }
}
