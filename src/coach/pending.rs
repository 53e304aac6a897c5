//! In-flight AI requests and per-feature request state

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::coach::{CoachError, Feature};

/// A spawned AI request that can be abandoned
///
/// Awaiting yields the feature's result. `cancel` aborts the underlying
/// task, as does dropping the handle, so a late reply is never applied.
pub struct PendingRequest<T> {
    feature: Feature,
    handle: Option<JoinHandle<Result<T, CoachError>>>,
}

impl<T: Send + 'static> PendingRequest<T> {
    pub fn spawn<F>(feature: Feature, request: F) -> Self
    where
        F: Future<Output = Result<T, CoachError>> + Send + 'static,
    {
        Self {
            feature,
            handle: Some(tokio::spawn(request)),
        }
    }
}

impl<T> PendingRequest<T> {
    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Cancelled pending {} request", self.feature);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_none()
    }
}

impl<T> Future for PendingRequest<T> {
    type Output = Result<T, CoachError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let feature = self.feature;
        let Some(handle) = self.handle.as_mut() else {
            return Poll::Ready(Err(CoachError::Cancelled { feature }));
        };

        match Pin::new(handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(joined) => {
                self.handle = None;
                Poll::Ready(match joined {
                    Ok(result) => result,
                    Err(e) if e.is_cancelled() => Err(CoachError::Cancelled { feature }),
                    Err(e) => Err(CoachError::Task {
                        feature,
                        reason: e.to_string(),
                    }),
                })
            }
        }
    }
}

impl<T> Drop for PendingRequest<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// What a feature shows once its request has settled
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureState<T> {
    Failed(String),
    Succeeded(T),
}

impl<T> FeatureState<T> {
    /// Settle a finished request; failures keep only the user-facing message
    pub fn from_result(result: Result<T, CoachError>) -> Self {
        match result {
            Ok(value) => FeatureState::Succeeded(value),
            Err(e) => FeatureState::Failed(e.user_message()),
        }
    }
}
