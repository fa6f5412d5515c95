//! Adapters plugging commands into a mediator pipeline.
//!
//! A mediator dispatches each request through pre-processors, behaviors and
//! post-processors around its handler. These adapters run a command at one
//! of those points:
//!
//! - [`RequestProcessor`]: before the handler, on the request
//! - [`ResponseProcessor`]: after the handler, on the response
//! - [`RequestBehavior`]: on the request, then the rest of the pipeline
//! - [`ResponseBehavior`]: the rest of the pipeline, then on the response
//!
//! The adapters hold commands as [`MessageCommand`] trait objects, so any
//! command kind can sit at any point.

use crate::command::MessageCommand;
use crate::error::{HookError, PipelineError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Continuation running the rest of the pipeline, handler included
pub type Next<'a, R> = Box<dyn FnOnce() -> BoxFuture<'a, Result<R, HookError>> + Send + 'a>;

/// Wrap a future as the continuation of a behavior
pub fn next<'a, R, F>(future: F) -> Next<'a, R>
where
    F: Future<Output = Result<R, HookError>> + Send + 'a,
{
    Box::new(move || future.boxed())
}

/// Runs a command on the request before the handler
pub struct RequestProcessor<Req> {
    command: Arc<dyn MessageCommand<Req>>,
}

impl<Req> RequestProcessor<Req>
where
    Req: Send + Sync + 'static,
{
    pub fn new(command: impl MessageCommand<Req> + 'static) -> Self {
        Self {
            command: Arc::new(command),
        }
    }

    pub async fn process(
        &self,
        request: &Req,
        signal: &CancellationToken,
    ) -> Result<(), PipelineError> {
        debug!(command = self.command.name(), "Running request processor");
        self.command.execute(request, signal).await?;
        Ok(())
    }
}

/// Runs a command on the response after the handler
pub struct ResponseProcessor<Res> {
    command: Arc<dyn MessageCommand<Res>>,
}

impl<Res> ResponseProcessor<Res>
where
    Res: Send + Sync + 'static,
{
    pub fn new(command: impl MessageCommand<Res> + 'static) -> Self {
        Self {
            command: Arc::new(command),
        }
    }

    pub async fn process(
        &self,
        response: &Res,
        signal: &CancellationToken,
    ) -> Result<(), PipelineError> {
        debug!(command = self.command.name(), "Running response processor");
        self.command.execute(response, signal).await?;
        Ok(())
    }
}

/// Runs a command on the request, then continues the pipeline
///
/// A failed command stops the pipeline; the handler never runs.
pub struct RequestBehavior<Req> {
    command: Arc<dyn MessageCommand<Req>>,
}

impl<Req> RequestBehavior<Req>
where
    Req: Send + Sync + 'static,
{
    pub fn new(command: impl MessageCommand<Req> + 'static) -> Self {
        Self {
            command: Arc::new(command),
        }
    }

    pub async fn handle<'a, R>(
        &self,
        request: &Req,
        signal: &CancellationToken,
        next: Next<'a, R>,
    ) -> Result<R, PipelineError> {
        debug!(command = self.command.name(), "Running request behavior");
        self.command.execute(request, signal).await?;
        next().await.map_err(PipelineError::Handler)
    }
}

/// Continues the pipeline, then runs a command on its response
pub struct ResponseBehavior<Res> {
    command: Arc<dyn MessageCommand<Res>>,
}

impl<Res> ResponseBehavior<Res>
where
    Res: Send + Sync + 'static,
{
    pub fn new(command: impl MessageCommand<Res> + 'static) -> Self {
        Self {
            command: Arc::new(command),
        }
    }

    pub async fn handle<'a>(
        &self,
        signal: &CancellationToken,
        next: Next<'a, Res>,
    ) -> Result<Res, PipelineError> {
        let response = next().await.map_err(PipelineError::Handler)?;

        debug!(command = self.command.name(), "Running response behavior");
        self.command.execute(&response, signal).await?;
        Ok(response)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
