use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::app::ResponseSink;
use crate::error::ProcessError;

pub struct ProcessRequest {
    pub input: String,
    /// Cancelled when the user interrupts or the session shuts down.
    pub cancel: CancellationToken,
    pub sink: ResponseSink,
}

/// Turns submitted text into a streamed response.
///
/// Implementations stream output through `request.sink` and must return
/// promptly once `request.cancel` fires.
pub trait Processor: Send + Sync {
    fn process(&self, request: ProcessRequest) -> BoxFuture<'static, Result<(), ProcessError>>;
}

impl<F, Fut> Processor for F
where
    F: Fn(ProcessRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ProcessError>> + Send + 'static,
{
    fn process(&self, request: ProcessRequest) -> BoxFuture<'static, Result<(), ProcessError>> {
        (self)(request).boxed()
    }
}
