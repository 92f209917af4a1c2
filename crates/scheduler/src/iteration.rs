use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{debug, info, warn, Instrument};

use crate::error::LoopError;
use crate::interrupt::InterruptCoordinator;
use crate::metrics;
use crate::model::{
    ErrorAction, IterationContext, IterationControl, LoopOutcome, LoopStatus, SchedulerOptions,
};

pub type ErrorPolicy<E> = Arc<dyn Fn(&E, &IterationContext) -> ErrorAction + Send + Sync>;

/// Drives a handler until it stops, the attempt bound runs out or an
/// operator halts it.
///
/// Each invocation runs as its own tokio task. When an interrupt wins the
/// race against it the task is detached: it runs to completion and its
/// result is dropped.
pub struct IterationScheduler<E> {
    options: SchedulerOptions,
    on_error: Option<ErrorPolicy<E>>,
}

struct Progress<T> {
    result: Option<T>,
    iterations: u32,
    last_error: Option<String>,
}

impl<T> Progress<T> {
    fn finish(self, status: LoopStatus) -> LoopOutcome<T> {
        match status {
            LoopStatus::Stopped => metrics::record_stop(),
            LoopStatus::Exhausted => metrics::record_exhausted(),
            LoopStatus::Interrupted => {}
        }
        debug!(
            target: "scheduler.loop",
            status = %status,
            iterations = self.iterations,
            "iteration loop finished"
        );
        LoopOutcome {
            status,
            result: self.result,
            iterations: self.iterations,
            last_error: self.last_error,
        }
    }
}

impl<E> IterationScheduler<E>
where
    E: fmt::Display + Send + 'static,
{
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            options,
            on_error: None,
        }
    }

    /// Install a policy deciding what happens when the handler fails.
    /// Without one, the first failure ends the run with
    /// [`LoopError::Handler`].
    pub fn with_error_policy<P>(mut self, policy: P) -> Self
    where
        P: Fn(&E, &IterationContext) -> ErrorAction + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(policy));
        self
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub async fn run<T, F, Fut>(&self, handler: F) -> Result<LoopOutcome<T>, LoopError<E>>
    where
        F: FnMut(IterationContext) -> Fut,
        Fut: Future<Output = Result<IterationControl<T>, E>> + Send + 'static,
        T: Send + 'static,
    {
        let span = self.options.tracer.span(self.options.trace.as_ref());
        self.drive(handler).instrument(span).await
    }

    async fn drive<T, F, Fut>(&self, mut handler: F) -> Result<LoopOutcome<T>, LoopError<E>>
    where
        F: FnMut(IterationContext) -> Fut,
        Fut: Future<Output = Result<IterationControl<T>, E>> + Send + 'static,
        T: Send + 'static,
    {
        metrics::record_run();
        let coordinator = if self.options.interruptible {
            self.options.coordinator.clone()
        } else {
            None
        };
        let mut progress = Progress {
            result: None,
            iterations: 0,
            last_error: None,
        };
        let mut instruction: Option<String> = None;

        while progress.iterations < self.options.max_attempts {
            if let Some(coordinator) = &coordinator {
                if coordinator.is_interrupted() {
                    match self.resolve_interrupt(coordinator, progress.iterations).await {
                        Some(next) => instruction = Some(next),
                        None => return Ok(progress.finish(LoopStatus::Interrupted)),
                    }
                }
            }

            progress.iterations += 1;
            let iteration = progress.iterations;
            let ctx = IterationContext::new(iteration, instruction.take(), coordinator.clone());
            metrics::record_iteration();
            debug!(
                target: "scheduler.loop",
                iteration,
                instruction = ctx.instruction().unwrap_or(""),
                "iteration started"
            );

            let mut task = tokio::spawn(handler(ctx.clone()));
            let joined = match &coordinator {
                Some(coordinator) => tokio::select! {
                    biased;
                    joined = &mut task => Some(joined),
                    _ = coordinator.interrupted() => None,
                },
                None => Some((&mut task).await),
            };

            let Some(joined) = joined else {
                debug!(target: "scheduler.loop", iteration, "abandoning in-flight iteration");
                drop(task);
                if let Some(coordinator) = &coordinator {
                    match self.resolve_interrupt(coordinator, iteration).await {
                        Some(next) => instruction = Some(next),
                        None => return Ok(progress.finish(LoopStatus::Interrupted)),
                    }
                }
                continue;
            };

            match joined {
                Ok(Ok(control)) => {
                    match control {
                        IterationControl::Continue(value) => progress.result = Some(value),
                        IterationControl::Stop(value) => {
                            progress.result = Some(value);
                            ctx.request_stop();
                        }
                        IterationControl::Retry => {}
                    }
                    if ctx.stop_requested() {
                        return Ok(progress.finish(LoopStatus::Stopped));
                    }
                }
                Ok(Err(error)) => {
                    if ctx.stop_requested() {
                        return Ok(progress.finish(LoopStatus::Stopped));
                    }
                    metrics::record_handler_error();
                    warn!(target: "scheduler.loop", iteration, error = %error, "iteration failed");
                    progress.last_error = Some(error.to_string());
                    let action = match &self.on_error {
                        Some(policy) => policy(&error, &ctx),
                        None => ErrorAction::Propagate,
                    };
                    match action {
                        ErrorAction::Propagate => {
                            return Err(LoopError::Handler {
                                iteration,
                                source: error,
                            })
                        }
                        ErrorAction::Stop => return Ok(progress.finish(LoopStatus::Stopped)),
                        ErrorAction::Retry if ctx.stop_requested() => {
                            return Ok(progress.finish(LoopStatus::Stopped))
                        }
                        ErrorAction::Retry => {}
                    }
                }
                Err(join_error) => {
                    metrics::record_handler_error();
                    let message = join_message(join_error);
                    warn!(target: "scheduler.loop", iteration, %message, "iteration task failed");
                    return Err(LoopError::Panicked { iteration, message });
                }
            }
        }

        Ok(progress.finish(LoopStatus::Exhausted))
    }

    /// `None` means the run should end.
    async fn resolve_interrupt(
        &self,
        coordinator: &InterruptCoordinator,
        iteration: u32,
    ) -> Option<String> {
        metrics::record_interrupt();
        let instruction = coordinator.check_interrupt().await;
        match instruction {
            Some(text) if !self.options.is_stop_keyword(&text) => {
                info!(target: "scheduler.loop", iteration, instruction = %text, "redirecting next iteration");
                if let Some(hook) = &self.options.on_interrupt {
                    hook(&text, iteration);
                }
                Some(text)
            }
            _ => {
                info!(target: "scheduler.loop", iteration, "halted by operator");
                None
            }
        }
    }
}

fn join_message(error: JoinError) -> String {
    if error.is_panic() {
        panic_message(error.into_panic())
    } else {
        error.to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
