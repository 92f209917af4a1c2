use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use soulexplorer_event_bus::{EventBus, InMemoryBus};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Collects a replacement instruction from the operator.
#[async_trait]
pub trait InstructionPrompt: Send + Sync {
    async fn collect(&self) -> Option<String>;
}

/// Lifecycle notifications published by [`InterruptCoordinator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterruptEvent {
    Signalled,
    Resolved { instruction: Option<String> },
}

/// Mediates between an operator and the loop currently running.
///
/// One coordinator per session, shared through `Arc` with the UI layer that
/// raises interrupts and the scheduler that consumes them.
pub struct InterruptCoordinator {
    flag: watch::Sender<bool>,
    prompt: RwLock<Option<Arc<dyn InstructionPrompt>>>,
    bus: Arc<InMemoryBus<InterruptEvent>>,
}

impl Default for InterruptCoordinator {
    fn default() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag,
            prompt: RwLock::new(None),
            bus: InMemoryBus::new(32),
        }
    }
}

impl InterruptCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_prompt(prompt: Arc<dyn InstructionPrompt>) -> Arc<Self> {
        let coordinator = Self::default();
        *coordinator.prompt.write() = Some(prompt);
        Arc::new(coordinator)
    }

    pub fn set_prompt(&self, prompt: Arc<dyn InstructionPrompt>) {
        *self.prompt.write() = Some(prompt);
    }

    pub fn clear_prompt(&self) {
        *self.prompt.write() = None;
    }

    pub fn has_prompt(&self) -> bool {
        self.prompt.read().is_some()
    }

    /// Raise the interrupt flag. Safe to call repeatedly and from any thread.
    pub fn signal_interrupt(&self) {
        let raised = self.flag.send_if_modified(|flag| {
            if *flag {
                false
            } else {
                *flag = true;
                true
            }
        });
        if raised {
            info!(target: "scheduler.interrupt", "interrupt signalled");
            self.bus.emit(InterruptEvent::Signalled);
        }
    }

    pub fn is_interrupted(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolve a pending interrupt: ask the operator, clear the flag and
    /// return what they said. Returns `None` straight away when nothing is
    /// pending.
    pub async fn check_interrupt(&self) -> Option<String> {
        if !self.is_interrupted() {
            return None;
        }
        let instruction = self.request_instruction().await;
        self.flag.send_replace(false);
        info!(
            target: "scheduler.interrupt",
            instruction = instruction.as_deref().unwrap_or("<none>"),
            "interrupt resolved"
        );
        self.bus.emit(InterruptEvent::Resolved {
            instruction: instruction.clone(),
        });
        instruction
    }

    /// Ask the operator for an instruction without touching the flag.
    pub async fn request_instruction(&self) -> Option<String> {
        let prompt = self.prompt.read().clone();
        let Some(prompt) = prompt else {
            debug!(target: "scheduler.interrupt", "no instruction prompt registered");
            return None;
        };
        prompt
            .collect()
            .await
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }

    /// Completes once the flag is raised.
    pub async fn interrupted(&self) {
        let mut receiver = self.flag.subscribe();
        let closed = receiver.wait_for(|flag| *flag).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InterruptEvent> {
        self.bus.subscribe()
    }
}

/// Headless prompt for unattended and CI runs: hands out queued answers in
/// order, then `None`, which halts the loop at the next interrupt.
///
/// Answers can be queued while the run is in flight with [`push`](Self::push).
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: parking_lot::Mutex<std::collections::VecDeque<Option<String>>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Arc::new(Self {
            answers: parking_lot::Mutex::new(
                answers
                    .into_iter()
                    .map(|answer| answer.map(Into::into))
                    .collect(),
            ),
        })
    }

    pub fn push(&self, answer: Option<String>) {
        self.answers.lock().push_back(answer);
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }
}

#[async_trait]
impl InstructionPrompt for ScriptedPrompt {
    async fn collect(&self) -> Option<String> {
        self.answers.lock().pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_is_idempotent_and_emits_once() {
        let coordinator = InterruptCoordinator::new();
        let mut events = coordinator.subscribe();
        coordinator.signal_interrupt();
        coordinator.signal_interrupt();
        assert!(coordinator.is_interrupted());
        assert_eq!(events.recv().await.unwrap(), InterruptEvent::Signalled);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn check_interrupt_collects_and_clears() {
        let prompt = ScriptedPrompt::new([Some("  go to settings ")]);
        let coordinator = InterruptCoordinator::with_prompt(prompt);
        let mut events = coordinator.subscribe();
        assert_eq!(coordinator.check_interrupt().await, None);

        coordinator.signal_interrupt();
        let instruction = coordinator.check_interrupt().await;
        assert_eq!(instruction.as_deref(), Some("go to settings"));
        assert!(!coordinator.is_interrupted());
        assert_eq!(events.recv().await.unwrap(), InterruptEvent::Signalled);
        assert_eq!(
            events.recv().await.unwrap(),
            InterruptEvent::Resolved {
                instruction: Some("go to settings".into())
            }
        );
    }

    #[tokio::test]
    async fn missing_prompt_resolves_to_none() {
        let coordinator = InterruptCoordinator::new();
        coordinator.signal_interrupt();
        assert_eq!(coordinator.check_interrupt().await, None);
        assert!(!coordinator.is_interrupted());
    }

    #[tokio::test]
    async fn interrupted_wakes_on_signal() {
        let coordinator = InterruptCoordinator::new();
        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.interrupted().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        coordinator.signal_interrupt();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }

    #[tokio::test]
    async fn scripted_prompt_drains_then_halts() {
        let prompt = ScriptedPrompt::new([Some("open billing")]);
        prompt.push(None);
        prompt.push(Some("retry checkout".to_string()));
        assert_eq!(prompt.remaining(), 3);

        assert_eq!(prompt.collect().await.as_deref(), Some("open billing"));
        assert_eq!(prompt.collect().await, None);
        assert_eq!(prompt.collect().await.as_deref(), Some("retry checkout"));
        assert_eq!(prompt.remaining(), 0);
        assert_eq!(prompt.collect().await, None);
    }

    #[tokio::test]
    async fn request_instruction_leaves_flag_alone() {
        let coordinator = InterruptCoordinator::with_prompt(ScriptedPrompt::new([Some("look")]));
        coordinator.signal_interrupt();
        assert_eq!(coordinator.request_instruction().await.as_deref(), Some("look"));
        assert!(coordinator.is_interrupted());
    }
}
