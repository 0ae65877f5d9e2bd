//! Runs a script step by step over a single client connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};
use vmfs_proto::Operation;

use crate::client::{Client, Response};
use crate::error::SequenceError;
use crate::script::{Script, Step};

/// Shared flag that stops a running script before its next step.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running { step: usize },
    Completed,
    Failed { step: usize },
    Cancelled { step: usize },
}

/// Outcome of one completed step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub operation: &'static str,
    pub response: Response,
}

/// Executes steps strictly in order; a failed step aborts the rest.
#[derive(Debug)]
pub struct Sequencer {
    client: Client,
    cancel: CancelToken,
    state: SequencerState,
}

impl Sequencer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cancel: CancelToken::new(),
            state: SequencerState::Idle,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn run(&mut self, script: &Script) -> Result<Vec<StepReport>, SequenceError> {
        if self.state != SequencerState::Idle {
            return Err(SequenceError::AlreadyRan);
        }

        let mut reads: HashMap<usize, Vec<u8>> = HashMap::new();
        let mut reports = Vec::with_capacity(script.len());

        for (index, step) in script.steps().iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Script cancelled before step {}", index);
                self.state = SequencerState::Cancelled { step: index };
                return Err(SequenceError::Cancelled { index });
            }
            self.state = SequencerState::Running { step: index };

            let op = match resolve(step, &reads) {
                Ok(op) => op,
                Err(e) => {
                    error!("Step {} cannot run: {}", index, e);
                    self.state = SequencerState::Failed { step: index };
                    return Err(e);
                }
            };
            info!("Step {}: {}", index, op.name());

            match self.client.execute(&op) {
                Ok(response) => {
                    if let Response::Content(received) = &response {
                        reads.insert(index, received.bytes().to_vec());
                    }
                    reports.push(StepReport {
                        index,
                        operation: op.name(),
                        response,
                    });
                }
                Err(source) => {
                    error!("Step {} ({}) failed: {}", index, op.name(), source);
                    self.state = SequencerState::Failed { step: index };
                    return Err(SequenceError::Step {
                        index,
                        operation: op.name(),
                        source,
                    });
                }
            }
        }

        self.state = SequencerState::Completed;
        info!("Script completed: {} steps", reports.len());
        Ok(reports)
    }

    pub fn into_client(self) -> Client {
        self.client
    }
}

fn resolve(step: &Step, reads: &HashMap<usize, Vec<u8>>) -> Result<Operation, SequenceError> {
    match step {
        Step::Run(op) => Ok(op.clone()),
        Step::WriteFromRead { path, read_step } => {
            let content = reads.get(read_step).ok_or_else(|| {
                SequenceError::InvalidScript(format!("step {read_step} produced no content"))
            })?;
            Ok(Operation::write(path.as_str(), content.clone()))
        }
    }
}
