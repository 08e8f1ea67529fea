//! One deferred call and its lifecycle.
//!
//! ```text
//! Queued -> Executing -> Finalizing -> Done
//!                \-> Failed -> Finalizing -> Done
//! ```
//!
//! No state is ever revisited. `Job::run` consumes the job, so a job is
//! finalized at most once.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::descriptor::FrozenCall;
use crate::error::CalloutError;
use crate::executor::Executor;
use crate::finalizer::Outcome;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Executing,
    /// The transport returned an error; the finalizer will receive it.
    Failed,
    Finalizing,
    Done,
}

impl JobState {
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Executing)
                | (Executing, Finalizing)
                | (Executing, Failed)
                | (Failed, Finalizing)
                | (Finalizing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == JobState::Done
    }
}

/// A frozen call waiting to run, plus the name of the finalizer that will
/// receive its outcome.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    call: FrozenCall,
    finalizer: String,
    state: JobState,
}

impl Job {
    pub(crate) fn new(call: FrozenCall, finalizer: &str) -> Self {
        Self {
            id: JobId::new(),
            call,
            finalizer: finalizer.to_string(),
            state: JobState::Queued,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn call(&self) -> &FrozenCall {
        &self.call
    }

    pub fn finalizer(&self) -> &str {
        &self.finalizer
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: JobState) -> Result<(), CalloutError> {
        if !self.state.can_advance_to(next) {
            return Err(CalloutError::State(format!(
                "job {} cannot move from {:?} to {:?}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Run the call, then hand the outcome to `finalize`.
    ///
    /// `publish` sees every state the job enters. `finalize` is called exactly
    /// once, with the response or the transport error.
    pub(crate) fn run<T, P, F>(mut self, executor: &Executor<T>, mut publish: P, finalize: F)
    where
        T: Transport,
        P: FnMut(JobId, JobState),
        F: FnOnce(&Job, Outcome),
    {
        if let Err(err) = self.advance(JobState::Executing) {
            error!(job_id = %self.id, error = %err, "refusing to run job");
            return;
        }
        publish(self.id, self.state);

        let outcome = executor.send(&self.call);
        if outcome.is_err() {
            self.step(JobState::Failed, &mut publish);
        }

        self.step(JobState::Finalizing, &mut publish);
        finalize(&self, outcome);
        self.step(JobState::Done, &mut publish);
    }

    /// Advance and publish the new state. A refused transition is logged and
    /// nothing is published.
    fn step<P>(&mut self, next: JobState, publish: &mut P) -> bool
    where
        P: FnMut(JobId, JobState),
    {
        match self.advance(next) {
            Ok(()) => {
                publish(self.id, self.state);
                true
            }
            Err(err) => {
                error!(job_id = %self.id, error = %err, "job transition refused");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CallDescriptor;
    use crate::http::HttpMethod;
    use crate::mock::MockTransport;

    fn job() -> Job {
        let call = CallDescriptor::new("Acme", HttpMethod::Get, "/x", "", "")
            .freeze()
            .unwrap();
        Job::new(call, "noop")
    }

    #[test]
    fn legal_transitions() {
        use JobState::*;
        assert!(Queued.can_advance_to(Executing));
        assert!(Executing.can_advance_to(Failed));
        assert!(Failed.can_advance_to(Finalizing));
        assert!(Finalizing.can_advance_to(Done));
        assert!(!Done.can_advance_to(Finalizing));
        assert!(!Finalizing.can_advance_to(Executing));
        assert!(!Queued.can_advance_to(Done));
        assert!(Done.is_terminal());
    }

    #[test]
    fn second_finalize_is_a_state_error() {
        let mut job = job();
        job.advance(JobState::Executing).unwrap();
        job.advance(JobState::Finalizing).unwrap();
        job.advance(JobState::Done).unwrap();
        let err = job.advance(JobState::Finalizing).unwrap_err();
        assert!(matches!(err, CalloutError::State(_)));
        assert_eq!(job.state(), JobState::Done);
    }

    #[test]
    fn run_walks_the_success_path() {
        let mock = MockTransport::new();
        mock.set_mock("Acme", 200, "OK", "hi", &[]);
        let executor = Executor::new(mock);

        let mut seen = Vec::new();
        let mut delivered = Vec::new();
        job().run(&executor, |_, s| seen.push(s), |_, outcome| delivered.push(outcome));

        assert_eq!(
            seen,
            vec![JobState::Executing, JobState::Finalizing, JobState::Done]
        );
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].as_ref().unwrap().body, "hi");
    }

    #[test]
    fn run_walks_the_failure_path() {
        let executor = Executor::new(MockTransport::new());

        let mut seen = Vec::new();
        let mut delivered = Vec::new();
        job().run(&executor, |_, s| seen.push(s), |_, outcome| delivered.push(outcome));

        assert_eq!(
            seen,
            vec![
                JobState::Executing,
                JobState::Failed,
                JobState::Finalizing,
                JobState::Done
            ]
        );
        assert!(delivered[0].as_ref().unwrap_err().is_no_mock());
    }

    #[test]
    fn refused_step_is_not_published() {
        let mut job = job();
        let mut seen = Vec::new();
        assert!(!job.step(JobState::Done, &mut |_, s| seen.push(s)));
        assert!(job.step(JobState::Executing, &mut |_, s| seen.push(s)));
        assert_eq!(seen, vec![JobState::Executing]);
        assert_eq!(job.state(), JobState::Executing);
    }
}
