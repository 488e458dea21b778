//! Submission lifecycle: a pure state machine plus the async driver that performs the
//! single outbound call.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::entities::input::{self, UploadedFile};
use crate::entities::result::AnalysisResult;
use crate::entities::selection::DrugSelection;
use crate::error::{ErrorKind, PharmaGuardError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PharmaGuardError> for ErrorDetail {
    fn from(err: &PharmaGuardError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded(Vec<AnalysisResult>),
    Failed(ErrorDetail),
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

/// Input captured by value when a submission enters `Submitting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub generation: u64,
    pub file: UploadedFile,
    pub drugs: DrugSelection,
}

impl AnalysisRequest {
    /// Value of the `drugs` multipart field.
    pub fn drugs_field(&self) -> String {
        self.drugs.to_text()
    }
}

#[derive(Debug)]
pub enum SubmissionEvent {
    Submit {
        file: Option<UploadedFile>,
        drug_text: String,
    },
    Completed {
        generation: u64,
        outcome: Result<Vec<AnalysisResult>, PharmaGuardError>,
    },
    Reset,
}

#[derive(Debug, PartialEq)]
pub enum SubmissionEffect {
    None,
    Dispatch(AnalysisRequest),
    Rejected(String),
    Discarded,
}

/// State plus the generation counter; `apply` is a pure transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionMachine {
    pub state: SubmissionState,
    pub generation: u64,
    pub max_upload_bytes: u64,
}

impl SubmissionMachine {
    pub fn new(max_upload_bytes: u64) -> Self {
        Self {
            state: SubmissionState::Idle,
            generation: 0,
            max_upload_bytes,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SubmissionState::Submitting)
    }

    /// Consumes the machine and returns its successor with the effect to perform.
    pub fn apply(self, event: SubmissionEvent) -> (Self, SubmissionEffect) {
        match event {
            SubmissionEvent::Submit { file, drug_text } => self.submit(file, &drug_text),
            SubmissionEvent::Completed {
                generation,
                outcome,
            } => self.complete(generation, outcome),
            SubmissionEvent::Reset => {
                let next = Self {
                    state: SubmissionState::Idle,
                    generation: self.generation + 1,
                    ..self
                };
                (next, SubmissionEffect::None)
            }
        }
    }

    fn submit(self, file: Option<UploadedFile>, drug_text: &str) -> (Self, SubmissionEffect) {
        if self.is_busy() {
            return (
                self,
                SubmissionEffect::Rejected("An analysis is already in progress".into()),
            );
        }

        match input::validate(file, drug_text, self.max_upload_bytes) {
            Err(err) => {
                let next = Self {
                    state: SubmissionState::Idle,
                    ..self
                };
                (next, SubmissionEffect::Rejected(err.to_string()))
            }
            Ok(valid) => {
                let generation = self.generation + 1;
                let request = AnalysisRequest {
                    generation,
                    file: valid.file,
                    drugs: DrugSelection::from_names(valid.drugs),
                };
                let next = Self {
                    state: SubmissionState::Submitting,
                    generation,
                    ..self
                };
                (next, SubmissionEffect::Dispatch(request))
            }
        }
    }

    fn complete(
        self,
        generation: u64,
        outcome: Result<Vec<AnalysisResult>, PharmaGuardError>,
    ) -> (Self, SubmissionEffect) {
        if generation != self.generation || !self.is_busy() {
            return (self, SubmissionEffect::Discarded);
        }

        let state = match outcome {
            Ok(results) => SubmissionState::Succeeded(results),
            Err(err) => SubmissionState::Failed(ErrorDetail::from(&err)),
        };
        (Self { state, ..self }, SubmissionEffect::None)
    }
}

/// The outbound analysis call.
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Vec<AnalysisResult>, PharmaGuardError>;
}

/// Owns the machine and publishes every state change to subscribers.
pub struct Orchestrator {
    machine: SubmissionMachine,
    tx: watch::Sender<SubmissionState>,
}

impl Orchestrator {
    pub fn new(max_upload_bytes: u64) -> Self {
        let (tx, _rx) = watch::channel(SubmissionState::Idle);
        Self {
            machine: SubmissionMachine::new(max_upload_bytes),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> &SubmissionState {
        &self.machine.state
    }

    pub fn is_busy(&self) -> bool {
        self.machine.is_busy()
    }

    fn publish(&self, state: SubmissionState) {
        self.tx.send_replace(state);
    }

    /// Feeds one event through the machine and notifies subscribers of the result.
    pub fn handle(&mut self, event: SubmissionEvent) -> SubmissionEffect {
        if let SubmissionEvent::Submit { .. } = &event
            && !self.machine.is_busy()
        {
            if self.machine.state.is_terminal() {
                self.publish(SubmissionState::Idle);
            }
            self.publish(SubmissionState::Validating);
        }

        let machine = std::mem::take(&mut self.machine);
        let (machine, effect) = machine.apply(event);
        self.machine = machine;

        match &effect {
            SubmissionEffect::Discarded => {
                debug!(
                    generation = self.machine.generation,
                    "Discarded response for superseded submission"
                );
            }
            SubmissionEffect::Rejected(message) => {
                warn!(message = %message, "Submission rejected");
                if !self.machine.is_busy() {
                    self.publish(self.machine.state.clone());
                }
            }
            SubmissionEffect::Dispatch(_) | SubmissionEffect::None => {
                self.publish(self.machine.state.clone());
            }
        }
        effect
    }

    /// Runs one submission to a terminal state. Validation failures and busy rejections
    /// come back as `Err(message)` without any outbound call.
    pub async fn submit<S>(
        &mut self,
        service: &S,
        file: Option<UploadedFile>,
        drug_text: &str,
    ) -> Result<&SubmissionState, String>
    where
        S: AnalysisService + ?Sized,
    {
        let effect = self.handle(SubmissionEvent::Submit {
            file,
            drug_text: drug_text.to_string(),
        });
        let request = match effect {
            SubmissionEffect::Dispatch(request) => request,
            SubmissionEffect::Rejected(message) => return Err(message),
            SubmissionEffect::None | SubmissionEffect::Discarded => return Ok(self.state()),
        };

        info!(
            generation = request.generation,
            file = %request.file.name,
            bytes = request.file.size,
            drugs = %request.drugs_field(),
            "Submitting analysis request"
        );
        let outcome = service.analyze(&request).await;
        if let Err(err) = &outcome {
            warn!(generation = request.generation, error = %err, "Analysis failed");
        }
        self.handle(SubmissionEvent::Completed {
            generation: request.generation,
            outcome,
        });
        Ok(self.state())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::entities::result::fixtures::result;

    fn vcf(size: usize) -> UploadedFile {
        UploadedFile::new("patient.vcf", Some("text/vcf".into()), vec![b'#'; size])
    }

    fn submit(file: Option<UploadedFile>, text: &str) -> SubmissionEvent {
        SubmissionEvent::Submit {
            file,
            drug_text: text.to_string(),
        }
    }

    struct FakeService {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        outcome: fn() -> Result<Vec<AnalysisResult>, PharmaGuardError>,
    }

    impl FakeService {
        fn new(outcome: fn() -> Result<Vec<AnalysisResult>, PharmaGuardError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                outcome,
            }
        }
    }

    #[async_trait::async_trait]
    impl AnalysisService for FakeService {
        async fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> Result<Vec<AnalysisResult>, PharmaGuardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .expect("lock")
                .push(request.drugs_field());
            (self.outcome)()
        }
    }

    #[test]
    fn invalid_input_stays_idle_and_dispatches_nothing() {
        let machine = SubmissionMachine::new(5 * 1024 * 1024);
        let (machine, effect) = machine.apply(submit(Some(vcf(6 * 1024 * 1024)), "WARFARIN"));
        assert_eq!(machine.state, SubmissionState::Idle);
        assert_eq!(machine.generation, 0);
        match effect {
            SubmissionEffect::Rejected(message) => assert!(message.contains("5 MB limit")),
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn valid_input_dispatches_deduplicated_drugs() {
        let machine = SubmissionMachine::new(5 * 1024 * 1024);
        let (machine, effect) = machine.apply(submit(Some(vcf(1024)), "codeine, WARFARIN, codeine"));
        assert_eq!(machine.state, SubmissionState::Submitting);
        let SubmissionEffect::Dispatch(request) = effect else {
            panic!("expected dispatch");
        };
        assert_eq!(request.generation, 1);
        assert_eq!(request.drugs.names(), ["CODEINE", "WARFARIN"]);
        assert_eq!(request.drugs_field(), "CODEINE, WARFARIN");
        assert_eq!(request.file.size, 1024);
    }

    #[test]
    fn submit_while_submitting_is_rejected() {
        let machine = SubmissionMachine::new(1024);
        let (machine, first) = machine.apply(submit(Some(vcf(10)), "CODEINE"));
        assert!(matches!(first, SubmissionEffect::Dispatch(_)));

        let (machine, second) = machine.apply(submit(Some(vcf(10)), "WARFARIN"));
        assert!(matches!(second, SubmissionEffect::Rejected(_)));
        assert_eq!(machine.state, SubmissionState::Submitting);
        assert_eq!(machine.generation, 1);
    }

    #[test]
    fn completion_maps_outcomes_to_terminal_states() {
        let machine = SubmissionMachine::new(1024);
        let (busy, _) = machine.apply(submit(Some(vcf(10)), "WARFARIN"));

        let (ok, effect) = busy.clone().apply(SubmissionEvent::Completed {
            generation: 1,
            outcome: Ok(vec![result("WARFARIN", "Toxic", "critical")]),
        });
        assert_eq!(effect, SubmissionEffect::None);
        assert!(matches!(ok.state, SubmissionState::Succeeded(ref r) if r.len() == 1));

        let (failed, _) = busy.apply(SubmissionEvent::Completed {
            generation: 1,
            outcome: Err(PharmaGuardError::ServerReported(
                "Unreadable VCF header".into(),
            )),
        });
        assert_eq!(
            failed.state,
            SubmissionState::Failed(ErrorDetail {
                kind: ErrorKind::ServerReportedError,
                message: "Unreadable VCF header".into(),
            })
        );
    }

    #[test]
    fn stale_generation_is_discarded() {
        let machine = SubmissionMachine::new(1024);
        let (machine, _) = machine.apply(submit(Some(vcf(10)), "CODEINE"));
        let (machine, _) = machine.apply(SubmissionEvent::Reset);
        let (machine, _) = machine.apply(submit(Some(vcf(10)), "WARFARIN"));
        assert_eq!(machine.generation, 3);

        let before = machine.clone();
        let (after, effect) = machine.apply(SubmissionEvent::Completed {
            generation: 1,
            outcome: Ok(vec![result("CODEINE", "Safe", "none")]),
        });
        assert_eq!(effect, SubmissionEffect::Discarded);
        assert_eq!(after, before);
    }

    #[test]
    fn completion_outside_submitting_is_discarded() {
        let machine = SubmissionMachine::new(1024);
        let (after, effect) = machine.apply(SubmissionEvent::Completed {
            generation: 0,
            outcome: Ok(Vec::new()),
        });
        assert_eq!(effect, SubmissionEffect::Discarded);
        assert_eq!(after.state, SubmissionState::Idle);
    }

    #[test]
    fn terminal_states_accept_a_fresh_submission() {
        let machine = SubmissionMachine::new(1024);
        let (machine, _) = machine.apply(submit(Some(vcf(10)), "CODEINE"));
        let (machine, _) = machine.apply(SubmissionEvent::Completed {
            generation: 1,
            outcome: Err(PharmaGuardError::MalformedResponse("bad".into())),
        });
        assert!(machine.state.is_terminal());

        let (machine, effect) = machine.apply(submit(Some(vcf(10)), "CODEINE"));
        assert!(matches!(effect, SubmissionEffect::Dispatch(ref r) if r.generation == 2));
        assert_eq!(machine.state, SubmissionState::Submitting);
    }

    #[tokio::test]
    async fn orchestrator_runs_one_call_and_publishes_states() {
        let service = FakeService::new(|| Ok(vec![result("WARFARIN", "Toxic", "critical")]));
        let mut orchestrator = Orchestrator::new(5 * 1024 * 1024);
        let mut rx = orchestrator.subscribe();

        let state = orchestrator
            .submit(&service, Some(vcf(1024)), "codeine, WARFARIN, codeine")
            .await
            .expect("dispatched")
            .clone();
        assert!(matches!(state, SubmissionState::Succeeded(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            service.seen.lock().expect("lock").as_slice(),
            ["CODEINE, WARFARIN"]
        );
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), state);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn orchestrator_rejects_invalid_input_without_calling_service() {
        let service = FakeService::new(|| Ok(Vec::new()));
        let mut orchestrator = Orchestrator::new(1024);

        let err = orchestrator
            .submit(&service, None, "CODEINE")
            .await
            .expect_err("missing file");
        assert_eq!(err, "Please upload a VCF file");
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*orchestrator.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn orchestrator_busy_guard_blocks_second_dispatch() {
        let mut orchestrator = Orchestrator::new(1024);
        let first = orchestrator.handle(submit(Some(vcf(10)), "CODEINE"));
        assert!(matches!(first, SubmissionEffect::Dispatch(_)));
        assert!(orchestrator.is_busy());

        let service = FakeService::new(|| Ok(Vec::new()));
        let err = orchestrator
            .submit(&service, Some(vcf(10)), "WARFARIN")
            .await
            .expect_err("busy");
        assert!(err.contains("already in progress"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*orchestrator.state(), SubmissionState::Submitting);
    }

    #[tokio::test]
    async fn orchestrator_transport_failure_is_generic() {
        let service = FakeService::new(|| {
            Err(PharmaGuardError::Transport {
                reason: "connection failed".into(),
                source: None,
            })
        });
        let mut orchestrator = Orchestrator::new(1024);
        let state = orchestrator
            .submit(&service, Some(vcf(10)), "CODEINE")
            .await
            .expect("dispatched");
        let SubmissionState::Failed(detail) = state else {
            panic!("expected failure");
        };
        assert_eq!(detail.kind, ErrorKind::TransportError);
        assert!(detail.message.contains("Unable to reach the analysis service"));
    }

    /// Edits the operator's drug text while its own request is in flight.
    struct EditingService {
        form: std::sync::Arc<Mutex<String>>,
        seen: Mutex<Vec<(u64, String)>>,
    }

    #[async_trait::async_trait]
    impl AnalysisService for EditingService {
        async fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> Result<Vec<AnalysisResult>, PharmaGuardError> {
            self.form.lock().expect("lock").push_str(", WARFARIN");
            tokio::task::yield_now().await;
            self.seen
                .lock()
                .expect("lock")
                .push((request.generation, request.drugs_field()));
            Ok(vec![result("CODEINE", "Safe", "none")])
        }
    }

    #[tokio::test]
    async fn edits_during_flight_apply_only_to_the_next_submission() {
        let form = std::sync::Arc::new(Mutex::new(String::from("codeine")));
        let service = EditingService {
            form: form.clone(),
            seen: Mutex::new(Vec::new()),
        };
        let mut orchestrator = Orchestrator::new(1024);

        let text = form.lock().expect("lock").clone();
        orchestrator
            .submit(&service, Some(vcf(10)), &text)
            .await
            .expect("first dispatch");
        assert_eq!(form.lock().expect("lock").as_str(), "codeine, WARFARIN");

        let text = form.lock().expect("lock").clone();
        orchestrator
            .submit(&service, Some(vcf(10)), &text)
            .await
            .expect("second dispatch");

        let seen = service.seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![
                (1, "CODEINE".to_string()),
                (2, "CODEINE, WARFARIN".to_string())
            ]
        );
    }
}
