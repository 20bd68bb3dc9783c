#![allow(clippy::result_large_err)]

use crate::core::error::{AppError, ErrorReporter, TracingErrorReporter};
use crate::core::pipeline::feature::{Feature, FeatureDescriptor};
use crate::core::pipeline::renderer::StageAction;
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use crate::core::pipeline::strategy::ProcessingStrategy;
use crate::core::types::ErrorCategory;
use crate::services::analytics::{AnalyticsClient, RemoteStrategy};
use crate::services::records::{InMemoryRecordStore, RecordStore};
use crate::services::session::SessionContext;
use bizflow_types::ErrorInfo;
use chrono::Local;
use futures::future::{AbortHandle, AbortRegistration, Abortable, Aborted};
use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

type StateOf<F> = PipelineState<<F as Feature>::Input, <F as Feature>::Mapped, <F as Feature>::Output>;

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoInput,
    NoMappedData,
    NoResult,
    AlreadyProcessing,
    Saving,
    Unauthenticated,
    StageLocked(Stage),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoInput => write!(f, "no input has been captured"),
            SkipReason::NoMappedData => write!(f, "no mapped data to process"),
            SkipReason::NoResult => write!(f, "no result to save"),
            SkipReason::AlreadyProcessing => write!(f, "processing is already running"),
            SkipReason::Saving => write!(f, "a save is in progress"),
            SkipReason::Unauthenticated => write!(f, "no signed-in user"),
            SkipReason::StageLocked(stage) => write!(f, "stage '{}' is not reachable yet", stage),
        }
    }
}

/// Result of completing a processing run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingStatus {
    Completed,
    Failed(ErrorInfo),
    Cancelled,
    /// The outcome belonged to a run that is no longer the latest.
    Stale,
    Skipped(SkipReason),
}

/// Result of a save attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Value),
    Skipped(SkipReason),
}

/// What dispatching a stage action did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Idle,
    Advanced(Stage),
    Rejected(SkipReason),
    Processed(ProcessingStatus),
    Saved(SaveOutcome),
    ErrorDismissed,
}

struct InFlight {
    seq: u64,
    revision: u64,
    abort: AbortHandle,
}

/// One processing run detached from the controller. `Send + 'static`, so it
/// can be spawned on any executor; hand its outcome back through
/// [`PipelineController::complete_processing`].
pub struct ProcessingJob<M, R> {
    seq: u64,
    feature_key: &'static str,
    mapped: M,
    strategy: Arc<dyn ProcessingStrategy<M, R>>,
    registration: AbortRegistration,
    timeout: Option<Duration>,
}

/// Outcome of a [`ProcessingJob`], tagged with its sequence number.
#[derive(Debug)]
pub struct ProcessingOutcome<R> {
    pub seq: u64,
    pub result: Result<R, AppError>,
}

impl<M, R> ProcessingJob<M, R>
where
    M: Send + Sync + 'static,
    R: Send + 'static,
{
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub async fn run(self) -> ProcessingOutcome<R> {
        let ProcessingJob {
            seq,
            feature_key,
            mapped,
            strategy,
            registration,
            timeout,
        } = self;

        let span = tracing::info_span!(
            "pipeline",
            feature = feature_key,
            run = seq,
            strategy = %strategy.name()
        );

        async move {
            tracing::debug!("processing started");
            let work = AssertUnwindSafe(async { strategy.process(&mapped).await }).catch_unwind();
            let work = Abortable::new(work, registration);

            let finished = match timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(finished) => finished,
                    Err(_) => {
                        return ProcessingOutcome {
                            seq,
                            result: Err(AppError::new(
                                ErrorCategory::TimeoutError,
                                format!(
                                    "processing did not finish within {}",
                                    humantime::format_duration(limit)
                                ),
                            )),
                        };
                    }
                },
                None => work.await,
            };

            let result = match finished {
                Err(Aborted) => Err(AppError::new(
                    ErrorCategory::CancelledError,
                    "processing run was cancelled",
                )),
                Ok(Err(_panic)) => Err(AppError::processing("processing strategy panicked")),
                Ok(Ok(result)) => result,
            };
            ProcessingOutcome { seq, result }
        }
        .instrument(span)
        .await
    }
}

/// Drives one feature session through its five stages.
pub struct PipelineController<F: Feature> {
    feature: Arc<F>,
    descriptor: FeatureDescriptor,
    state: StateOf<F>,
    strategy: Arc<dyn ProcessingStrategy<F::Mapped, F::Output>>,
    session: Arc<SessionContext>,
    records: Arc<dyn RecordStore>,
    reporter: Arc<dyn ErrorReporter>,
    processing_timeout: Option<Duration>,
    last_seq: u64,
    in_flight: Option<InFlight>,
}

impl<F: Feature> PipelineController<F> {
    pub fn builder(feature: F) -> PipelineBuilder<F> {
        PipelineBuilder::new(feature)
    }

    pub fn state(&self) -> &StateOf<F> {
        &self.state
    }

    pub fn feature(&self) -> &F {
        &self.feature
    }

    pub fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.reporter
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Sequence number of the most recently issued run (0 before any run).
    pub fn last_sequence(&self) -> u64 {
        self.last_seq
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Store freshly captured input. Downstream data and the error banner are
    /// cleared and any in-flight run is fenced out.
    pub fn on_input_processed(&mut self, data: F::Input, source_url: impl Into<String>) {
        if self.cancel_processing() {
            tracing::debug!(feature = self.descriptor.key, "new input superseded in-flight run");
        }
        self.state.input = Some(data);
        self.state.source_url = source_url.into();
        self.state.mapped = None;
        self.state.result = None;
        self.state.result_revision = None;
        self.state.saved_revision = None;
        self.state.error = None;
        self.state.active_stage = Stage::Mapping;
        tracing::info!(
            feature = self.descriptor.key,
            source_url = %self.state.source_url,
            "input captured"
        );
    }

    /// Store mapped data and advance to processing. Rejected without input.
    pub fn on_data_mapped(&mut self, data: F::Mapped) -> bool {
        if self.state.input.is_none() {
            tracing::warn!(feature = self.descriptor.key, "mapping rejected: no input captured");
            return false;
        }
        self.state.mapped = Some(data);
        self.state.mapping_revision += 1;
        self.state.active_stage = Stage::Processing;
        tracing::info!(
            feature = self.descriptor.key,
            revision = self.state.mapping_revision,
            "mapping accepted"
        );
        true
    }

    fn processing_blocker(&self) -> Option<SkipReason> {
        if self.state.mapped.is_none() {
            Some(SkipReason::NoMappedData)
        } else if self.state.is_processing {
            Some(SkipReason::AlreadyProcessing)
        } else if self.state.is_saving {
            Some(SkipReason::Saving)
        } else {
            None
        }
    }

    /// Issue a new run. `None` when there is nothing to process or a run or
    /// save is already underway.
    pub fn begin_processing(&mut self) -> Option<ProcessingJob<F::Mapped, F::Output>> {
        if let Some(reason) = self.processing_blocker() {
            tracing::debug!(feature = self.descriptor.key, %reason, "processing not started");
            return None;
        }
        let mapped = self.state.mapped.clone()?;

        self.last_seq += 1;
        let (abort, registration) = AbortHandle::new_pair();
        self.in_flight = Some(InFlight {
            seq: self.last_seq,
            revision: self.state.mapping_revision,
            abort,
        });
        self.state.is_processing = true;

        Some(ProcessingJob {
            seq: self.last_seq,
            feature_key: self.descriptor.key,
            mapped,
            strategy: Arc::clone(&self.strategy),
            registration,
            timeout: self.processing_timeout,
        })
    }

    /// Apply the outcome of a run. Outcomes of anything but the latest issued
    /// run are discarded.
    pub fn complete_processing(&mut self, outcome: ProcessingOutcome<F::Output>) -> ProcessingStatus {
        let revision = match &self.in_flight {
            Some(in_flight) if in_flight.seq == outcome.seq => in_flight.revision,
            _ => {
                tracing::debug!(
                    feature = self.descriptor.key,
                    seq = outcome.seq,
                    latest = self.last_seq,
                    "discarding stale processing outcome"
                );
                return ProcessingStatus::Stale;
            }
        };
        self.in_flight = None;
        self.state.is_processing = false;

        match outcome.result {
            Ok(result) => {
                self.state.result = Some(result);
                self.state.result_revision = Some(revision);
                self.state.error = None;
                self.state.active_stage = Stage::Visualization;
                tracing::info!(feature = self.descriptor.key, seq = outcome.seq, "processing completed");
                ProcessingStatus::Completed
            }
            Err(err) if err.is_cancelled() => {
                tracing::info!(feature = self.descriptor.key, seq = outcome.seq, "processing cancelled");
                ProcessingStatus::Cancelled
            }
            Err(err) => {
                tracing::warn!(
                    feature = self.descriptor.key,
                    seq = outcome.seq,
                    code = %err.code,
                    "processing failed: {}",
                    err.message
                );
                let info = err.to_info();
                self.state.error = Some(info.clone());
                ProcessingStatus::Failed(info)
            }
        }
    }

    /// Run the strategy on the mapped data and apply the outcome.
    pub async fn run_processing(&mut self) -> ProcessingStatus {
        let job = match self.begin_processing() {
            Some(job) => job,
            None => {
                return ProcessingStatus::Skipped(
                    self.processing_blocker().unwrap_or(SkipReason::NoMappedData),
                )
            }
        };

        let mut guard = RunGuard {
            controller: self,
            armed: true,
        };
        let outcome = job.run().await;
        guard.armed = false;
        guard.controller.complete_processing(outcome)
    }

    /// Abort the in-flight run, if any. Leaves result and error untouched.
    pub fn cancel_processing(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.abort.abort();
                self.state.is_processing = false;
                tracing::debug!(feature = self.descriptor.key, seq = in_flight.seq, "processing run aborted");
                true
            }
            None => false,
        }
    }

    /// Explicit re-run: abort whatever is in flight and issue a new run.
    pub fn restart_processing(&mut self) -> Option<ProcessingJob<F::Mapped, F::Output>> {
        self.cancel_processing();
        self.begin_processing()
    }

    /// Persist the current result for the signed-in user.
    pub async fn save_result(&mut self) -> Result<SaveOutcome, AppError> {
        let result = match self.state.result.as_ref() {
            Some(result) => result,
            None => return Ok(SaveOutcome::Skipped(SkipReason::NoResult)),
        };
        let user_id = match self.session.user_id() {
            Some(user_id) => user_id.to_string(),
            None => {
                tracing::debug!(feature = self.descriptor.key, "save skipped: no signed-in user");
                return Ok(SaveOutcome::Skipped(SkipReason::Unauthenticated));
            }
        };
        if self.state.is_processing {
            return Ok(SaveOutcome::Skipped(SkipReason::AlreadyProcessing));
        }
        if self.state.is_saving {
            return Ok(SaveOutcome::Skipped(SkipReason::Saving));
        }

        let title = format!(
            "{} - {}",
            self.descriptor.title,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let record = json!({
            "title": title,
            "data": serde_json::to_value(result)?,
            "input_data": serde_json::to_value(&self.state.input)?,
            "mapped_data": serde_json::to_value(&self.state.mapped)?,
            "user_id": user_id,
            "file_url": self.state.source_url,
        });

        let table = self.descriptor.table_name;
        let records = Arc::clone(&self.records);
        let revision = self.state.result_revision;
        let saved = {
            let _saving = FlagGuard::raise(&mut self.state.is_saving);
            records.insert(table, record).await
        };

        match saved {
            Ok(saved) => {
                self.state.saved_revision = revision;
                self.reporter.report_info(&format!("Data saved successfully to '{}'", table));
                Ok(SaveOutcome::Saved(saved))
            }
            Err(mut err) => {
                err.add_context("table", table);
                self.reporter.report_error(&err);
                Err(err)
            }
        }
    }

    /// Manual navigation, gated on the data each stage needs.
    pub fn set_active_stage(&mut self, stage: Stage) -> bool {
        if !self.state.can_enter(stage) {
            tracing::debug!(feature = self.descriptor.key, %stage, "navigation rejected");
            return false;
        }
        self.state.active_stage = stage;
        true
    }

    pub fn dismiss_error(&mut self) -> Option<ErrorInfo> {
        self.state.error.take()
    }

    /// Apply one stage action.
    pub async fn dispatch(&mut self, action: StageAction<F>) -> Result<ActionOutcome, AppError> {
        let outcome = match action {
            StageAction::Idle => ActionOutcome::Idle,
            StageAction::SubmitInput { data, source_url } => {
                self.on_input_processed(data, source_url);
                ActionOutcome::Advanced(self.state.active_stage)
            }
            StageAction::SubmitMapping(mapped) => {
                if self.on_data_mapped(mapped) {
                    ActionOutcome::Advanced(self.state.active_stage)
                } else {
                    ActionOutcome::Rejected(SkipReason::NoInput)
                }
            }
            StageAction::RunProcessing => ActionOutcome::Processed(self.run_processing().await),
            StageAction::Navigate(stage) => {
                if self.set_active_stage(stage) {
                    ActionOutcome::Advanced(stage)
                } else {
                    ActionOutcome::Rejected(SkipReason::StageLocked(stage))
                }
            }
            StageAction::Save => ActionOutcome::Saved(self.save_result().await?),
            StageAction::DismissError => {
                self.dismiss_error();
                ActionOutcome::ErrorDismissed
            }
        };
        debug_assert!(self.state.invariants_hold());
        Ok(outcome)
    }
}

impl<F: Feature> Drop for PipelineController<F> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort.abort();
        }
    }
}

/// Cancels the run if `run_processing` is dropped before completing.
struct RunGuard<'a, F: Feature> {
    controller: &'a mut PipelineController<F>,
    armed: bool,
}

impl<F: Feature> Drop for RunGuard<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.cancel_processing();
        }
    }
}

struct FlagGuard<'a>(&'a mut bool);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        FlagGuard(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Builder wiring a controller's collaborators.
///
/// Strategy resolution: an explicit strategy wins, then the analytics
/// endpoint when a client is supplied, then the feature's built-in strategy.
pub struct PipelineBuilder<F: Feature> {
    feature: F,
    session: Option<Arc<SessionContext>>,
    records: Option<Arc<dyn RecordStore>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    strategy: Option<Arc<dyn ProcessingStrategy<F::Mapped, F::Output>>>,
    analytics: Option<Arc<AnalyticsClient>>,
    processing_timeout: Option<Duration>,
}

impl<F: Feature> PipelineBuilder<F> {
    pub fn new(feature: F) -> Self {
        Self {
            feature,
            session: None,
            records: None,
            reporter: None,
            strategy: None,
            analytics: None,
            processing_timeout: None,
        }
    }

    pub fn session(mut self, session: Arc<SessionContext>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn ProcessingStrategy<F::Mapped, F::Output>>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn analytics(mut self, client: Arc<AnalyticsClient>) -> Self {
        self.analytics = Some(client);
        self
    }

    pub fn processing_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.processing_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<PipelineController<F>, AppError> {
        let descriptor = self.feature.descriptor();
        let strategy = match (self.strategy, self.analytics) {
            (Some(strategy), _) => strategy,
            (None, Some(client)) => {
                let remote: Arc<dyn ProcessingStrategy<F::Mapped, F::Output>> =
                    Arc::new(RemoteStrategy::new(client, descriptor.api_endpoint));
                remote
            }
            (None, None) => self.feature.builtin_strategy().ok_or_else(|| {
                AppError::new(
                    ErrorCategory::ValidationError,
                    format!("feature '{}' has no processing strategy", descriptor.key),
                )
                .with_suggestion("Configure an analytics client or supply a strategy")
            })?,
        };

        Ok(PipelineController {
            feature: Arc::new(self.feature),
            descriptor,
            state: PipelineState::new(),
            strategy,
            session: self
                .session
                .unwrap_or_else(|| Arc::new(SessionContext::anonymous())),
            records: self
                .records
                .unwrap_or_else(|| Arc::new(InMemoryRecordStore::new())),
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(TracingErrorReporter::new())),
            processing_timeout: self.processing_timeout,
            last_seq: 0,
            in_flight: None,
        })
    }
}
