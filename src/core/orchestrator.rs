//! Enrollment orchestration.
//!
//! An enrollment is a fixed sequence of rule checks, cheapest first:
//! Financial, then Schedule, then Academic. Each check is awaited before the
//! next is issued and the first rejection ends the flow. [`EnrollmentStage`]
//! holds the transition rules; [`Coordinator`] drives it over the transport.

use crate::core::transport::{serve, Conversations, Mailbox, ServiceDirectory, TransportError};
use crate::domain::messages::{
    error_reply, ClientRequest, EnrollmentRequest, ReasonCode, RuleCheckResult, ServiceKind,
    Verdict, FINANCIAL_HOLD_MESSAGE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Upper bound for each individual rule check.
    pub reply_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Why a rule check produced no usable answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    Unresponsive,
    Unreachable,
    Malformed(String),
}

impl StepFailure {
    pub fn message(&self, service: ServiceKind) -> String {
        match self {
            StepFailure::Unresponsive => format!("{service} service unresponsive"),
            StepFailure::Unreachable => format!("{service} service unreachable"),
            StepFailure::Malformed(_) => format!("{service} service returned a malformed reply"),
        }
    }
}

impl From<TransportError> for StepFailure {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout { .. } => StepFailure::Unresponsive,
            TransportError::MailboxClosed { .. } | TransportError::ReplyDropped { .. } => {
                StepFailure::Unreachable
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentStage {
    AwaitingFinancial,
    AwaitingSchedule,
    AwaitingAcademic,
    Done(Verdict),
}

impl EnrollmentStage {
    pub fn awaiting(&self) -> Option<ServiceKind> {
        match self {
            EnrollmentStage::AwaitingFinancial => Some(ServiceKind::Financial),
            EnrollmentStage::AwaitingSchedule => Some(ServiceKind::Schedule),
            EnrollmentStage::AwaitingAcademic => Some(ServiceKind::Academic),
            EnrollmentStage::Done(_) => None,
        }
    }

    /// Applies the outcome of the check this stage is waiting for.
    /// A finished stage ignores further outcomes.
    pub fn advance(self, outcome: Result<RuleCheckResult, StepFailure>) -> Self {
        let Some(service) = self.awaiting() else {
            return self;
        };

        let result = match outcome {
            Ok(result) => result,
            Err(failure) => {
                return EnrollmentStage::Done(Verdict::rejected(
                    ReasonCode::Unavailable,
                    failure.message(service),
                ))
            }
        };

        if result.reason == Some(ReasonCode::NotFound) {
            return EnrollmentStage::Done(Verdict::rejected(ReasonCode::NotFound, result.message));
        }

        match (self, result.approved) {
            (EnrollmentStage::AwaitingFinancial, true) => EnrollmentStage::AwaitingSchedule,
            (EnrollmentStage::AwaitingFinancial, false) => EnrollmentStage::Done(
                Verdict::rejected(ReasonCode::FinancialHold, FINANCIAL_HOLD_MESSAGE),
            ),
            (EnrollmentStage::AwaitingSchedule, true) => EnrollmentStage::AwaitingAcademic,
            (EnrollmentStage::AwaitingSchedule, false) => {
                EnrollmentStage::Done(Verdict::rejected(
                    ReasonCode::ScheduleConflict,
                    format!("Conflito de horário: {}", result.message),
                ))
            }
            (EnrollmentStage::AwaitingAcademic, true) => {
                EnrollmentStage::Done(Verdict::Approved {
                    message: result.message,
                })
            }
            (EnrollmentStage::AwaitingAcademic, false) => EnrollmentStage::Done(
                Verdict::rejected(ReasonCode::AcademicIneligible, result.message),
            ),
            (done @ EnrollmentStage::Done(_), _) => done,
        }
    }
}

/// Front door of the registrar: validates client requests, runs enrollments
/// and forwards everything else to the owning service.
#[derive(Debug, Clone)]
pub struct Coordinator {
    directory: Arc<ServiceDirectory>,
    conversations: Conversations,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        directory: ServiceDirectory,
        conversations: Conversations,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            directory: Arc::new(directory),
            conversations,
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Runs one enrollment to its verdict. Never fails: every service problem
    /// becomes a rejection.
    pub async fn enroll(&self, request: &EnrollmentRequest) -> Verdict {
        info!(
            student = %request.student_id,
            course = %request.course_code,
            "🔄 Processing enrollment"
        );

        let mut stage = EnrollmentStage::AwaitingFinancial;
        loop {
            let (service, body) = match stage {
                EnrollmentStage::Done(verdict) => {
                    info!(
                        student = %request.student_id,
                        course = %request.course_code,
                        approved = verdict.is_approved(),
                        reason = verdict.reason().map(|r| r.as_str()).unwrap_or("-"),
                        "✅ Enrollment decided"
                    );
                    return verdict;
                }
                EnrollmentStage::AwaitingFinancial => {
                    (ServiceKind::Financial, request.financial_check())
                }
                EnrollmentStage::AwaitingSchedule => {
                    (ServiceKind::Schedule, request.schedule_check())
                }
                EnrollmentStage::AwaitingAcademic => {
                    (ServiceKind::Academic, request.academic_check())
                }
            };

            let outcome = self.check(service, body).await;
            stage = stage.advance(outcome);
        }
    }

    /// Answers one client request body. Invalid requests get an `erro` reply.
    pub async fn handle(&self, body: &Value) -> Value {
        let request = match ClientRequest::parse(body) {
            Ok(request) => request,
            Err(error) => {
                warn!("❌ Rejected client request: {}", error);
                return error.to_reply();
            }
        };

        match &request {
            ClientRequest::Enrollment(enrollment) => self.enroll(enrollment).await.to_reply(),
            other => self.forward(other).await,
        }
    }

    async fn forward(&self, request: &ClientRequest) -> Value {
        let Some((service, body)) = request.forwarded() else {
            return error_reply("Pedido inválido");
        };
        debug!(student = request.student_id(), %service, "Forwarding request");

        match self.call(service, body).await {
            Ok(reply) => reply,
            Err(failure) => json!({
                "status": "erro",
                "motivo": ReasonCode::Unavailable.as_str(),
                "mensagem": failure.message(service),
            }),
        }
    }

    async fn check(
        &self,
        service: ServiceKind,
        body: Value,
    ) -> Result<RuleCheckResult, StepFailure> {
        let reply = self.call(service, body).await?;
        RuleCheckResult::from_reply(service, &reply).map_err(|reason| {
            warn!(%service, %reason, "Malformed rule-check reply");
            StepFailure::Malformed(reason)
        })
    }

    async fn call(&self, service: ServiceKind, body: Value) -> Result<Value, StepFailure> {
        let Some(address) = self.directory.get(service) else {
            warn!(%service, "No address registered for service");
            return Err(StepFailure::Unreachable);
        };

        self.conversations
            .ask(address, body, self.settings.reply_timeout)
            .await
            .map_err(|error| {
                warn!(%service, "⚠️ {}", error);
                StepFailure::from(error)
            })
    }
}

/// Serves client requests addressed to the coordinator, one task per request.
pub fn spawn_coordinator(coordinator: Coordinator, mailbox: Mailbox) -> JoinHandle<()> {
    info!("🚀 Coordinator listening on '{}'", mailbox.name());
    serve(mailbox, move |body| {
        let coordinator = coordinator.clone();
        async move { coordinator.handle(&body).await }
    })
}
