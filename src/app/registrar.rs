use crate::app::services::{
    AcademicRules, AcademicService, FinancialService, RegulationsService, ScheduleService,
};
use crate::core::orchestrator::{spawn_coordinator, Coordinator, CoordinatorSettings};
use crate::core::schedule::{ConflictDetector, ParseMode};
use crate::core::transport::{
    mailbox, serve_rule_service, Address, Conversations, ServiceDirectory, TransportError,
};
use crate::domain::messages::{EnrollmentRequest, ServiceKind, Verdict};
use crate::domain::model::SharedCatalog;
use crate::domain::ports::RuleService;
use crate::utils::error::{RegistrarError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// How long a client waits on the coordinator, in units of one rule-check timeout.
/// An enrollment makes at most three sequential checks.
const CLIENT_TIMEOUT_FACTOR: u32 = 4;

const SERVICE_KINDS: [ServiceKind; 4] = [
    ServiceKind::Financial,
    ServiceKind::Schedule,
    ServiceKind::Academic,
    ServiceKind::Regulations,
];

#[derive(Debug, Clone)]
pub struct RegistrarSettings {
    pub coordinator: CoordinatorSettings,
    pub mailbox_capacity: usize,
    pub parse_mode: ParseMode,
    pub academic: AcademicRules,
}

impl Default for RegistrarSettings {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorSettings::default(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            parse_mode: ParseMode::default(),
            academic: AcademicRules::default(),
        }
    }
}

impl RegistrarSettings {
    pub fn client_timeout(&self) -> Duration {
        self.coordinator.reply_timeout * CLIENT_TIMEOUT_FACTOR
    }
}

/// Wires the services, the coordinator and their mailboxes.
///
/// Services not supplied through [`RegistrarBuilder::with_service`] are the
/// catalog-backed defaults, so a catalog is required unless all four are given.
pub struct RegistrarBuilder {
    settings: RegistrarSettings,
    catalog: Option<SharedCatalog>,
    services: HashMap<ServiceKind, Arc<dyn RuleService>>,
}

impl RegistrarBuilder {
    pub fn new(settings: RegistrarSettings) -> Self {
        Self {
            settings,
            catalog: None,
            services: HashMap::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: SharedCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Replaces the default service for `service.kind()`.
    pub fn with_service(mut self, service: Arc<dyn RuleService>) -> Self {
        self.services.insert(service.kind(), service);
        self
    }

    fn default_service(&self, kind: ServiceKind) -> Result<Arc<dyn RuleService>> {
        let catalog = self
            .catalog
            .clone()
            .ok_or_else(|| RegistrarError::MissingConfigError {
                field: format!("catalog for the {kind} service"),
            })?;

        let service: Arc<dyn RuleService> = match kind {
            ServiceKind::Financial => Arc::new(FinancialService::new(catalog)),
            ServiceKind::Schedule => Arc::new(ScheduleService::new(
                catalog,
                ConflictDetector::new(self.settings.parse_mode),
            )),
            ServiceKind::Academic => {
                Arc::new(AcademicService::new(catalog, self.settings.academic))
            }
            ServiceKind::Regulations => Arc::new(RegulationsService::new(catalog)),
        };
        Ok(service)
    }

    /// Spawns every task. Must be called from within a Tokio runtime.
    pub fn start(mut self) -> Result<Registrar> {
        let capacity = self.settings.mailbox_capacity;
        let mut tasks = Vec::new();
        let mut directory = ServiceDirectory::new();

        for kind in SERVICE_KINDS {
            let service = match self.services.remove(&kind) {
                Some(service) => service,
                None => self.default_service(kind)?,
            };
            let (address, inbox) = mailbox(kind.label(), capacity);
            tasks.push(serve_rule_service(inbox, service));
            directory.register(kind, address);
        }

        let (conversations, router) = Conversations::start("coordinator", capacity);
        tasks.push(router);
        let coordinator = Coordinator::new(directory, conversations, self.settings.coordinator);

        let (address, inbox) = mailbox("coordinator", capacity);
        tasks.push(spawn_coordinator(coordinator.clone(), inbox));

        let (client, client_router) = Conversations::start("client", capacity);
        tasks.push(client_router);

        tracing::info!(
            "✅ Registrar started: {} services, reply timeout {:?}, {:?} schedule parsing",
            SERVICE_KINDS.len(),
            self.settings.coordinator.reply_timeout,
            self.settings.parse_mode
        );

        Ok(Registrar {
            coordinator,
            address,
            client,
            settings: self.settings,
            tasks,
        })
    }
}

/// A running registrar.
pub struct Registrar {
    coordinator: Coordinator,
    address: Address,
    client: Conversations,
    settings: RegistrarSettings,
    tasks: Vec<JoinHandle<()>>,
}

impl Registrar {
    pub fn builder(settings: RegistrarSettings) -> RegistrarBuilder {
        RegistrarBuilder::new(settings)
    }

    pub fn settings(&self) -> &RegistrarSettings {
        &self.settings
    }

    /// Coordinator address, for clients posting their own envelopes.
    pub fn address(&self) -> Address {
        self.address.clone()
    }

    pub async fn enroll(
        &self,
        student_id: impl Into<String>,
        course_code: impl Into<String>,
    ) -> Verdict {
        self.coordinator
            .enroll(&EnrollmentRequest::new(student_id, course_code))
            .await
    }

    /// Sends a raw client request through the coordinator's mailbox.
    pub async fn submit(&self, request: Value) -> std::result::Result<Value, TransportError> {
        self.client
            .ask(&self.address, request, self.settings.client_timeout())
            .await
    }

    pub fn shutdown(mut self) {
        self.abort_tasks();
        tracing::info!("🛑 Registrar stopped");
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Registrar {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::fixtures;
    use crate::domain::messages::ReasonCode;
    use async_trait::async_trait;
    use serde_json::json;

    struct SilentFinancial;

    #[async_trait]
    impl RuleService for SilentFinancial {
        fn kind(&self) -> ServiceKind {
            ServiceKind::Financial
        }

        async fn handle(&self, _request: &Value) -> Value {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            json!({"aprovado": true})
        }
    }

    #[tokio::test]
    async fn test_enroll_with_default_services() {
        let registrar = Registrar::builder(RegistrarSettings::default())
            .with_catalog(fixtures::catalog())
            .start()
            .unwrap();

        let verdict = registrar.enroll("20230001", "IA201").await;
        assert_eq!(
            verdict,
            Verdict::Approved {
                message: "Inscrição aprovada em Inteligência Artificial (6 créditos)".to_string()
            }
        );
        registrar.shutdown();
    }

    #[tokio::test]
    async fn test_submit_goes_through_coordinator_mailbox() {
        let registrar = Registrar::builder(RegistrarSettings::default())
            .with_catalog(fixtures::catalog())
            .start()
            .unwrap();

        let reply = registrar
            .submit(json!({"tipo": "inscricao", "estudante_id": "20230002", "disciplina": "ASM101"}))
            .await
            .unwrap();
        assert_eq!(reply["status"], "recusado");
        assert_eq!(reply["motivo"], "financial_hold");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_service_timeout_is_reported() {
        let registrar = Registrar::builder(RegistrarSettings::default())
            .with_catalog(fixtures::catalog())
            .with_service(Arc::new(SilentFinancial))
            .start()
            .unwrap();

        let verdict = registrar.enroll("20230001", "IA201").await;
        assert_eq!(verdict.reason(), Some(ReasonCode::Unavailable));
    }

    #[tokio::test]
    async fn test_start_without_catalog_fails() {
        let result = Registrar::builder(RegistrarSettings::default())
            .with_service(Arc::new(SilentFinancial))
            .start();
        assert!(matches!(
            result,
            Err(RegistrarError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_client_timeout_covers_all_checks() {
        let settings = RegistrarSettings::default();
        assert_eq!(settings.client_timeout(), Duration::from_secs(40));
    }
}
