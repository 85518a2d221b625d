use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use virtual_registrar::adapters::{load_catalog, CatalogPaths};
use virtual_registrar::domain::messages::ServiceKind;
use virtual_registrar::domain::ports::RuleService;
use virtual_registrar::{CoordinatorSettings, ReasonCode, Registrar, RegistrarSettings, Verdict};

/// Academic service that never answers for one student.
struct StallingAcademic {
    stalled_student: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl RuleService for StallingAcademic {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Academic
    }

    async fn handle(&self, request: &Value) -> Value {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request["estudante_id"] == self.stalled_student {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        json!({"aprovado": true, "mensagem": "Elegível"})
    }
}

fn registrar_with(academic: Arc<StallingAcademic>) -> anyhow::Result<Registrar> {
    let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    let catalog = load_catalog(&CatalogPaths::in_dir(data_dir))?;

    let settings = RegistrarSettings {
        coordinator: CoordinatorSettings {
            reply_timeout: Duration::from_secs(1),
        },
        ..RegistrarSettings::default()
    };

    let registrar = Registrar::builder(settings)
        .with_catalog(Arc::new(catalog))
        .with_service(academic)
        .start()?;
    Ok(registrar)
}

#[tokio::test(start_paused = true)]
async fn test_stalled_check_does_not_block_other_enrollments() -> anyhow::Result<()> {
    let academic = Arc::new(StallingAcademic {
        stalled_student: "20230003",
        calls: AtomicUsize::new(0),
    });
    let registrar = registrar_with(academic.clone())?;

    let started = tokio::time::Instant::now();
    let (stalled, answered) = tokio::join!(
        registrar.enroll("20230003", "RC301"),
        registrar.enroll("20230001", "IA201"),
    );

    assert_eq!(stalled.reason(), Some(ReasonCode::Unavailable));
    assert_eq!(stalled.message(), "academic service unresponsive");
    assert_eq!(
        answered,
        Verdict::Approved {
            message: "Elegível".to_string()
        }
    );
    assert_eq!(academic.calls.load(Ordering::SeqCst), 2);

    // Only one reply timeout elapsed, not one per request
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_short_circuit_skips_stalled_service() -> anyhow::Result<()> {
    let academic = Arc::new(StallingAcademic {
        stalled_student: "20230002",
        calls: AtomicUsize::new(0),
    });
    let registrar = registrar_with(academic.clone())?;

    // Financial hold is decided before the academic service is asked
    let verdict = registrar.enroll("20230002", "ASM101").await;

    assert_eq!(verdict.reason(), Some(ReasonCode::FinancialHold));
    assert_eq!(academic.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_client_requests() -> anyhow::Result<()> {
    let academic = Arc::new(StallingAcademic {
        stalled_student: "nobody",
        calls: AtomicUsize::new(0),
    });
    let registrar = Arc::new(registrar_with(academic)?);

    let mut tasks = tokio::task::JoinSet::new();
    for index in 0..20 {
        let registrar = registrar.clone();
        tasks.spawn(async move {
            let student = if index % 2 == 0 { "20230001" } else { "20230002" };
            let reply = registrar
                .submit(json!({"tipo": "inscricao", "estudante_id": student, "disciplina": "IA201"}))
                .await;
            (student, reply)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (student, reply) = joined?;
        let reply = reply?;
        // Every reply belongs to the request that asked for it
        if student == "20230001" {
            assert_eq!(reply["status"], "aprovado");
        } else {
            assert_eq!(reply["motivo"], "financial_hold");
        }
    }

    Ok(())
}
