use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use virtual_registrar::adapters::load_catalog;
use virtual_registrar::utils::validation::Validate;
use virtual_registrar::{ReasonCode, Registrar, RegistrarConfig, Verdict};

fn seeded_registrar() -> anyhow::Result<Registrar> {
    let config_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("registrar.toml");
    let config = RegistrarConfig::from_file(config_path)?;
    config.validate()?;

    let catalog = load_catalog(&config.catalog_paths())?;
    let registrar = Registrar::builder(config.settings()?)
        .with_catalog(Arc::new(catalog))
        .start()?;
    Ok(registrar)
}

#[tokio::test]
async fn test_enrollment_approved_end_to_end() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let verdict = registrar.enroll("20230001", "IA201").await;

    assert_eq!(
        verdict,
        Verdict::Approved {
            message: "Inscrição aprovada em Inteligência Artificial (6 créditos)".to_string()
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_financial_hold_end_to_end() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let verdict = registrar.enroll("20230002", "ASM101").await;

    assert_eq!(verdict.reason(), Some(ReasonCode::FinancialHold));
    assert_eq!(
        verdict.message(),
        "Propinas em atraso. Regularize a situação antes de se inscrever."
    );
    Ok(())
}

#[tokio::test]
async fn test_schedule_conflict_end_to_end() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let verdict = registrar.enroll("20230001", "BD101").await;

    assert_eq!(
        verdict,
        Verdict::rejected(
            ReasonCode::ScheduleConflict,
            "Conflito de horário: Conflito com Sistemas Operativos (SO201)"
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_prerequisite_end_to_end() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let verdict = registrar.enroll("20230003", "IA201").await;

    assert_eq!(
        verdict,
        Verdict::rejected(ReasonCode::AcademicIneligible, "Faltam pré-requisitos: ASM101")
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_student_end_to_end() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let verdict = registrar.enroll("99999999", "IA201").await;

    assert_eq!(
        verdict,
        Verdict::rejected(ReasonCode::NotFound, "Estudante não encontrado")
    );
    Ok(())
}

#[tokio::test]
async fn test_client_requests_through_coordinator_mailbox() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let enrollment = registrar
        .submit(json!({"tipo": "inscricao", "estudante_id": "20230001", "disciplina": "IA201"}))
        .await?;
    assert_eq!(
        enrollment,
        json!({
            "status": "aprovado",
            "mensagem": "Inscrição aprovada em Inteligência Artificial (6 créditos)"
        })
    );

    let equivalence = registrar
        .submit(json!({
            "tipo": "equivalencia",
            "estudante_id": "20230003",
            "disciplina_origem": "BD101",
            "disciplina_destino": "RC301"
        }))
        .await?;
    assert_eq!(equivalence["status"], "aprovado");

    let statute = registrar
        .submit(json!({
            "tipo": "estatuto",
            "estudante_id": "20230001",
            "tipo_estatuto": "estudante-trabalhador",
            "documentos": ["Contrato de trabalho válido", "Declaração da entidade empregadora"]
        }))
        .await?;
    assert_eq!(statute["status"], "aprovado");
    assert_eq!(statute["beneficios"][0], "Horário flexível");

    let timetable = registrar
        .submit(json!({"tipo": "consulta_horario", "estudante_id": "20230001"}))
        .await?;
    assert_eq!(timetable["horarios"][0]["codigo"], "SO201");

    let debts = registrar
        .submit(json!({"tipo": "consulta_dividas", "estudante_id": "20230002"}))
        .await?;
    assert_eq!(debts["tem_dividas"], true);

    let statutes = registrar
        .submit(json!({"tipo": "consulta_estatuto", "estudante_id": "20230001"}))
        .await?;
    assert_eq!(statutes["estatutos"].as_array().map(Vec::len), Some(4));

    Ok(())
}

#[tokio::test]
async fn test_invalid_client_requests_get_error_replies() -> anyhow::Result<()> {
    let registrar = seeded_registrar()?;

    let unknown = registrar
        .submit(json!({"tipo": "trancar_matricula", "estudante_id": "20230001"}))
        .await?;
    assert_eq!(
        unknown,
        json!({"status": "erro", "mensagem": "Tipo de pedido desconhecido"})
    );

    let missing = registrar
        .submit(json!({"tipo": "inscricao", "estudante_id": "20230001"}))
        .await?;
    assert_eq!(missing["status"], "erro");
    assert_eq!(missing["mensagem"], "Campo obrigatório em falta: disciplina");

    Ok(())
}
