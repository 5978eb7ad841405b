use aih_billing_matcher::db::{load_catalog_csv, reports_to_csv};
use aih_billing_matcher::models::{CatalogProcedure, MatchStatus, MatchType, ProcedureValues, SexRestriction};
use aih_billing_matcher::{AppConfig, PipelineService, ReferenceCatalog};
use chrono::NaiveDate;
use std::io::Write;
use std::sync::Arc;

const TWO_RECORDS: &str = "\
Número da AIH: 412511245891-8
Situação: Apresentado Tipo: 1 - Inicial
Data início: 01/06/2025
Data fim: 03/06/2025
CNS autorizador: 702.0023.1543.2783
Prontuário: 5500602 - JOANIR VENANCIO
Nascimento: 18/04/1961
Sexo: Masculino
Procedimento principal: 04.15.02.006-9 - PROCEDIMENTOS SEQUENCIAIS EM ORTOPEDIA
CID principal: M751 - Síndrome do manguito rotador
Caráter atendimento: 1 - Eletivo
Procedimentos realizados:
1 04.15.02.006-9 - PROCEDIMENTOS SEQUENCIAIS EM ORTOPEDIA
000.000.175-74 225270 1º cirurgião 0017574
Dados complementares
Número da AIH: 41251124589-8
Data início: 05/06/2025
Data fim: 06/06/2025
Prontuário: 5500610 - MARIA APARECIDA
Sexo: Feminino
Procedimento principal: 04.15.02.006-9
";

fn values(hospital: i64) -> ProcedureValues {
    ProcedureValues {
        ambulatory: 0,
        hospital,
        professional: 35_050,
    }
}

fn catalog() -> ReferenceCatalog {
    ReferenceCatalog::new(
        Some("202506".into()),
        vec![
            CatalogProcedure::unrestricted("04.15.02.006-9", "PROCEDIMENTOS SEQUENCIAIS EM ORTOPEDIA", values(120_000)),
            CatalogProcedure::unrestricted("03.01.01.007-2", "CONSULTA", values(0)),
        ],
    )
}

fn service(catalog: ReferenceCatalog) -> PipelineService {
    PipelineService::new(&AppConfig::default(), Some(Arc::new(catalog)))
        .with_reference_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())
}

fn record_text(number: &str, sex: &str, procedure: &str) -> String {
    format!(
        "Número da AIH: {number}\n\
         Data início: 01/06/2025\n\
         Data fim: 02/06/2025\n\
         Prontuário: 1 - PACIENTE TESTE\n\
         Nascimento: 10/10/1990\n\
         Sexo: {sex}\n\
         Procedimento principal: {procedure}\n"
    )
}

#[test]
fn valid_record_is_approved_and_malformed_record_is_rejected() {
    let outcome = service(catalog()).process(TWO_RECORDS);
    assert!(outcome.success);

    let parse = &outcome.parse;
    assert_eq!(parse.valid_count, 1);
    assert_eq!(parse.invalid_count, 1);
    let malformed = &parse.invalid[0];
    assert_eq!(malformed.record.record_number.as_deref(), Some("41251124589-8"));
    let fields: Vec<&str> = malformed.errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["record_number"]);
    assert_eq!(parse.errors[0].record_index, 2);

    let valid = &parse.valid[0];
    assert_eq!(valid.record_number.as_deref(), Some("412511245891-8"));
    assert_eq!(valid.performed.len(), 1);
    assert_eq!(valid.performed[0].participants[0].occupation_code, "225270");

    // only the valid record is matched
    let analysis = &outcome.analysis;
    assert_eq!(analysis.reports.len(), 1);
    let report = &analysis.reports[0];
    assert_eq!(report.record_number, "412511245891-8");
    let best = report.best_match.as_ref().expect("best match");
    assert_eq!(best.match_type, MatchType::Exact);
    assert_eq!(best.status, MatchStatus::Approved);
    assert_eq!(best.values.total, 155_050);
    assert!(report.alternatives.is_empty());
    assert!(report.issues.is_empty());
    assert_eq!(report.suggested_actions, vec!["proceed with billing"]);

    assert_eq!(analysis.stats.records, 1);
    assert_eq!(analysis.stats.approved_candidates, 1);
}

#[test]
fn unknown_code_reports_no_compatible_procedure() {
    let text = record_text("412511245891-8", "Masculino", "02.11.07.014-4");
    let outcome = service(catalog()).process(&text);

    assert!(outcome.success);
    let report = &outcome.analysis.reports[0];
    assert!(report.best_match.is_none());
    assert!(report.alternatives.is_empty());
    assert_eq!(report.issues, vec!["no compatible procedure found"]);
    assert!(report.needs_review());
}

#[test]
fn sex_restriction_costs_exactly_the_sex_weight() {
    let mut restricted = CatalogProcedure::unrestricted("04.09.06.013-5", "HISTERECTOMIA", values(200_000));
    restricted.sex = SexRestriction::Female;
    let service = service(ReferenceCatalog::new(None, vec![restricted]));

    let female = service.process(&record_text("412511245891-8", "Feminino", "04.09.06.013-5"));
    let male = service.process(&record_text("412511245892-6", "Masculino", "04.09.06.013-5"));

    let female_best = female.analysis.reports[0].best_match.clone().unwrap();
    let male_best = male.analysis.reports[0].best_match.clone().unwrap();
    assert_eq!(female_best.score - male_best.score, AppConfig::default().matching.weights.sex);
    assert!(male.analysis.reports[0]
        .issues
        .iter()
        .any(|i| i == "patient sex incompatible with procedure"));
    assert_eq!(male.analysis.reports[0].validation_summary.failed, 1);
}

#[test]
fn empty_input_fails_the_whole_batch() {
    let outcome = service(catalog()).process("\n\n");
    assert!(!outcome.success);
    assert_eq!(outcome.parse.total_processed, 0);
    assert!(outcome.analysis.reports.is_empty());
}

#[test]
fn csv_catalog_feeds_the_pipeline_and_export() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "code,description,value_amb,value_hosp,value_prof,gender\n\
         04.15.02.006-9,PROCEDIMENTOS SEQUENCIAIS EM ORTOPEDIA,0,1200.00,350.50,\n\
         04.15.02.003-4,OUTRO SEQUENCIAL,0,900.00,100.00,\n\
         04.15.02.006-9,DUPLICADO,0,1.00,1.00,"
    )
    .unwrap();

    let catalog = load_catalog_csv(file.path(), Some("csv".into())).unwrap();
    assert_eq!(catalog.len(), 2);

    let text = record_text("412511245891-8", "Masculino", "04.15.02.006-9");
    let outcome = service(catalog).process(&text);
    let report = &outcome.analysis.reports[0];
    assert_eq!(report.best_match.as_ref().unwrap().values.total, 155_050);
    assert_eq!(report.alternatives.len(), 1);
    assert_eq!(report.alternatives[0].match_type, MatchType::Similar);

    let csv = String::from_utf8(reports_to_csv(&outcome.analysis.reports).unwrap()).unwrap();
    assert_eq!(csv.lines().count(), 3);
}
