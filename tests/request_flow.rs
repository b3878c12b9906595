// tests/request_flow.rs
use grade_lib::api::PredictionService;
use grade_lib::features::FeatureSchema;
use grade_lib::models::estimator::{
    Aggregation, EstimatorSpec, TreeEnsembleParams, TreeNode, TreeParams,
};
use grade_lib::models::{Gender, ModelArtifact, ModelKey, Period, Subject};
use grade_lib::utils::config::ServiceConfig;
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_artifact(dir: &Path, key: ModelKey, artifact: &ModelArtifact) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(key.file_name()),
        serde_json::to_vec_pretty(artifact).unwrap(),
    )
    .unwrap();
}

/// Linear math model for boys; tree model for girls that splits on G2.
fn seed_models(dir: &Path) {
    let schema = FeatureSchema::extended();
    let mut coefficients = vec![0.0; schema.len()];
    coefficients[schema.position("G2").unwrap()] = 0.8;
    coefficients[schema.position("Bum").unwrap()] = -2.0;
    write_artifact(
        dir,
        ModelKey::new(Subject::Math, Gender::Male, Period::Final),
        &ModelArtifact::linear(schema, coefficients, 2.0),
    );

    let g2 = schema.position("G2").unwrap();
    let tree = ModelArtifact {
        feature_names: schema.names().map(str::to_string).collect(),
        estimator: EstimatorSpec::TreeEnsemble(TreeEnsembleParams {
            base_score: 0.0,
            aggregation: Aggregation::Mean,
            trees: vec![TreeParams {
                nodes: vec![
                    TreeNode::Split {
                        feature: g2,
                        threshold: 10.0,
                        left: 1,
                        right: 2,
                        default_left: true,
                    },
                    TreeNode::Leaf { leaf: 8.0 },
                    TreeNode::Leaf { leaf: 14.0 },
                ],
            }],
        }),
    };
    write_artifact(
        dir,
        ModelKey::new(Subject::Math, Gender::Female, Period::Final),
        &tree,
    );
}

fn representative_body(gender: &str) -> JsonValue {
    json!({
        "subject": "mathematics",
        "gender": gender,
        "school": 0,
        "address": 1,
        "famsize": 0,
        "Pstatus": 1,
        "age": 17,
        "Medu": 2,
        "Fedu": 2,
        "traveltime": 2,
        "studytime": 2,
        "failures": 0,
        "schoolsup": "no",
        "famsup": "yes",
        "paid": "no",
        "activities": "yes",
        "nursery": "yes",
        "higher": "yes",
        "internet": "yes",
        "romantic": "no",
        "famrel": 4,
        "freetime": 3,
        "goout": 3,
        "Dalc": 1,
        "Walc": 2,
        "health": 3,
        "absences": 4,
        "Mjob": "services",
        "Fjob": "other",
        "reason": "course",
        "guardian": "mother",
        "G1": 15,
        "G2": 15
    })
}

fn service_for(dir: &TempDir, feedback_enabled: bool) -> PredictionService {
    let config = ServiceConfig {
        models_dir: dir.path().join("models"),
        feedback_path: dir.path().join("feedback_data").join("feedback_data.csv"),
        feedback_enabled,
        log_file: None,
    };
    PredictionService::from_config(&config).unwrap()
}

#[test]
fn predicts_final_grade_from_disk_models() {
    let dir = TempDir::new().unwrap();
    seed_models(&dir.path().join("models"));
    let service = service_for(&dir, false);

    let first = service.handle("/api/predict", &representative_body("male"));
    let second = service.handle("/api/predict", &representative_body("male"));
    assert_eq!(first.status, 200);
    assert_eq!(first.body, second.body);

    let g3 = first.body["predictions"]["G3"].as_f64().unwrap();
    assert!(g3.is_finite());
    // 2.0 + 0.8 * 15 - 2 * Bum, with a small positive risk score.
    assert!(g3 < 14.0 && g3 > 12.0, "unexpected prediction {}", g3);

    let mut annotated = representative_body("male");
    annotated["meta"] = json!({ "client": "web", "tags": ["beta"] });
    let annotated = service.handle("predict", &annotated);
    assert_eq!(annotated.status, 200);
    assert_eq!(annotated.body, first.body);

    let tree = service.handle("predict", &representative_body("female"));
    assert_eq!(tree.body, json!({ "predictions": { "G3": 14.0 } }));

    let mut low = representative_body("female");
    low["G2"] = json!(6);
    let low = service.handle("predict", &low);
    assert_eq!(low.body, json!({ "predictions": { "G3": 8.0 } }));
}

#[test]
fn reports_validation_and_missing_models() {
    let dir = TempDir::new().unwrap();
    seed_models(&dir.path().join("models"));
    let service = service_for(&dir, false);

    let mut no_gender = representative_body("male");
    no_gender.as_object_mut().unwrap().remove("gender");
    let response = service.handle("predict", &no_gender);
    assert_eq!(response.status, 400);

    let mut chemistry = representative_body("male");
    chemistry["subject"] = json!("chemistry");
    let response = service.handle("predict", &chemistry);
    assert_eq!(response.status, 400);

    let mut portuguese = representative_body("male");
    portuguese["subject"] = json!("portuguese");
    let response = service.handle("predict", &portuguese);
    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], json!("Model not found: por_male_G3"));

    let mut bad_grade = representative_body("male");
    bad_grade["G1"] = json!("fifteen");
    let response = service.handle("predict", &bad_grade);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], json!("G1 must be a valid number"));

    let mut blank_grade = representative_body("male");
    blank_grade["G2"] = json!("   ");
    let response = service.handle("predict", &blank_grade);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], json!("G2 must be a valid number"));
}

#[test]
fn records_feedback_rows() {
    let dir = TempDir::new().unwrap();
    seed_models(&dir.path().join("models"));
    let service = service_for(&dir, true);

    let mut body = representative_body("female");
    body["G1"] = json!(10);
    body["G2"] = json!(12);
    body["G3"] = json!(11);
    let response = service.handle("/api/new-data", &body);
    assert_eq!(response.status, 200);

    let path = dir.path().join("feedback_data").join("feedback_data.csv");
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header = reader.headers().unwrap().clone();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(header.len(), FeatureSchema::extended().len() + 1);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), header.len());

    let column = |name: &str| -> f64 {
        let idx = header.iter().position(|h| h == name).unwrap();
        rows[0][idx].parse().unwrap()
    };
    assert_eq!(column("Gvg"), 11.0);
    assert_eq!(column("sex"), 0.0);
    assert_eq!(column("Mjob_services"), 1.0);
    assert_eq!(column("G3"), 11.0);
}

#[test]
fn refuses_schema_mismatched_artifacts_at_startup() {
    let dir = TempDir::new().unwrap();
    let models = dir.path().join("models");
    let schema = FeatureSchema::base();
    write_artifact(
        &models,
        ModelKey::new(Subject::Language, Gender::Male, Period::Final),
        &ModelArtifact::linear(schema, vec![0.0; schema.len()], 0.0),
    );

    let config = ServiceConfig {
        models_dir: models,
        ..ServiceConfig::default()
    };
    assert!(PredictionService::from_config(&config).is_err());
}
