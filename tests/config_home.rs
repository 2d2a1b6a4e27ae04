mod support;

use aiworker::app_dirs::APP_DIR_NAME;
use aiworker::config::{self, CONFIG_FILE_NAME, WorkerConfig};
use aiworker::progress::RecordingSink;
use aiworker::records::PredictionType;
use aiworker::{InferenceRequest, Worker};
use support::fixtures::{PROJECT, ProjectFixture, image_ids, library};
use support::scripted_model::ScriptedModel;
use support::worker_env::WorkerEnvGuard;

#[test]
fn config_lives_under_the_overridden_home() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let _env = WorkerEnvGuard::set_config_home(temp.path().to_path_buf());

    let path = config::config_path().unwrap();
    assert_eq!(path, temp.path().join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    assert_eq!(config::load_or_default().unwrap(), WorkerConfig::default());

    let mut cfg = WorkerConfig::default();
    cfg.inference.batch_size_limit = Some(16);
    config::save(&cfg).unwrap();
    assert!(path.is_file());
    assert_eq!(config::load_or_default().unwrap(), cfg);
}

#[test]
fn worker_resolves_default_data_root_from_saved_config() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let _env = WorkerEnvGuard::set_config_home(temp.path().to_path_buf());
    let mut cfg = WorkerConfig::default();
    cfg.inference.batch_size_limit = Some(8);
    config::save(&cfg).unwrap();

    let worker = Worker::load().unwrap();
    assert_eq!(worker.config(), &cfg);
    let data_root = temp.path().join(APP_DIR_NAME).join("projects");
    assert_eq!(worker.data_root(), data_root);

    let store = worker.open_project("wildlife").unwrap();
    assert_eq!(store.path(), data_root.join("wildlife").join("project.db"));
    assert_eq!(worker.orchestrator(&store).project(), "wildlife");
}

#[test]
fn worker_orchestrator_chunks_with_the_configured_limit() {
    let fixture = ProjectFixture::new(PredictionType::Labels, 10);
    let mut cfg = WorkerConfig::default();
    cfg.store.data_root = Some(fixture.data_root().to_path_buf());
    cfg.inference.batch_size_limit = Some(4);
    let worker = Worker::from_config(cfg).unwrap();

    let store = worker.open_project(PROJECT).unwrap();
    let model = ScriptedModel::default();
    let outcome = worker
        .orchestrator(&store)
        .infer_batched_with_ranking(
            &model,
            None,
            &InferenceRequest::new(library(), image_ids(10)),
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(outcome.chunk_sizes, vec![4, 4, 2]);
    assert_eq!(fixture.store.prediction_count().unwrap(), 10);
}
