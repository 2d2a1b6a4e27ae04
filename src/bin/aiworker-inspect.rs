//! Developer utility to inspect a project database and summarize its contents.

use std::path::{Path, PathBuf};

use aiworker::Worker;
use aiworker::records::ModelLibrary;
use aiworker::store::{ProjectStore, StoreError};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let worker = Worker::load().map_err(|err| err.to_string())?;
    if let Err(err) = worker.init_logging() {
        eprintln!("Logging disabled: {err}");
    }
    let Some(options) = parse_args(&worker, std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    println!("DB: {}", options.db_path.display());
    if let Ok(meta) = std::fs::metadata(&options.db_path) {
        println!("Size: {} bytes", meta.len());
    }

    let store = ProjectStore::open_read_only(&options.db_path, &options.project)
        .map_err(|err| err.to_string())?;
    println!("Project: {}", options.project);

    match store.project_settings() {
        Ok(settings) => {
            println!("annotation_type: {}", settings.annotation_type);
            println!("prediction_type: {}", settings.prediction_type);
            if let Some(library) = &settings.model_library {
                println!("model_library: {library}");
            }
            if let Some(criterion) = &settings.criterion_library {
                println!("criterion_library: {criterion}");
            }
        }
        Err(StoreError::MissingSetting(key)) => println!("settings: missing {key}"),
        Err(err) => return Err(err.to_string()),
    }
    let classes = store.label_classes().map_err(|err| err.to_string())?;
    println!("label_classes: {}", classes.len());
    let images = store.all_images().map_err(|err| err.to_string())?;
    println!("images: {}", images.len());
    let predictions = store.prediction_count().map_err(|err| err.to_string())?;
    println!("predictions: {predictions}");

    let library = options
        .library
        .or_else(|| store.project_settings().ok().and_then(|s| s.model_library));
    let Some(library) = library else {
        println!();
        println!("No model library given; pass --library to list model states.");
        return Ok(());
    };

    println!();
    println!("Model states of {library}:");
    let states = store.list_states(&library).map_err(|err| err.to_string())?;
    let partial = states.iter().filter(|state| state.partial).count();
    println!("- total: {}", states.len());
    println!("- partial: {partial}");
    match store.latest_state(&library).map_err(|err| err.to_string())? {
        Some(state) => println!(
            "- latest: id={} created_at={} bytes={}",
            state.id,
            state.created_at,
            state.state_dict.len()
        ),
        None => println!("- latest: (none)"),
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    db_path: PathBuf,
    project: String,
    library: Option<ModelLibrary>,
}

fn parse_args(worker: &Worker, args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut db_path: Option<PathBuf> = None;
    let mut project: Option<String> = None;
    let mut library: Option<ModelLibrary> = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--db" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--db requires a value".to_string())?;
                db_path = Some(PathBuf::from(value));
            }
            "--project" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--project requires a value".to_string())?;
                project = Some(value.clone());
            }
            "--library" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--library requires a value".to_string())?;
                library = Some(ModelLibrary::new(value.as_str()));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let (db_path, project) = match (db_path, project) {
        (Some(db_path), Some(project)) => (db_path, project),
        (Some(db_path), None) => {
            let project = project_from_path(&db_path).ok_or_else(|| {
                "--project is required when it cannot be derived from --db".to_string()
            })?;
            (db_path, project)
        }
        (None, Some(project)) => (worker.project_db_path(&project), project),
        (None, None) => return Err(format!("--db or --project is required\n\n{}", help_text())),
    };
    Ok(Some(CliOptions {
        db_path,
        project,
        library,
    }))
}

/// Projects live at `<data_root>/<project>/project.db`.
fn project_from_path(db_path: &Path) -> Option<String> {
    db_path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

fn help_text() -> String {
    [
        "aiworker-inspect",
        "",
        "Usage:",
        "  aiworker-inspect --db <path-to-project.db> [--project <name>] [--library <model-library>]",
        "  aiworker-inspect --project <name> [--library <model-library>]",
        "",
        "Without --db the database is looked up under the configured data root.",
    ]
    .join("\n")
}
