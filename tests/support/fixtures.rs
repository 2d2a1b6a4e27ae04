use std::path::Path;

use aiworker::records::{
    Annotation, ImageId, ImageRecord, LabelClass, ModelLibrary, PredictionType, ProjectSettings,
    now_micros,
};
use aiworker::store::ProjectStore;
use tempfile::TempDir;

pub const PROJECT: &str = "camtraps";
pub const CRITERION: &str = "ai.al.builtins.maxconfidence.MaxConfidence";

pub fn library() -> ModelLibrary {
    ModelLibrary::new("ai.models.detectron2.FasterRCNN")
}

pub fn image_ids(count: usize) -> Vec<ImageId> {
    (1..=count).map(|idx| ImageId::new(format!("img-{idx:03}"))).collect()
}

/// A seeded project database inside a temporary data root.
pub struct ProjectFixture {
    pub dir: TempDir,
    pub store: ProjectStore,
}

impl ProjectFixture {
    /// Project with `images` images, two label classes and one annotation per image.
    pub fn new(prediction_type: PredictionType, images: usize) -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let store = ProjectStore::open(dir.path(), PROJECT).expect("open project store");
        seed(&store, prediction_type, images);
        Self { dir, store }
    }

    pub fn data_root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_label_class(&self, id: &str, index: i64) {
        let mut batch = self.store.write_batch().expect("begin batch");
        batch
            .insert_label_class(&LabelClass {
                id: id.to_string(),
                name: id.to_string(),
                index,
                created_at: now_micros(),
            })
            .expect("insert label class");
        batch.commit().expect("commit label class");
    }
}

fn seed(store: &ProjectStore, prediction_type: PredictionType, images: usize) {
    let mut batch = store.write_batch().expect("begin batch");
    batch
        .set_project_settings(&ProjectSettings {
            annotation_type: PredictionType::BoundingBoxes,
            prediction_type,
            model_library: Some(library()),
            criterion_library: Some(CRITERION.to_string()),
        })
        .expect("settings");
    for (index, name) in ["deer", "fox"].into_iter().enumerate() {
        batch
            .insert_label_class(&LabelClass {
                id: format!("class-{name}"),
                name: name.to_string(),
                index: index as i64,
                created_at: 1,
            })
            .expect("label class");
    }
    for (idx, id) in image_ids(images).into_iter().enumerate() {
        batch
            .insert_image(&ImageRecord {
                id: id.clone(),
                filename: format!("{id}.jpg"),
                annotations: None,
            })
            .expect("image");
        batch
            .insert_annotation(&Annotation {
                id: format!("anno-{idx}"),
                image: id,
                label: Some("class-deer".to_string()),
                x: Some(0.5),
                y: Some(0.5),
                width: Some(0.2),
                height: Some(0.3),
                ..Annotation::default()
            })
            .expect("annotation");
    }
    batch.commit().expect("commit seed");
}
