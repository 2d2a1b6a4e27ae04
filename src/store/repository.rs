use super::{ProjectStore, StoreError};
use crate::records::{
    Annotation, FeatureVectorRow, ImageId, ImageRecord, LabelClass, ModelLibrary, ModelState,
    NewModelState, PredictionRow, PredictionType, ProjectSettings, StateId,
};

/// Query primitives of one project's relational store.
///
/// The orchestrator only talks to storage through this trait; the SQLite
/// [`ProjectStore`] is the production implementation. Model states are
/// append-only: there is no update primitive.
pub trait ProjectRepository {
    /// Shortname of the project this repository is scoped to.
    fn project(&self) -> &str;

    fn select_latest_state(&self, library: &ModelLibrary) -> Result<Option<ModelState>, StoreError>;

    fn select_partial_states(&self, library: &ModelLibrary) -> Result<Vec<ModelState>, StoreError>;

    /// Returns the new row id and its creation time (unix microseconds).
    fn insert_state(&self, state: &NewModelState) -> Result<(StateId, i64), StoreError>;

    fn delete_all_partial(&self, library: &ModelLibrary) -> Result<usize, StoreError>;

    /// Label classes created at or after `since` (unix microseconds).
    fn count_label_classes_since(&self, since: i64) -> Result<u64, StoreError>;

    fn select_label_classes(&self) -> Result<Vec<LabelClass>, StoreError>;

    fn select_images(&self, ids: &[ImageId]) -> Result<Vec<ImageRecord>, StoreError>;

    fn select_all_images(&self) -> Result<Vec<ImageRecord>, StoreError>;

    fn select_annotations(
        &self,
        ids: &[ImageId],
        annotation_type: PredictionType,
    ) -> Result<Vec<Annotation>, StoreError>;

    fn select_project_settings(&self) -> Result<ProjectSettings, StoreError>;

    fn insert_predictions(&self, rows: &[PredictionRow]) -> Result<usize, StoreError>;

    fn upsert_image_feature_vectors(&self, rows: &[FeatureVectorRow]) -> Result<usize, StoreError>;
}

impl ProjectRepository for ProjectStore {
    fn project(&self) -> &str {
        &self.project
    }

    fn select_latest_state(&self, library: &ModelLibrary) -> Result<Option<ModelState>, StoreError> {
        self.latest_state(library)
    }

    fn select_partial_states(&self, library: &ModelLibrary) -> Result<Vec<ModelState>, StoreError> {
        self.partial_states(library)
    }

    fn insert_state(&self, state: &NewModelState) -> Result<(StateId, i64), StoreError> {
        ProjectStore::insert_state(self, state)
    }

    fn delete_all_partial(&self, library: &ModelLibrary) -> Result<usize, StoreError> {
        ProjectStore::delete_all_partial(self, library)
    }

    fn count_label_classes_since(&self, since: i64) -> Result<u64, StoreError> {
        ProjectStore::count_label_classes_since(self, since)
    }

    fn select_label_classes(&self) -> Result<Vec<LabelClass>, StoreError> {
        self.label_classes()
    }

    fn select_images(&self, ids: &[ImageId]) -> Result<Vec<ImageRecord>, StoreError> {
        self.images(ids)
    }

    fn select_all_images(&self) -> Result<Vec<ImageRecord>, StoreError> {
        self.all_images()
    }

    fn select_annotations(
        &self,
        ids: &[ImageId],
        annotation_type: PredictionType,
    ) -> Result<Vec<Annotation>, StoreError> {
        self.annotations(ids, annotation_type)
    }

    fn select_project_settings(&self) -> Result<ProjectSettings, StoreError> {
        self.project_settings()
    }

    fn insert_predictions(&self, rows: &[PredictionRow]) -> Result<usize, StoreError> {
        ProjectStore::insert_predictions(self, rows)
    }

    fn upsert_image_feature_vectors(&self, rows: &[FeatureVectorRow]) -> Result<usize, StoreError> {
        self.upsert_feature_vectors(rows)
    }
}
