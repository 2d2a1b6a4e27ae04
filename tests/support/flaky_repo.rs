use std::sync::Mutex;

use aiworker::records::{
    Annotation, FeatureVectorRow, ImageId, ImageRecord, LabelClass, ModelLibrary, ModelState,
    NewModelState, PredictionRow, PredictionType, ProjectSettings, StateId,
};
use aiworker::store::{ProjectRepository, ProjectStore, StoreError};

/// Wraps a [`ProjectStore`], logging prediction inserts and failing selected writes.
pub struct FlakyRepository<'a> {
    inner: &'a ProjectStore,
    /// 1-based `insert_predictions` call that fails with `StoreError::Busy`.
    pub fail_insert_on: Option<usize>,
    pub fail_latest_state: bool,
    /// Fail every non-partial `insert_state` with `StoreError::Busy`.
    pub fail_insert_state: bool,
    inserts: Mutex<Vec<Vec<ImageId>>>,
    deletes: Mutex<usize>,
}

impl<'a> FlakyRepository<'a> {
    pub fn new(inner: &'a ProjectStore) -> Self {
        Self {
            inner,
            fail_insert_on: None,
            fail_latest_state: false,
            fail_insert_state: false,
            inserts: Mutex::new(Vec::new()),
            deletes: Mutex::new(0),
        }
    }

    /// Image ids of every successful `insert_predictions` call, in call order.
    pub fn inserts(&self) -> Vec<Vec<ImageId>> {
        self.inserts
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn delete_calls(&self) -> usize {
        *self.deletes.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ProjectRepository for FlakyRepository<'_> {
    fn project(&self) -> &str {
        self.inner.project()
    }

    fn select_latest_state(&self, library: &ModelLibrary) -> Result<Option<ModelState>, StoreError> {
        if self.fail_latest_state {
            return Err(StoreError::Busy);
        }
        self.inner.select_latest_state(library)
    }

    fn select_partial_states(&self, library: &ModelLibrary) -> Result<Vec<ModelState>, StoreError> {
        self.inner.select_partial_states(library)
    }

    fn insert_state(&self, state: &NewModelState) -> Result<(StateId, i64), StoreError> {
        if self.fail_insert_state && !state.partial {
            return Err(StoreError::Busy);
        }
        self.inner.insert_state(state)
    }

    fn delete_all_partial(&self, library: &ModelLibrary) -> Result<usize, StoreError> {
        *self.deletes.lock().unwrap_or_else(|err| err.into_inner()) += 1;
        self.inner.delete_all_partial(library)
    }

    fn count_label_classes_since(&self, since: i64) -> Result<u64, StoreError> {
        self.inner.count_label_classes_since(since)
    }

    fn select_label_classes(&self) -> Result<Vec<LabelClass>, StoreError> {
        self.inner.select_label_classes()
    }

    fn select_images(&self, ids: &[ImageId]) -> Result<Vec<ImageRecord>, StoreError> {
        self.inner.select_images(ids)
    }

    fn select_all_images(&self) -> Result<Vec<ImageRecord>, StoreError> {
        self.inner.select_all_images()
    }

    fn select_annotations(
        &self,
        ids: &[ImageId],
        annotation_type: PredictionType,
    ) -> Result<Vec<Annotation>, StoreError> {
        self.inner.select_annotations(ids, annotation_type)
    }

    fn select_project_settings(&self) -> Result<ProjectSettings, StoreError> {
        self.inner.select_project_settings()
    }

    fn insert_predictions(&self, rows: &[PredictionRow]) -> Result<usize, StoreError> {
        let mut inserts = self.inserts.lock().unwrap_or_else(|err| err.into_inner());
        if self.fail_insert_on == Some(inserts.len() + 1) {
            return Err(StoreError::Busy);
        }
        let inserted = self.inner.insert_predictions(rows)?;
        let mut images: Vec<ImageId> = Vec::new();
        for row in rows {
            if !images.contains(&row.image) {
                images.push(row.image.clone());
            }
        }
        inserts.push(images);
        Ok(inserted)
    }

    fn upsert_image_feature_vectors(&self, rows: &[FeatureVectorRow]) -> Result<usize, StoreError> {
        self.inner.upsert_image_feature_vectors(rows)
    }
}
