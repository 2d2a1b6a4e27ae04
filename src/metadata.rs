//! Assembles label classes, images and annotations for a model call.

use std::collections::HashMap;

use thiserror::Error;

use crate::records::{Annotation, ImageId, ImageRecord, LabelClass};
use crate::store::{ProjectRepository, StoreError};

/// Errors returned while assembling project metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The project store could not serve the request.
    #[error("Project metadata unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Everything a model needs to know about the images it is called on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectData {
    /// Label classes ordered by output index.
    pub label_classes: Vec<LabelClass>,
    /// Images in request order; unknown ids are absent.
    pub images: Vec<ImageRecord>,
}

impl ProjectData {
    pub fn image(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.images.iter().find(|image| &image.id == id)
    }

    /// Number of annotations across all loaded images.
    pub fn annotation_count(&self) -> usize {
        self.images
            .iter()
            .filter_map(|image| image.annotations.as_ref())
            .map(Vec::len)
            .sum()
    }
}

/// Loads [`ProjectData`] through a project repository.
pub struct MetadataLoader<'r, R: ProjectRepository + ?Sized> {
    repo: &'r R,
}

impl<'r, R: ProjectRepository + ?Sized> MetadataLoader<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    /// Load metadata for `ids`. An empty id set yields no images, never an error.
    pub fn load(&self, ids: &[ImageId], with_annotations: bool) -> Result<ProjectData, MetadataError> {
        let label_classes = self.repo.select_label_classes()?;
        if ids.is_empty() {
            return Ok(ProjectData {
                label_classes,
                images: Vec::new(),
            });
        }
        let images = self.repo.select_images(ids)?;
        self.finish(label_classes, images, with_annotations)
    }

    /// Load metadata for every image of the project.
    pub fn load_all(&self, with_annotations: bool) -> Result<ProjectData, MetadataError> {
        let label_classes = self.repo.select_label_classes()?;
        let images = self.repo.select_all_images()?;
        self.finish(label_classes, images, with_annotations)
    }

    fn finish(
        &self,
        label_classes: Vec<LabelClass>,
        mut images: Vec<ImageRecord>,
        with_annotations: bool,
    ) -> Result<ProjectData, MetadataError> {
        if with_annotations && !images.is_empty() {
            let annotation_type = self.repo.select_project_settings()?.annotation_type;
            let ids: Vec<ImageId> = images.iter().map(|image| image.id.clone()).collect();
            let mut by_image: HashMap<ImageId, Vec<Annotation>> = HashMap::new();
            for annotation in self.repo.select_annotations(&ids, annotation_type)? {
                by_image
                    .entry(annotation.image.clone())
                    .or_default()
                    .push(annotation);
            }
            for image in &mut images {
                image.annotations = Some(by_image.remove(&image.id).unwrap_or_default());
            }
        }
        Ok(ProjectData {
            label_classes,
            images,
        })
    }
}
