//! The job model pulled from the queue server.
//!
//! A job arrives as raw image bytes plus a handful of plain-string
//! headers. [`JobRequest::validate`] enforces the minimum a job needs
//! before it is worth dispatching; anything less is skipped without a
//! result ever being posted back.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The `animal_type` value the queue sends when the station operator
/// picked "other" from the species list.
const ANIMAL_TYPE_OTHER: &str = "other";

/// Generic species label substituted for [`ANIMAL_TYPE_OTHER`], so the
/// prompt text stays meaningful.
const ANIMAL_TYPE_FALLBACK: &str = "stuffed animal";

/// Patient metadata attached to a job as plain-string headers.
///
/// Any header the queue omits arrives as an empty string; only the
/// job-level fields checked by [`JobRequest::validate`] are mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub first_name: String,
    pub last_name: String,
    /// The name the child gave their plush animal.
    pub animal_name: String,
    /// Species category used to select prompt text (e.g. `"dog"`).
    pub animal_type: String,
}

impl Patient {
    /// Species label suitable for prompt text.
    ///
    /// Maps the queue's `"other"` category to a generic label; every
    /// other value passes through unchanged.
    pub fn species(&self) -> &str {
        if self.animal_type == ANIMAL_TYPE_OTHER {
            ANIMAL_TYPE_FALLBACK
        } else {
            &self.animal_type
        }
    }

    /// The caption rendered onto the result image.
    pub fn caption(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.last_name, self.animal_name
        )
    }
}

/// One unit of work pulled from the queue.
///
/// Consumed exactly once; nothing is persisted locally. The result is
/// posted back under [`JobRequest::id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Queue-assigned identifier (`img_id` header).
    pub id: String,
    /// Raw input image bytes (response body).
    pub image: Vec<u8>,
    /// Registry key of the requested workflow.
    pub workflow: String,
    pub patient: Patient,
}

impl JobRequest {
    /// Check the fields a job must carry before it can be dispatched.
    ///
    /// A job is valid only with a non-empty id, non-empty image bytes,
    /// and a workflow name. Invalid jobs are dropped by the caller
    /// without reporting back to the queue.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::Validation("job is missing an id".into()));
        }
        if self.image.is_empty() {
            return Err(CoreError::Validation(format!(
                "job {} carries no image bytes",
                self.id
            )));
        }
        if self.workflow.is_empty() {
            return Err(CoreError::Validation(format!(
                "job {} carries no workflow name",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_job() -> JobRequest {
        JobRequest {
            id: "job_0001".to_string(),
            image: vec![0x89, 0x50, 0x4e, 0x47],
            workflow: "FLUX_Kontext".to_string(),
            patient: Patient {
                first_name: "Max".to_string(),
                last_name: "M".to_string(),
                animal_name: "Teddy".to_string(),
                animal_type: "bear".to_string(),
            },
        }
    }

    #[test]
    fn valid_job_passes() {
        assert!(valid_job().validate().is_ok());
    }

    #[test]
    fn missing_id_rejected() {
        let mut job = valid_job();
        job.id.clear();
        assert!(job.validate().is_err());
    }

    #[test]
    fn empty_image_rejected() {
        let mut job = valid_job();
        job.image.clear();
        assert!(job.validate().is_err());
    }

    #[test]
    fn missing_workflow_rejected() {
        let mut job = valid_job();
        job.workflow.clear();
        assert!(job.validate().is_err());
    }

    #[test]
    fn other_species_maps_to_generic_label() {
        let patient = Patient {
            animal_type: "other".to_string(),
            ..Default::default()
        };
        assert_eq!(patient.species(), "stuffed animal");
    }

    #[test]
    fn known_species_passes_through() {
        let patient = Patient {
            animal_type: "rabbit".to_string(),
            ..Default::default()
        };
        assert_eq!(patient.species(), "rabbit");
    }

    #[test]
    fn caption_joins_names() {
        assert_eq!(valid_job().patient.caption(), "Max M Teddy");
    }
}
