use std::{pin::pin, sync::Arc};

use futures::{stream, StreamExt};
use shared::domain::{EvidencePurpose, TripId};
use thiserror::Error;
use tracing::{info, warn};

use crate::{ClientError, EvidencePhoto, TripApi};

/// First failed upload of a batch. Photos before it stay attached on the
/// server; `remaining` starts with the failed photo.
#[derive(Debug, Clone, Error)]
#[error("uploading {file_name} ({purpose}) failed after {uploaded} of {total} photo(s): {source}")]
pub struct UploadError {
    pub purpose: EvidencePurpose,
    pub file_name: String,
    pub uploaded: usize,
    pub total: usize,
    #[source]
    pub source: ClientError,
    pub remaining: Vec<EvidencePhoto>,
}

#[derive(Clone)]
pub struct EvidenceUploader {
    api: Arc<dyn TripApi>,
}

impl EvidenceUploader {
    pub fn new(api: Arc<dyn TripApi>) -> Self {
        Self { api }
    }

    /// Uploads `photos` one call at a time, in order. Stops at the first
    /// failure and never retries; returns how many photos were attached.
    pub async fn upload_batch(
        &self,
        trip_id: TripId,
        purpose: EvidencePurpose,
        photos: &[EvidencePhoto],
    ) -> Result<usize, UploadError> {
        let total = photos.len();
        let api = &self.api;
        let mut attempts = pin!(stream::iter(photos.iter().enumerate()).then(
            move |(index, photo)| async move {
                (index, api.upload_evidence(trip_id, purpose, photo).await)
            }
        ));

        let mut uploaded = 0;
        while let Some((index, result)) = attempts.next().await {
            if let Err(source) = result {
                let photo = &photos[index];
                warn!(
                    trip_id = trip_id.0,
                    %purpose,
                    file = %photo.file_name,
                    uploaded,
                    total,
                    "evidence: upload failed, stopping batch"
                );
                return Err(UploadError {
                    purpose,
                    file_name: photo.file_name.clone(),
                    uploaded,
                    total,
                    source,
                    remaining: photos[index..].to_vec(),
                });
            }
            uploaded += 1;
        }

        if total > 0 {
            info!(trip_id = trip_id.0, %purpose, uploaded, "evidence: batch uploaded");
        }
        Ok(uploaded)
    }

    /// Runs several batches back to back in the given order. A failure
    /// ends the whole sequence; later batches are not attempted.
    pub async fn upload_in_order(
        &self,
        trip_id: TripId,
        batches: &[(EvidencePurpose, &[EvidencePhoto])],
    ) -> Result<usize, UploadError> {
        let mut uploaded = 0;
        for (purpose, photos) in batches {
            uploaded += self.upload_batch(trip_id, *purpose, photos).await?;
        }
        Ok(uploaded)
    }
}

#[cfg(test)]
#[path = "tests/evidence_tests.rs"]
mod tests;
