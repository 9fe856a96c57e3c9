//! Departmental service requests (porter transport, imaging slots, lab draws...).
//!
//! A request is raised against an active patient and walks forward through
//! `Pending -> InProgress -> Completed`. Completed requests are terminal.

use crate::constants::SERVICE_REQUESTS_KEY;
use crate::repositories::store::{load_collection, save_collection, SnapshotStore};
use crate::{CareError, CareResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use wardflow_types::{Department, NonEmptyText};
use wardflow_uuid::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRequestStatus {
    Pending,
    InProgress,
    Completed,
}

impl ServiceRequestStatus {
    pub fn next(self) -> Option<Self> {
        match self {
            ServiceRequestStatus::Pending => Some(ServiceRequestStatus::InProgress),
            ServiceRequestStatus::InProgress => Some(ServiceRequestStatus::Completed),
            ServiceRequestStatus::Completed => None,
        }
    }
}

impl fmt::Display for ServiceRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceRequestStatus::Pending => "pending",
            ServiceRequestStatus::InProgress => "in_progress",
            ServiceRequestStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RecordId,
    pub patient_id: RecordId,
    /// Patient's department when the request was raised.
    pub department: Department,
    pub description: NonEmptyText,
    pub status: ServiceRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ServiceDesk {
    store: Arc<dyn SnapshotStore>,
    requests: Vec<ServiceRequest>,
}

impl ServiceDesk {
    /// Loads requests from the store; a missing key starts an empty desk.
    pub fn load(store: Arc<dyn SnapshotStore>) -> CareResult<Self> {
        let requests =
            load_collection::<ServiceRequest>(store.as_ref(), SERVICE_REQUESTS_KEY)?
                .unwrap_or_default();
        Ok(Self { store, requests })
    }

    /// Raises a new pending request. The caller is responsible for checking that the patient
    /// is active.
    pub fn create(
        &mut self,
        patient_id: RecordId,
        department: Department,
        description: &str,
        now: DateTime<Utc>,
    ) -> CareResult<ServiceRequest> {
        let request = ServiceRequest {
            id: RecordId::new(),
            patient_id,
            department,
            description: NonEmptyText::new(description)?,
            status: ServiceRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let mut requests = self.requests.clone();
        requests.push(request.clone());
        self.replace(requests)?;

        tracing::info!(
            "service request {} raised for patient {} in {}",
            request.id,
            patient_id,
            department
        );
        Ok(request)
    }

    /// Moves a request one status forward.
    ///
    /// # Errors
    ///
    /// - [`CareError::NotFound`] for an unknown id.
    /// - [`CareError::Validation`] when the request is already completed.
    pub fn advance(
        &mut self,
        request_id: RecordId,
        now: DateTime<Utc>,
    ) -> CareResult<ServiceRequest> {
        let mut requests = self.requests.clone();
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| CareError::not_found("service request", request_id))?;

        let next = request.status.next().ok_or_else(|| {
            CareError::Validation(format!("service request {request_id} is already completed"))
        })?;
        request.status = next;
        request.updated_at = now;
        let advanced = request.clone();

        self.replace(requests)?;
        Ok(advanced)
    }

    pub fn get(&self, request_id: RecordId) -> Option<&ServiceRequest> {
        self.requests.iter().find(|r| r.id == request_id)
    }

    pub fn list(&self) -> &[ServiceRequest] {
        &self.requests
    }

    /// Every request not yet completed.
    pub fn pending(&self) -> Vec<ServiceRequest> {
        self.requests
            .iter()
            .filter(|r| r.status != ServiceRequestStatus::Completed)
            .cloned()
            .collect()
    }

    /// Writes `requests` and only then makes them the live collection.
    fn replace(&mut self, requests: Vec<ServiceRequest>) -> CareResult<()> {
        save_collection(self.store.as_ref(), SERVICE_REQUESTS_KEY, &requests)?;
        self.requests = requests;
        Ok(())
    }
}
