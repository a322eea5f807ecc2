//! Integration test helpers for findings-filter.
//!
//! Provides an in-memory findings service that behaves like the remote one
//! for filters and tags, with hooks to script reads, simulate out-of-band
//! changes and count calls.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use findings_filter::async_trait;
use findings_filter::prelude::*;

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const DETECTOR_ID: &str = "12abc34d567e8fa901bc2d34e56789f0";
pub const FILTER_NAME: &str = "test-filter";

pub const NOT_FOUND_MESSAGE: &str = "The request is rejected since no such resource found.";
pub const NOT_OWNED_MESSAGE: &str =
    "The request is rejected because the input detectorId is not owned by the current account.";

pub fn filter_arn(detector_id: &str, name: &str) -> String {
    format!("arn:aws:guardduty:us-west-2:123456789012:detector/{detector_id}/filter/{name}")
}

pub fn not_found() -> RemoteError {
    RemoteError::service_with_status("BadRequestException", NOT_FOUND_MESSAGE, 400)
}

pub fn not_owned() -> RemoteError {
    RemoteError::service_with_status("BadRequestException", NOT_OWNED_MESSAGE, 400)
}

/// Opaque id of the default test filter.
pub fn filter_id() -> String {
    format!("{DETECTOR_ID}:{FILTER_NAME}")
}

/// Number of calls per client method.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub create: AtomicUsize,
    pub get: AtomicUsize,
    pub update: AtomicUsize,
    pub delete: AtomicUsize,
    pub tag: AtomicUsize,
    pub untag: AtomicUsize,
}

impl CallCounts {
    pub fn create(&self) -> usize {
        self.create.load(Ordering::SeqCst)
    }
    pub fn get(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }
    pub fn update(&self) -> usize {
        self.update.load(Ordering::SeqCst)
    }
    pub fn delete(&self) -> usize {
        self.delete.load(Ordering::SeqCst)
    }
    pub fn tag(&self) -> usize {
        self.tag.load(Ordering::SeqCst)
    }
    pub fn untag(&self) -> usize {
        self.untag.load(Ordering::SeqCst)
    }
}

type Key = (String, String);

/// In-memory findings service.
#[derive(Default)]
pub struct InMemoryFilterClient {
    filters: Mutex<BTreeMap<Key, FilterDescription>>,
    scripted_gets: Mutex<VecDeque<Result<FilterDescription, RemoteError>>>,
    linger_after_delete: Mutex<usize>,
    unowned_detectors: Mutex<BTreeSet<String>>,
    cancel_after_gets: Mutex<Option<(usize, CancellationToken)>>,
    pub calls: CallCounts,
    pub tagged: Mutex<Vec<Tags>>,
    pub untagged: Mutex<Vec<Vec<String>>>,
    pub updates: Mutex<Vec<UpdateFilterRequest>>,
}

impl InMemoryFilterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue read responses served before the stored state.
    pub fn script_gets(&self, responses: Vec<Result<FilterDescription, RemoteError>>) {
        self.scripted_gets.lock().unwrap().extend(responses);
    }

    /// Keep a deleted filter visible for the next `reads` reads.
    pub fn linger_after_delete(&self, reads: usize) {
        *self.linger_after_delete.lock().unwrap() = reads;
    }

    /// Make every call on the detector fail with "not owned".
    pub fn disown_detector(&self, detector_id: &str) {
        self.unowned_detectors
            .lock()
            .unwrap()
            .insert(detector_id.to_string());
    }

    /// Cancel `token` once `gets` reads have been served.
    pub fn cancel_after_gets(&self, gets: usize, token: CancellationToken) {
        *self.cancel_after_gets.lock().unwrap() = Some((gets, token));
    }

    /// Delete a filter behind the reconciler's back.
    pub fn remove_out_of_band(&self, detector_id: &str, name: &str) {
        self.filters
            .lock()
            .unwrap()
            .remove(&(detector_id.to_string(), name.to_string()));
    }

    /// Add a tag directly, the way the platform adds its own tags.
    pub fn inject_tag(&self, detector_id: &str, name: &str, key: &str, value: &str) {
        if let Some(filter) = self
            .filters
            .lock()
            .unwrap()
            .get_mut(&(detector_id.to_string(), name.to_string()))
        {
            filter.tags.insert(key.to_string(), value.to_string());
        }
    }

    /// Current stored state of a filter.
    pub fn stored(&self, detector_id: &str, name: &str) -> Option<FilterDescription> {
        self.filters
            .lock()
            .unwrap()
            .get(&(detector_id.to_string(), name.to_string()))
            .cloned()
    }

    fn check_owned(&self, detector_id: &str) -> Result<(), RemoteError> {
        if self.unowned_detectors.lock().unwrap().contains(detector_id) {
            return Err(not_owned());
        }
        Ok(())
    }

    fn key(detector_id: &str, name: &str) -> Key {
        (detector_id.to_string(), name.to_string())
    }
}

#[async_trait]
impl FilterClient for InMemoryFilterClient {
    async fn create_filter(
        &self,
        request: CreateFilterRequest,
    ) -> Result<FilterDescription, RemoteError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.check_owned(&request.detector_id)?;

        let mut filters = self.filters.lock().unwrap();
        let key = Self::key(&request.detector_id, &request.name);
        if filters.contains_key(&key) {
            return Err(RemoteError::service_with_status(
                "BadRequestException",
                format!(
                    "The request is rejected because a filter with the name {} already exists.",
                    request.name
                ),
                400,
            ));
        }

        let description = FilterDescription {
            arn: filter_arn(&request.detector_id, &request.name),
            name: request.name,
            action: request.action,
            description: request.description,
            rank: request.rank,
            finding_criteria: (!request.finding_criteria.is_empty())
                .then_some(request.finding_criteria),
            tags: request.tags,
        };
        filters.insert(key, description.clone());
        Ok(description)
    }

    async fn get_filter(
        &self,
        detector_id: &str,
        filter_name: &str,
    ) -> Result<FilterDescription, RemoteError> {
        let served = self.calls.get.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = self.cancel_after_gets.lock().unwrap().as_ref() {
            if served >= *after {
                token.cancel();
            }
        }

        if let Some(response) = self.scripted_gets.lock().unwrap().pop_front() {
            return response;
        }
        self.check_owned(detector_id)?;

        self.filters
            .lock()
            .unwrap()
            .get(&Self::key(detector_id, filter_name))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn update_filter(&self, request: UpdateFilterRequest) -> Result<(), RemoteError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.check_owned(&request.detector_id)?;

        let mut filters = self.filters.lock().unwrap();
        let filter = filters
            .get_mut(&Self::key(&request.detector_id, &request.filter_name))
            .ok_or_else(not_found)?;

        if let Some(rank) = request.rank {
            filter.rank = rank;
        }
        if let Some(action) = request.action {
            filter.action = action;
        }
        if let Some(description) = &request.description {
            filter.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(criteria) = &request.finding_criteria {
            filter.finding_criteria = (!criteria.is_empty()).then(|| criteria.clone());
        }
        drop(filters);

        self.updates.lock().unwrap().push(request);
        Ok(())
    }

    async fn delete_filter(&self, detector_id: &str, filter_name: &str) -> Result<(), RemoteError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.check_owned(detector_id)?;

        let removed = self
            .filters
            .lock()
            .unwrap()
            .remove(&Self::key(detector_id, filter_name))
            .ok_or_else(not_found)?;

        let linger = std::mem::take(&mut *self.linger_after_delete.lock().unwrap());
        self.scripted_gets
            .lock()
            .unwrap()
            .extend(std::iter::repeat_with(|| Ok(removed.clone())).take(linger));
        Ok(())
    }

    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<(), RemoteError> {
        self.calls.tag.fetch_add(1, Ordering::SeqCst);
        let mut filters = self.filters.lock().unwrap();
        let filter = filters
            .values_mut()
            .find(|f| f.arn == arn)
            .ok_or_else(not_found)?;
        filter.tags.extend(tags.clone());
        drop(filters);

        self.tagged.lock().unwrap().push(tags);
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), RemoteError> {
        self.calls.untag.fetch_add(1, Ordering::SeqCst);
        let mut filters = self.filters.lock().unwrap();
        let filter = filters
            .values_mut()
            .find(|f| f.arn == arn)
            .ok_or_else(not_found)?;
        for key in &keys {
            filter.tags.remove(key);
        }
        drop(filters);

        self.untagged.lock().unwrap().push(keys);
        Ok(())
    }
}

/// Confirmation settings fast enough for tests.
pub fn fast_config(max_attempts: u32) -> ReconcilerConfig {
    ReconcilerConfig::new().with_confirmation(
        ConfirmationConfig::default()
            .with_max_attempts(max_attempts)
            .with_delays(Duration::from_millis(5), Duration::from_millis(20)),
    )
}

/// The fully populated filter used across the lifecycle tests.
pub fn full_declared() -> DeclaredFilterState {
    DeclaredFilterState::new(1, FilterAction::Archive)
        .with_description("This is a filter")
        .with_rule_group(
            RuleGroup::new()
                .with(Criterion::new("region", Condition::Equals, ["eu-west-1"]))
                .with(Criterion::new(
                    "service.additionalInfo.threatListName",
                    Condition::NotEquals,
                    ["some-threat", "another-threat"],
                ))
                .with(Criterion::new(
                    "updatedAt",
                    Condition::LessThan,
                    ["2019-10-10T21:59:00Z"],
                ))
                .with(Criterion::new(
                    "updatedAt",
                    Condition::GreaterThan,
                    ["2019-10-10T21:50:40Z"],
                )),
        )
        .with_tag("Name", FILTER_NAME)
}

/// Read the default filter, failing the test if it is absent.
pub async fn observe(
    reconciler: &FilterReconciler<InMemoryFilterClient>,
) -> RemoteFilterState {
    match reconciler.read(&filter_id()).await.unwrap() {
        Observation::Present(state) => state,
        Observation::Absent => panic!("filter {} should exist", filter_id()),
    }
}
