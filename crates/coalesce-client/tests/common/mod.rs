//! Shared fakes for the resolver integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use coalesce_client::{AvatarApi, AvatarRequest, AvatarResponse, UserApi, UserRecord, Username};
use coalesce_domain::{LoaderConfig, TransportError};

/// Round trip latency simulated by the fakes.
pub const REMOTE_LATENCY: Duration = Duration::from_millis(20);

/// Loader settings used by most tests.
pub fn test_config() -> LoaderConfig {
    LoaderConfig::default()
        .with_max_batch_size(3)
        .with_batch_window(Duration::from_millis(10))
}

pub fn avatar_url(uuid: &str, size: u32) -> String {
    format!("https://avatars.test/{uuid}/{size}.png")
}

// =============================================================================
// Avatar API
// =============================================================================

/// In-memory avatar service.
///
/// Answers in reverse order so tests exercise fingerprint matching.
#[derive(Default)]
pub struct FakeAvatarApi {
    batches: Mutex<Vec<Vec<AvatarRequest>>>,
    /// uuid -> size actually served
    substitutions: Mutex<HashMap<String, u32>>,
    /// uuids left out of responses entirely
    missing: Mutex<HashSet<String>>,
    /// uuids whose account has no avatar
    blank: Mutex<HashSet<String>>,
    fail_next: AtomicBool,
}

impl FakeAvatarApi {
    pub fn serve_size(&self, uuid: &str, size: u32) {
        self.substitutions
            .lock()
            .insert(uuid.to_string(), size);
    }

    pub fn omit(&self, uuid: &str) {
        self.missing.lock().insert(uuid.to_string());
    }

    pub fn without_avatar(&self, uuid: &str) {
        self.blank.lock().insert(uuid.to_string());
    }

    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<AvatarRequest>> {
        self.batches.lock().clone()
    }

    pub fn bulk_calls(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl AvatarApi for FakeAvatarApi {
    async fn fetch_avatar_urls(
        &self,
        requests: &[AvatarRequest],
    ) -> Result<Vec<AvatarResponse>, TransportError> {
        self.batches.lock().push(requests.to_vec());
        tokio::time::sleep(REMOTE_LATENCY).await;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Timeout {
                duration_ms: REMOTE_LATENCY.as_millis() as u64,
            });
        }

        let substitutions = self.substitutions.lock().clone();
        let missing = self.missing.lock().clone();
        let blank = self.blank.lock().clone();

        Ok(requests
            .iter()
            .rev()
            .filter(|request| !missing.contains(&request.uuid))
            .map(|request| {
                let size = substitutions
                    .get(&request.uuid)
                    .copied()
                    .unwrap_or(request.size);
                AvatarResponse {
                    uuid: request.uuid.clone(),
                    requested_size: request.size,
                    size,
                    url: (!blank.contains(&request.uuid)).then(|| avatar_url(&request.uuid, size)),
                }
            })
            .collect())
    }
}

// =============================================================================
// User API
// =============================================================================

/// In-memory user directory keyed by lowercase username.
#[derive(Default)]
pub struct FakeUserApi {
    directory: Mutex<HashMap<String, String>>,
    batches: Mutex<Vec<Vec<String>>>,
    single_calls: AtomicUsize,
    supports_single: bool,
}

impl FakeUserApi {
    pub fn with_users(users: &[(&str, &str)]) -> Self {
        let api = Self::default();
        for (name, id) in users {
            api.add_user(name, id);
        }
        api
    }

    pub fn with_single_lookup(mut self) -> Self {
        self.supports_single = true;
        self
    }

    pub fn add_user(&self, name: &str, id: &str) {
        self.directory
            .lock()
            .insert(name.to_string(), id.to_string());
    }

    pub fn remove_user(&self, name: &str) {
        self.directory.lock().remove(name);
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    pub fn bulk_calls(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn record_for(&self, username: &Username) -> UserRecord {
        match self.directory.lock().get(username.as_str()) {
            Some(id) => UserRecord::found(username.as_str(), id.as_str()),
            None => UserRecord::unknown(username.as_str()),
        }
    }
}

#[async_trait]
impl UserApi for FakeUserApi {
    async fn lookup_usernames(
        &self,
        usernames: &[Username],
    ) -> Result<Vec<UserRecord>, TransportError> {
        self.batches
            .lock()
            .push(usernames.iter().map(|u| u.as_str().to_string()).collect());
        tokio::time::sleep(REMOTE_LATENCY).await;

        Ok(usernames.iter().map(|u| self.record_for(u)).collect())
    }

    async fn lookup_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, TransportError> {
        if !self.supports_single {
            return Err(TransportError::Unsupported {
                operation: "lookup_username",
            });
        }
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(REMOTE_LATENCY).await;

        Ok(Some(self.record_for(username)))
    }
}
