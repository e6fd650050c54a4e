//! Username to user id resolution.
//!
//! Usernames are case-insensitive: keys are trimmed and lowercased before
//! they are fingerprinted, so `" Alice"` and `"alice"` share one lookup.
//! Unknown usernames come back with no id and are cached as confirmed
//! negatives.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use coalesce_domain::{
    BulkSource, ConfigError, DiagnosticSink, Fingerprint, Fingerprinted, Loader, LoaderConfig,
    LookupOptions, LookupResult, TransportError, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 64;

/// A username as typed by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trimmed, lowercased form used for fingerprinting.
    pub fn normalized(&self) -> Self {
        Self(self.0.trim().to_lowercase())
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Fingerprinted for Username {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from(self.0.as_str())
    }
}

/// One element of a user bulk response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// `None` when no account has this username.
    pub user_id: Option<String>,
}

impl UserRecord {
    pub fn found(username: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: Some(user_id.into()),
        }
    }

    pub fn unknown(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: None,
        }
    }
}

impl Fingerprinted for UserRecord {
    // Remote side may echo the canonical casing.
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from(self.username.to_lowercase())
    }
}

/// The remote user directory.
#[async_trait]
pub trait UserApi: Send + Sync + 'static {
    /// Resolves several usernames with one call. Usernames are already
    /// normalized.
    async fn lookup_usernames(
        &self,
        usernames: &[Username],
    ) -> Result<Vec<UserRecord>, TransportError>;

    /// Resolves a single username.
    async fn lookup_username(
        &self,
        _username: &Username,
    ) -> Result<Option<UserRecord>, TransportError> {
        Err(TransportError::Unsupported {
            operation: "lookup_username",
        })
    }
}

#[async_trait]
impl<A: UserApi + ?Sized> UserApi for Arc<A> {
    async fn lookup_usernames(
        &self,
        usernames: &[Username],
    ) -> Result<Vec<UserRecord>, TransportError> {
        (**self).lookup_usernames(usernames).await
    }

    async fn lookup_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, TransportError> {
        (**self).lookup_username(username).await
    }
}

/// [`BulkSource`] adapter over a [`UserApi`].
#[derive(Debug, Clone)]
pub struct UserSource<A> {
    api: A,
}

impl<A: UserApi> UserSource<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

#[async_trait]
impl<A: UserApi> BulkSource for UserSource<A> {
    type Key = Username;
    type Response = UserRecord;

    fn normalize(&self, key: Username) -> Username {
        key.normalized()
    }

    fn validate(&self, key: &Username) -> Result<(), ValidationError> {
        let name = key.as_str();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }
        if name.chars().count() > MAX_USERNAME_LEN {
            return Err(ValidationError::Malformed {
                field: "username",
                message: format!("must be at most {MAX_USERNAME_LEN} characters"),
            });
        }
        if let Some(bad) = name.chars().find(|c| !is_username_char(*c)) {
            return Err(ValidationError::Malformed {
                field: "username",
                message: format!("unexpected character {bad:?}"),
            });
        }
        Ok(())
    }

    async fn bulk_submit(&self, keys: &[Username]) -> Result<Vec<UserRecord>, TransportError> {
        self.api.lookup_usernames(keys).await
    }

    async fn fetch_single(&self, key: &Username) -> Result<Option<UserRecord>, TransportError> {
        self.api.lookup_username(key).await
    }

    fn exists(&self, response: &UserRecord) -> bool {
        response.user_id.is_some()
    }
}

/// Resolves usernames to user ids, batching concurrent lookups.
pub struct UserResolver<A: UserApi> {
    loader: Loader<UserSource<A>>,
}

impl<A: UserApi> UserResolver<A> {
    pub fn new(api: A, config: LoaderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            loader: Loader::new(UserSource::new(api), config)?,
        })
    }

    pub fn with_diagnostics(
        api: A,
        config: LoaderConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        let loader = Loader::builder(UserSource::new(api), config)
            .with_diagnostics(diagnostics)
            .build()?;
        Ok(Self { loader })
    }

    /// Returns the user id for `username`, or `None` if no such user exists.
    ///
    /// A cached negative answers without a network call.
    pub async fn user_id(&self, username: &str) -> LookupResult<Option<String>> {
        let resolved = self.loader.lookup(Username::from(username)).await?;
        Ok(resolved.value.user_id)
    }

    /// Resolves several usernames. Results are in input order.
    pub async fn user_ids<'a, I>(&self, usernames: I) -> Vec<LookupResult<Option<String>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.loader
            .lookup_many(usernames.into_iter().map(Username::from))
            .await
            .into_iter()
            .map(|result| result.map(|resolved| resolved.value.user_id))
            .collect()
    }

    /// Checks with the remote side that `username` exists, ignoring any
    /// cached answer. The fresh answer replaces the cached one.
    pub async fn confirm_exists(&self, username: &str) -> LookupResult<bool> {
        let resolved = self
            .loader
            .lookup_with(Username::from(username), LookupOptions::bypass_cache())
            .await?;
        Ok(resolved.exists)
    }

    /// Resolves one username through the single-item endpoint.
    pub async fn user_id_now(&self, username: &str) -> LookupResult<Option<String>> {
        let resolved = self.loader.resolve_now(Username::from(username)).await?;
        Ok(resolved.value.user_id)
    }

    /// Drops the cached answer for `username`.
    pub async fn forget(&self, username: &str) {
        self.loader.invalidate(Username::from(username)).await;
    }

    pub fn loader(&self) -> &Loader<UserSource<A>> {
        &self.loader
    }
}
