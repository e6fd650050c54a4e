//! Avatar URL resolution.
//!
//! Avatars are requested as `(uuid, size)` pairs. The remote side may answer
//! with a different size than requested; such a response is accepted and
//! reported as a diagnostic rather than failed.

use std::sync::Arc;

use async_trait::async_trait;
use coalesce_domain::{
    BulkSource, ConfigError, Diagnostic, DiagnosticSink, Fingerprint, Fingerprinted, Loader,
    LoaderConfig, LookupOptions, LookupResult, TransportError, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Largest avatar edge, in pixels, that may be requested.
pub const MAX_AVATAR_SIZE: u32 = 2048;

/// A request for the avatar of `uuid` rendered at `size` pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvatarRequest {
    pub uuid: String,
    pub size: u32,
}

impl AvatarRequest {
    pub fn new(uuid: impl Into<String>, size: u32) -> Self {
        Self {
            uuid: uuid.into(),
            size,
        }
    }
}

impl Fingerprinted for AvatarRequest {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_parts([self.uuid.clone(), self.size.to_string()])
    }
}

/// One element of an avatar bulk response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub uuid: String,
    /// Size that was asked for. Used to pair the response with its request.
    pub requested_size: u32,
    /// Size actually served.
    pub size: u32,
    /// `None` when the account has no avatar.
    pub url: Option<String>,
}

impl AvatarResponse {
    /// A response serving exactly the requested size.
    pub fn exact(request: &AvatarRequest, url: impl Into<String>) -> Self {
        Self {
            uuid: request.uuid.clone(),
            requested_size: request.size,
            size: request.size,
            url: Some(url.into()),
        }
    }
}

impl Fingerprinted for AvatarResponse {
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_parts([self.uuid.clone(), self.requested_size.to_string()])
    }
}

/// The remote avatar service.
#[async_trait]
pub trait AvatarApi: Send + Sync + 'static {
    /// Resolves several avatars with one call.
    async fn fetch_avatar_urls(
        &self,
        requests: &[AvatarRequest],
    ) -> Result<Vec<AvatarResponse>, TransportError>;

    /// Resolves a single avatar.
    async fn fetch_avatar_url(
        &self,
        _request: &AvatarRequest,
    ) -> Result<Option<AvatarResponse>, TransportError> {
        Err(TransportError::Unsupported {
            operation: "fetch_avatar_url",
        })
    }
}

#[async_trait]
impl<A: AvatarApi + ?Sized> AvatarApi for Arc<A> {
    async fn fetch_avatar_urls(
        &self,
        requests: &[AvatarRequest],
    ) -> Result<Vec<AvatarResponse>, TransportError> {
        (**self).fetch_avatar_urls(requests).await
    }

    async fn fetch_avatar_url(
        &self,
        request: &AvatarRequest,
    ) -> Result<Option<AvatarResponse>, TransportError> {
        (**self).fetch_avatar_url(request).await
    }
}

/// Decides whether an avatar lookup failed.
///
/// Fails only when no response was matched. A response served at a
/// different size is accepted and reported to `diagnostics`.
pub fn did_avatar_fail(
    request: &AvatarRequest,
    response: Option<&AvatarResponse>,
    diagnostics: &dyn DiagnosticSink,
) -> bool {
    let Some(response) = response else {
        return true;
    };

    if response.size != request.size {
        diagnostics.emit(Diagnostic::new(
            request.fingerprint(),
            format!(
                "requested avatar size {} for {}, got {}",
                request.size, request.uuid, response.size
            ),
        ));
    }

    false
}

/// [`BulkSource`] adapter over an [`AvatarApi`].
#[derive(Debug, Clone)]
pub struct AvatarSource<A> {
    api: A,
}

impl<A: AvatarApi> AvatarSource<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: AvatarApi> BulkSource for AvatarSource<A> {
    type Key = AvatarRequest;
    type Response = AvatarResponse;

    fn validate(&self, key: &AvatarRequest) -> Result<(), ValidationError> {
        if key.uuid.is_empty() {
            return Err(ValidationError::Empty { field: "uuid" });
        }
        if key.uuid.chars().any(char::is_whitespace) {
            return Err(ValidationError::Malformed {
                field: "uuid",
                message: "must not contain whitespace".to_string(),
            });
        }
        if key.size == 0 || key.size > MAX_AVATAR_SIZE {
            return Err(ValidationError::Malformed {
                field: "size",
                message: format!("must be between 1 and {MAX_AVATAR_SIZE}, got {}", key.size),
            });
        }
        Ok(())
    }

    async fn bulk_submit(
        &self,
        keys: &[AvatarRequest],
    ) -> Result<Vec<AvatarResponse>, TransportError> {
        self.api.fetch_avatar_urls(keys).await
    }

    async fn fetch_single(
        &self,
        key: &AvatarRequest,
    ) -> Result<Option<AvatarResponse>, TransportError> {
        self.api.fetch_avatar_url(key).await
    }

    fn did_item_fail(
        &self,
        key: &AvatarRequest,
        response: Option<&AvatarResponse>,
        diagnostics: &dyn DiagnosticSink,
    ) -> bool {
        did_avatar_fail(key, response, diagnostics)
    }

    fn exists(&self, response: &AvatarResponse) -> bool {
        response.url.is_some()
    }
}

/// Resolves avatar URLs, batching concurrent requests.
pub struct AvatarResolver<A: AvatarApi> {
    loader: Loader<AvatarSource<A>>,
}

impl<A: AvatarApi> AvatarResolver<A> {
    pub fn new(api: A, config: LoaderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            loader: Loader::new(AvatarSource::new(api), config)?,
        })
    }

    /// Creates a resolver reporting size substitutions to `diagnostics`.
    pub fn with_diagnostics(
        api: A,
        config: LoaderConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        let loader = Loader::builder(AvatarSource::new(api), config)
            .with_diagnostics(diagnostics)
            .build()?;
        Ok(Self { loader })
    }

    /// Returns the URL of the avatar, or `None` when the account has none.
    pub async fn avatar_url(&self, uuid: &str, size: u32) -> LookupResult<Option<String>> {
        let resolved = self.loader.lookup(AvatarRequest::new(uuid, size)).await?;
        Ok(resolved.value.url)
    }

    /// Like [`avatar_url`](Self::avatar_url) but ignores cached entries.
    pub async fn refresh_avatar_url(&self, uuid: &str, size: u32) -> LookupResult<Option<String>> {
        let resolved = self
            .loader
            .lookup_with(AvatarRequest::new(uuid, size), LookupOptions::bypass_cache())
            .await?;
        Ok(resolved.value.url)
    }

    /// Resolves several avatars. Results are in input order.
    pub async fn avatar_urls(
        &self,
        requests: Vec<AvatarRequest>,
    ) -> Vec<LookupResult<Option<String>>> {
        self.loader
            .lookup_many(requests)
            .await
            .into_iter()
            .map(|result| result.map(|resolved| resolved.value.url))
            .collect()
    }

    /// Drops the cached URL for one avatar, e.g. after the user changed it.
    pub async fn forget(&self, uuid: &str, size: u32) {
        self.loader.invalidate(AvatarRequest::new(uuid, size)).await;
    }

    pub fn loader(&self) -> &Loader<AvatarSource<A>> {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_domain::RecordingDiagnosticSink;

    struct NoopApi;

    #[async_trait]
    impl AvatarApi for NoopApi {
        async fn fetch_avatar_urls(
            &self,
            _requests: &[AvatarRequest],
        ) -> Result<Vec<AvatarResponse>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn response(uuid: &str, requested_size: u32, size: u32) -> AvatarResponse {
        AvatarResponse {
            uuid: uuid.to_string(),
            requested_size,
            size,
            url: Some(format!("https://cdn.test/{uuid}/{size}.png")),
        }
    }

    // =========================================================================
    // Fingerprints
    // =========================================================================

    #[test]
    fn test_request_fingerprint_joins_uuid_and_size() {
        let request = AvatarRequest::new("uuid1", 80);

        assert_eq!(request.fingerprint().as_str(), "uuid1-80");
    }

    #[test]
    fn test_response_fingerprint_uses_requested_size() {
        let request = AvatarRequest::new("uuid1", 80);
        let response = response("uuid1", 80, 256);

        assert_eq!(response.fingerprint(), request.fingerprint());
    }

    // =========================================================================
    // Item policy
    // =========================================================================

    #[test]
    fn test_size_substitution_is_accepted_with_diagnostic() {
        let sink = RecordingDiagnosticSink::new();
        let request = AvatarRequest::new("uuid1", 80);

        let failed = did_avatar_fail(&request, Some(&response("uuid1", 80, 256)), &sink);

        assert!(!failed);
        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "requested avatar size 80 for uuid1, got 256"
        );
        assert_eq!(diagnostics[0].fingerprint.as_str(), "uuid1-80");
    }

    #[test]
    fn test_exact_size_emits_no_diagnostic() {
        let sink = RecordingDiagnosticSink::new();
        let request = AvatarRequest::new("uuid1", 80);

        let failed = did_avatar_fail(&request, Some(&response("uuid1", 80, 80)), &sink);

        assert!(!failed);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_absent_response_reports_failure() {
        let sink = RecordingDiagnosticSink::new();
        let request = AvatarRequest::new("uuid1", 80);

        assert!(did_avatar_fail(&request, None, &sink));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_missing_url_is_a_confirmed_negative() {
        let source = AvatarSource::new(NoopApi);
        let mut blank = response("uuid1", 80, 80);
        blank.url = None;

        assert!(!source.exists(&blank));
        assert!(source.exists(&response("uuid1", 80, 80)));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_validation_rejects_bad_requests() {
        let source = AvatarSource::new(NoopApi);

        assert_eq!(
            source.validate(&AvatarRequest::new("", 80)),
            Err(ValidationError::Empty { field: "uuid" })
        );
        assert!(matches!(
            source.validate(&AvatarRequest::new("uu id", 80)),
            Err(ValidationError::Malformed { field: "uuid", .. })
        ));
        assert!(matches!(
            source.validate(&AvatarRequest::new("uuid1", 0)),
            Err(ValidationError::Malformed { field: "size", .. })
        ));
        assert!(matches!(
            source.validate(&AvatarRequest::new("uuid1", MAX_AVATAR_SIZE + 1)),
            Err(ValidationError::Malformed { field: "size", .. })
        ));
        assert!(source.validate(&AvatarRequest::new("uuid1", MAX_AVATAR_SIZE)).is_ok());
    }

    #[tokio::test]
    async fn test_single_fetch_defaults_to_unsupported() {
        let source = AvatarSource::new(NoopApi);

        let result = source.fetch_single(&AvatarRequest::new("uuid1", 80)).await;

        assert!(matches!(result, Err(TransportError::Unsupported { .. })));
    }
}
