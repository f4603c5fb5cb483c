//! Push delivery to mobile devices.
//!
//! iOS devices are reached through APNs, one request per device. Android
//! devices are reached through FCM, batched into a single multicast request.
//! Delivery is best effort: provider errors are logged, never returned to the
//! code that triggered the notification.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pollen_common::{
    AppError, AppResult,
    config::{ApnsConfig, FcmConfig, PushConfig},
};
use pollen_db::{
    entities::{
        device_token::Platform,
        notification::{SubjectType, Verb},
    },
    repositories::DeviceTokenRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Provider tokens are valid for an hour; refresh well before that.
const APNS_TOKEN_TTL_SECS: i64 = 50 * 60;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A notification as shown on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub verb: Verb,
    pub object_type: SubjectType,
    pub object_id: String,
}

/// A push backend for one device platform.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Deliver `message` to every token in `tokens`.
    async fn send(&self, tokens: &[String], message: &PushMessage) -> AppResult<()>;
}

/// Routes messages to a user's devices.
#[derive(Clone)]
pub struct PushService {
    device_repo: DeviceTokenRepository,
    apns: Option<Arc<dyn PushProvider>>,
    fcm: Option<Arc<dyn PushProvider>>,
}

impl PushService {
    /// Create a push service with explicit providers.
    #[must_use]
    pub fn new(
        device_repo: DeviceTokenRepository,
        apns: Option<Arc<dyn PushProvider>>,
        fcm: Option<Arc<dyn PushProvider>>,
    ) -> Self {
        Self {
            device_repo,
            apns,
            fcm,
        }
    }

    /// Create a push service from configuration. Missing sections disable
    /// the corresponding platform.
    pub fn from_config(device_repo: DeviceTokenRepository, config: &PushConfig) -> AppResult<Self> {
        let apns = match &config.apns {
            Some(c) => Some(Arc::new(ApnsProvider::new(c)?) as Arc<dyn PushProvider>),
            None => None,
        };
        let fcm = match &config.fcm {
            Some(c) => Some(Arc::new(FcmProvider::new(c)?) as Arc<dyn PushProvider>),
            None => None,
        };

        Ok(Self::new(device_repo, apns, fcm))
    }

    /// Send a message to every registered device of a user.
    ///
    /// Returns the number of platform requests that succeeded. Only the
    /// token lookup can fail; delivery errors are logged per device (iOS) or
    /// per batch (Android).
    pub async fn send_to_user(&self, user_id: &str, message: &PushMessage) -> AppResult<usize> {
        let devices = self.device_repo.find_by_user(user_id).await?;
        if devices.is_empty() {
            debug!(user_id = %user_id, "No registered devices");
            return Ok(0);
        }

        let (ios, android): (Vec<_>, Vec<_>) = devices
            .into_iter()
            .partition(|d| d.platform == Platform::Ios);

        let mut delivered = 0;

        if !ios.is_empty() {
            if let Some(apns) = &self.apns {
                let results = join_all(ios.iter().map(|device| async move {
                    let result = apns.send(std::slice::from_ref(&device.token), message).await;
                    if let Err(e) = &result {
                        warn!(user_id = %user_id, device_id = %device.id, error = %e, "APNs delivery failed");
                    }
                    result
                }))
                .await;
                delivered += results.iter().filter(|r| r.is_ok()).count();
            } else {
                debug!(user_id = %user_id, "APNs not configured, skipping iOS devices");
            }
        }

        if !android.is_empty() {
            if let Some(fcm) = &self.fcm {
                let tokens: Vec<String> = android.into_iter().map(|d| d.token).collect();
                match fcm.send(&tokens, message).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(user_id = %user_id, devices = tokens.len(), error = %e, "FCM delivery failed");
                    }
                }
            } else {
                debug!(user_id = %user_id, "FCM not configured, skipping Android devices");
            }
        }

        Ok(delivered)
    }
}

// ==================== APNs ====================

#[derive(Debug, Serialize, Deserialize)]
struct ApnsClaims {
    iss: String,
    iat: i64,
}

/// APNs over HTTP/2 with token-based authentication.
pub struct ApnsProvider {
    http_client: reqwest::Client,
    encoding_key: EncodingKey,
    key_id: String,
    team_id: String,
    topic: String,
    base_url: &'static str,
    cached_token: Mutex<Option<(String, i64)>>,
}

impl ApnsProvider {
    /// Create a provider from configuration.
    pub fn new(config: &ApnsConfig) -> AppResult<Self> {
        let encoding_key = EncodingKey::from_ec_pem(config.private_key_pem.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid APNs signing key: {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            encoding_key,
            key_id: config.key_id.clone(),
            team_id: config.team_id.clone(),
            topic: config.topic.clone(),
            base_url: if config.sandbox {
                "https://api.sandbox.push.apple.com"
            } else {
                "https://api.push.apple.com"
            },
            cached_token: Mutex::new(None),
        })
    }

    /// Signed provider token, reused until it nears expiry.
    fn provider_token(&self) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let mut cached = self
            .cached_token
            .lock()
            .map_err(|_| AppError::Internal("APNs token cache poisoned".to_string()))?;

        if let Some((token, issued_at)) = cached.as_ref() {
            if now - issued_at < APNS_TOKEN_TTL_SECS {
                return Ok(token.clone());
            }
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ApnsClaims {
            iss: self.team_id.clone(),
            iat: now,
        };
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::Push(format!("Failed to sign APNs token: {e}")))?;

        *cached = Some((token.clone(), now));
        Ok(token)
    }
}

/// APNs request body.
#[must_use]
pub fn apns_payload(message: &PushMessage) -> serde_json::Value {
    json!({
        "aps": {
            "alert": {
                "title": message.title,
                "body": message.body,
            },
            "sound": "default",
        },
        "verb": message.verb.as_str(),
        "object_type": message.object_type.as_str(),
        "object_id": message.object_id,
    })
}

#[async_trait]
impl PushProvider for ApnsProvider {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> AppResult<()> {
        let bearer = self.provider_token()?;
        let payload = apns_payload(message);
        let mut last_error = None;

        for token in tokens {
            let response = self
                .http_client
                .post(format!("{}/3/device/{token}", self.base_url))
                .bearer_auth(&bearer)
                .header("apns-topic", &self.topic)
                .header("apns-push-type", "alert")
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(r) if r.status().is_success() => {}
                Ok(r) => {
                    last_error = Some(AppError::Push(format!("APNs returned {}", r.status())));
                }
                Err(e) => last_error = Some(AppError::Push(format!("APNs request failed: {e}"))),
            }
        }

        last_error.map_or(Ok(()), Err)
    }
}

// ==================== FCM ====================

/// FCM legacy HTTP multicast.
///
/// Speaks the legacy `fcm/send` protocol: `Authorization: key=<server key>`
/// and one `registration_ids` list per request. Google has retired this
/// protocol for new projects, so the endpoint comes from `push.fcm.endpoint`
/// and can point at a compatible relay. HTTP v1 needs OAuth2 service-account
/// tokens and one request per device.
pub struct FcmProvider {
    http_client: reqwest::Client,
    server_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: u32,
    #[serde(default)]
    failure: u32,
}

impl FcmProvider {
    /// Create a provider from configuration.
    pub fn new(config: &FcmConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            server_key: config.server_key.clone(),
            endpoint: config.endpoint.clone(),
        })
    }
}

/// FCM multicast request body.
#[must_use]
pub fn fcm_payload(tokens: &[String], message: &PushMessage) -> serde_json::Value {
    json!({
        "registration_ids": tokens,
        "notification": {
            "title": message.title,
            "body": message.body,
        },
        "data": {
            "verb": message.verb.as_str(),
            "object_type": message.object_type.as_str(),
            "object_id": message.object_id,
        },
    })
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(&self, tokens: &[String], message: &PushMessage) -> AppResult<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&fcm_payload(tokens, message))
            .send()
            .await
            .map_err(|e| AppError::Push(format!("FCM request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Push(format!("FCM returned {}", response.status())));
        }

        let result: FcmResponse = response
            .json()
            .await
            .map_err(|e| AppError::Push(format!("Invalid FCM response: {e}")))?;
        if result.failure > 0 {
            warn!(
                success = result.success,
                failure = result.failure,
                "FCM rejected some devices"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every send instead of talking to a provider.
    #[derive(Default)]
    pub struct RecordingProvider {
        pub sent: Mutex<Vec<(Vec<String>, PushMessage)>>,
        pub fail: bool,
    }

    impl RecordingProvider {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        #[allow(clippy::unwrap_used)]
        pub fn calls(&self) -> Vec<(Vec<String>, PushMessage)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushProvider for RecordingProvider {
        #[allow(clippy::unwrap_used)]
        async fn send(&self, tokens: &[String], message: &PushMessage) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((tokens.to_vec(), message.clone()));
            if self.fail {
                Err(AppError::Push("provider unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }
}
