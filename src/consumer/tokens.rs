//! API token settings.

use std::fmt;

use super::{optional, required, FromCredentials};
use crate::error::HandlerError;
use crate::store::Snapshot;

/// Tokens for outbound integrations.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiTokens {
    api_token: String,
    pub sns_topic: Option<String>,
    pub kafka_url: Option<String>,
}

impl ApiTokens {
    pub const API_TOKEN: &'static str = "API_TOKEN";
    pub const AWS_SNS_TOPIC: &'static str = "AWS_SNS_TOPIC";
    pub const KAFKA_URL: &'static str = "KAFKA_URL";

    pub fn api_token(&self) -> &str {
        &self.api_token
    }
}

impl FromCredentials for ApiTokens {
    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, HandlerError> {
        Ok(Self {
            api_token: required(snapshot, Self::API_TOKEN)?.to_string(),
            sns_topic: optional(snapshot, Self::AWS_SNS_TOPIC),
            kafka_url: optional(snapshot, Self::KAFKA_URL),
        })
    }
}

impl fmt::Debug for ApiTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokens")
            .field("api_token", &"***")
            .field("sns_topic", &self.sns_topic)
            .field("kafka_url", &self.kafka_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_optional_tokens_may_be_absent() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("API_TOKEN"), "tok-123\n").unwrap();
        fs::write(temp_dir.path().join("KAFKA_URL"), "kafka:9092").unwrap();
        let store = CredentialStore::new("tokens", [temp_dir.path()]);
        store.load();

        let tokens = ApiTokens::from_store(&store).unwrap();
        assert_eq!(tokens.api_token(), "tok-123");
        assert_eq!(tokens.kafka_url.as_deref(), Some("kafka:9092"));
        assert!(tokens.sns_topic.is_none());
        assert!(!format!("{:?}", tokens).contains("tok-123"));
    }

    #[test]
    fn test_api_token_is_required() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new("tokens", [temp_dir.path()]);
        store.load();

        let err = ApiTokens::from_store(&store).unwrap_err();
        assert_eq!(err.key(), Some(ApiTokens::API_TOKEN));
    }
}
