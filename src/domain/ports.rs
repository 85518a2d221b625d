use crate::domain::messages::ServiceKind;
use async_trait::async_trait;
use serde_json::Value;

/// A stateless service answering one family of registrar questions.
///
/// Requests and replies are JSON objects keyed by `tipo`. Implementations never
/// fail: unknown kinds and bad fields are answered with an `erro` reply.
#[async_trait]
pub trait RuleService: Send + Sync {
    fn kind(&self) -> ServiceKind;

    async fn handle(&self, request: &Value) -> Value;
}
