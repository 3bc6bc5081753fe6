//! Security audit logging
//!
//! Security-relevant events are emitted as structured `tracing` events on the `audit`
//! target so they can be routed separately from application logs.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AuthenticationSuccess,
    AuthenticationFailure,
    Logout,
    TokensRevoked,
    RefreshTokenReuse,
    AuthThrottled,
    FirmReviewed,
    MediaUploaded,
    MediaDeleted,
    MediaQuarantined,
}

#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Acting user when different from the subject (admin actions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditLogEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            user_id: None,
            actor_id: None,
            client_ip: None,
            user_agent: None,
            details: None,
            success: true,
            error_message: None,
        }
    }

    pub fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn client(mut self, client_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.client_ip = client_ip;
        self.user_agent = user_agent;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn failure(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    pub fn log(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());

        if self.success {
            tracing::event!(
                target: "audit",
                tracing::Level::INFO,
                audit_entry = %json,
                event_type = ?self.event_type,
                user_id = ?self.user_id,
                success = true,
                "Security audit log"
            );
        } else {
            tracing::event!(
                target: "audit",
                tracing::Level::WARN,
                audit_entry = %json,
                event_type = ?self.event_type,
                user_id = ?self.user_id,
                success = false,
                error = ?self.error_message,
                "Security audit log - failure"
            );
        }
    }
}

pub fn log_authentication_attempt(
    user_id: Option<Uuid>,
    client_ip: Option<String>,
    user_agent: Option<String>,
    error_message: Option<&str>,
) {
    let entry = match error_message {
        None => AuditLogEntry::new(AuditEventType::AuthenticationSuccess),
        Some(reason) => AuditLogEntry::new(AuditEventType::AuthenticationFailure).failure(reason),
    };
    entry.user(user_id).client(client_ip, user_agent).log();
}

pub fn log_tokens_revoked(user_id: Uuid, actor_id: Uuid, refresh_tokens: u64) {
    AuditLogEntry::new(AuditEventType::TokensRevoked)
        .user(Some(user_id))
        .actor(actor_id)
        .details(serde_json::json!({ "refresh_tokens_revoked": refresh_tokens }))
        .log();
}

pub fn log_refresh_token_reuse(user_id: Uuid, client_ip: Option<String>) {
    AuditLogEntry::new(AuditEventType::RefreshTokenReuse)
        .user(Some(user_id))
        .client(client_ip, None)
        .failure("Revoked refresh token presented; all sessions revoked")
        .log();
}

pub fn log_firm_reviewed(firm_id: Uuid, reviewer_id: Uuid, action: &str) {
    AuditLogEntry::new(AuditEventType::FirmReviewed)
        .actor(reviewer_id)
        .details(serde_json::json!({ "firm_id": firm_id, "action": action }))
        .log();
}

pub fn log_media_event(event_type: AuditEventType, user_id: Option<Uuid>, media_id: Uuid, firm_id: Uuid) {
    AuditLogEntry::new(event_type)
        .user(user_id)
        .details(serde_json::json!({ "media_id": media_id, "firm_id": firm_id }))
        .log();
}
