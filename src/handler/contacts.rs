//! Direct contact channels offered when recovery fails.

use serde::{Deserialize, Serialize};

/// Channels the user can reach out through when a submission cannot be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackContacts {
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    pub message: String,
}

impl Default for FallbackContacts {
    fn default() -> Self {
        Self {
            phone: String::new(),
            email: String::new(),
            whatsapp: None,
            message: "If the problem persists, please contact us directly.".to_string(),
        }
    }
}

impl FallbackContacts {
    /// Announcement listing the configured channels.
    pub fn announcement(&self) -> String {
        let mut parts = Vec::new();
        if !self.phone.is_empty() {
            parts.push(format!("phone {}", self.phone));
        }
        if !self.email.is_empty() {
            parts.push(format!("email {}", self.email));
        }
        if self.whatsapp.is_some() {
            parts.push("WhatsApp available".to_string());
        }

        if parts.is_empty() {
            self.message.clone()
        } else {
            format!("Contact information: {}.", parts.join(", "))
        }
    }
}

/// What the caller should offer after recovery failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackAdvice {
    pub message: String,
    /// The submission was stored for a later replay.
    pub queued: bool,
    pub contacts: FallbackContacts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_lists_channels() {
        let contacts = FallbackContacts {
            phone: "+1 555 0100".to_string(),
            email: "help@example.com".to_string(),
            whatsapp: Some("https://wa.me/15550100".to_string()),
            ..FallbackContacts::default()
        };
        assert_eq!(
            contacts.announcement(),
            "Contact information: phone +1 555 0100, email help@example.com, WhatsApp available."
        );
    }

    #[test]
    fn test_announcement_without_channels_uses_message() {
        let contacts = FallbackContacts::default();
        assert_eq!(contacts.announcement(), contacts.message);
    }
}
