use serde::{ Serialize, Deserialize };

use super::chat::ConversationSnapshot;
use super::study_plan::StudyPlanRequest;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "cancel")]
    Cancel,
    #[serde(rename = "study_plan")] StudyPlan(StudyPlanRequest),
    /// Base64-encoded PDF bytes; an empty payload counts as no upload.
    #[serde(rename = "pdf")] Pdf {
        #[serde(default)]
        data: String,
        #[serde(default)]
        filename: Option<String>,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session")] Session {
        conversation_id: String,
    },
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "conversation")] Conversation {
        conversation: ConversationSnapshot,
    },
    #[serde(rename = "done")] Done {
        conversation: ConversationSnapshot,
        timestamp: i64,
    },
    #[serde(rename = "cleared")] Cleared {
        conversation_id: String,
    },
    #[serde(rename = "study_plan")] StudyPlan {
        content: String,
    },
    #[serde(rename = "pdf")] Pdf {
        content: String,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::study_plan::Level;

    #[test]
    fn client_messages_are_type_tagged() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"hi"}"#).unwrap();
        assert!(matches!(chat, ClientMessage::Chat { content } if content == "hi"));

        let clear: ClientMessage = serde_json::from_str(r#"{"type":"clear"}"#).unwrap();
        assert!(matches!(clear, ClientMessage::Clear));

        let plan: ClientMessage = serde_json::from_str(
            r#"{"type":"study_plan","topic":"Algebra","level":"Advanced","hours_per_week":4,"method":"Visual","goal":"exam"}"#
        ).unwrap();
        match plan {
            ClientMessage::StudyPlan(req) => {
                assert_eq!(req.level, Some(Level::Advanced));
                assert_eq!(req.hours_per_week, Some(4.0));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn pdf_without_data_is_accepted() {
        let pdf: ClientMessage = serde_json::from_str(r#"{"type":"pdf"}"#).unwrap();
        assert!(matches!(pdf, ClientMessage::Pdf { data, filename: None } if data.is_empty()));
    }

    #[test]
    fn server_error_shape() {
        let json = serde_json::to_value(ServerMessage::Error { message: "busy".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "error", "message": "busy" }));
    }
}
