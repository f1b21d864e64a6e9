//! Concrete collaborators for steward-core: the Gemini reasoning client, the Slack
//! messenger, and the Google Calendar/Tasks workspace.

mod gemini;
mod google;
mod slack;

pub use gemini::{GeminiClient, LlmMode, ENV_GEMINI_API_KEY};
pub use google::{GoogleWorkspace, ENV_GOOGLE_ACCESS_TOKEN, ENV_GOOGLE_TIME_ZONE};
pub use slack::{SlackMessenger, ENV_SLACK_BOT_TOKEN};
