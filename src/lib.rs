use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub mod clients;
pub mod conversation;
pub mod error;
pub mod events;
pub mod stream;

pub fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();
}

/// Which transformation the deployed function serves.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FunctionMode {
    ConversationAnalysis,
    EventStream,
}

impl FunctionMode {
    pub fn load_from_env() -> Result<FunctionMode, String> {
        std::env::var("FUNCTION_MODE")
            .unwrap_or_else(|_| "conversation-analysis".to_string())
            .parse()
    }
}

impl FromStr for FunctionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "conversation-analysis" => Ok(FunctionMode::ConversationAnalysis),
            "event-stream" => Ok(FunctionMode::EventStream),
            other => Err(format!("Invalid or Unsupported function mode {}", other)),
        }
    }
}

impl fmt::Display for FunctionMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionMode::ConversationAnalysis => write!(f, "conversation-analysis"),
            FunctionMode::EventStream => write!(f, "event-stream"),
        }
    }
}
