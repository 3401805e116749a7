//! Messages exchanged between the trigger surface, the orchestrator and the
//! presenter.
//!
//! Every message is a JSON object discriminated by its `action` field, e.g.
//! `{"action":"SHOW_RESULT","text":"hello","debugImage":"data:image/png;base64,..."}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payload::ImagePayload;
use crate::region::Region;

/// Identifies the presenter that receives the outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab {}", self.0)
    }
}

/// Requests handled by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorMessage {
    /// Capture the visible screen, crop it to `area` and extract its text.
    #[serde(rename_all = "camelCase")]
    CaptureAndExtract { area: Region, tab_id: TabId },
    /// Extract text from an image the trigger already holds.
    #[serde(rename_all = "camelCase")]
    ExtractFromImage {
        image_data: ImagePayload,
        tab_id: TabId,
    },
}

impl OrchestratorMessage {
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::CaptureAndExtract { tab_id, .. } | Self::ExtractFromImage { tab_id, .. } => {
                *tab_id
            }
        }
    }
}

/// Messages rendered by a presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenterMessage {
    StartSelection,
    #[serde(rename_all = "camelCase")]
    ShowResult {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debug_image: Option<ImagePayload>,
    },
    #[serde(rename_all = "camelCase")]
    ShowError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debug_image: Option<ImagePayload>,
    },
}

/// Any message that can appear on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Orchestrator(OrchestratorMessage),
    Presenter(PresenterMessage),
}
