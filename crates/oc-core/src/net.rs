//! Wire protocol: JSON text frames with a `cmd` discriminator (spec.md §6).
//!
//! Diverges from the teacher's binary `rmp_serde` framing — the spec
//! mandates JSON text frames over the duplex channel, so this module uses
//! `serde_json` with an internally-tagged enum instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current protocol version, reported in the `setup` frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// An incoming client frame: `{"cmd": "...", ...args}`. Arguments are kept
/// as a raw JSON object and destructured per-handler, mirroring the
/// source's `**data` keyword-argument dispatch (spec.md §4.C).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub cmd: String,
    #[serde(flatten)]
    pub args: Value,
}

/// Reserved server-originated commands (spec.md §6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ServerFrame {
    Update(Value),
    StateChange(Value),
    Setup(Value),
    Endpoints(Vec<EndpointDescriptor>),
    Editing { positions: Vec<EditingPosition> },
    Voted,
    Error { message: String, exception: Option<String> },
    Close,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditingPosition {
    pub session: String,
    pub username: String,
    pub position: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_decodes_cmd_and_keeps_rest_as_args() {
        let frame: ClientFrame = serde_json::from_str(r#"{"cmd":"next_clue","foo":1}"#).unwrap();
        assert_eq!(frame.cmd, "next_clue");
        assert_eq!(frame.args["foo"], 1);
    }

    #[test]
    fn server_frame_tags_with_cmd() {
        let encoded = serde_json::to_value(ServerFrame::Close).unwrap();
        assert_eq!(encoded["cmd"], "close");
    }

    #[test]
    fn error_frame_shape() {
        let encoded = serde_json::to_value(ServerFrame::Error {
            message: "bad".to_string(),
            exception: None,
        })
        .unwrap();
        assert_eq!(encoded["cmd"], "error");
        assert_eq!(encoded["message"], "bad");
    }
}
