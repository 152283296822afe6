//! Request/response/event envelope for the reference front door.

use serde::{Deserialize, Serialize};

/// Opaque user identity, supplied by whatever collaborator owns session/auth.
///
/// The core never manufactures one of these; it only ever echoes back an id it was
/// given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A file's monotonic version counter. Opaque to clients beyond equality/ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileVersion(pub u64);

/// Correlates a `Response` with the `Request` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// One insertion or deletion, in the wire shape fixed by the collaborative-edit
/// protocol: `type: 1` is an insertion carrying `content`, `type: -1` is a deletion
/// carrying `count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChange {
	#[serde(rename = "type")]
	pub kind: WireChangeKind,
	pub pos: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub count: Option<u64>,
}

/// `1` for insertion, `-1` for deletion, serialized as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum WireChangeKind {
	Insert,
	Delete,
}

impl TryFrom<i8> for WireChangeKind {
	type Error = String;

	fn try_from(value: i8) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(Self::Insert),
			-1 => Ok(Self::Delete),
			other => Err(format!("invalid change type {other}, expected 1 or -1")),
		}
	}
}

impl From<WireChangeKind> for i8 {
	fn from(kind: WireChangeKind) -> Self {
		match kind {
			WireChangeKind::Insert => 1,
			WireChangeKind::Delete => -1,
		}
	}
}

/// One entry of a `tree` response: a path and whether it is a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
	pub node: String,
	#[serde(rename = "isDir")]
	pub is_dir: bool,
}

/// Machine-readable error classification for failed requests, mirroring the
/// disposition table in the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCode {
	BadRequest,
	NotFound,
	Internal,
}

impl ErrorCode {
	/// The conventional HTTP-style status this code maps to.
	pub fn status(self) -> u16 {
		match self {
			Self::BadRequest => 400,
			Self::NotFound => 404,
			Self::Internal => 500,
		}
	}
}

/// Inbound request payloads, one per REST/WS endpoint in the external-interfaces
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RequestPayload {
	Open { file: String },
	Close { file: String },
	Save {
		file: String,
		vers: Option<u64>,
		changes: Vec<WireChange>,
	},
	Dump { filename: String },
	Tree,
	Archive { path: String },
	/// Start receiving `Event::FileEdit` pushes for files this connection opens.
	Subscribe,
}

/// A request frame: an id the response will echo, plus its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub id: RequestId,
	#[serde(flatten)]
	pub payload: RequestPayload,
}

/// Outbound reply payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
	Ok,
	FileContent {
		file: String,
		vers: u64,
		content: Option<String>,
	},
	Tree {
		nodes: Vec<WireNode>,
	},
	Archive {
		path: String,
	},
	Error {
		code: ErrorCode,
		message: String,
	},
}

/// A response frame, correlated to its request by `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub request_id: RequestId,
	#[serde(flatten)]
	pub payload: ResponsePayload,
}

/// Server-pushed payloads, unsolicited by any single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
	FileEdit {
		file: String,
		vers: u64,
		changes: Vec<WireChange>,
	},
	ProjectNodes {
		nodes: Vec<WireNode>,
	},
	FileContent {
		file: String,
		vers: u64,
		content: Option<String>,
	},
}

/// An event frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	#[serde(flatten)]
	pub payload: EventPayload,
}

/// The top-level framed value written to and read from the socket, length-prefixed
/// by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum IpcFrame {
	Request(Request),
	Response(Response),
	Event(Event),
}
