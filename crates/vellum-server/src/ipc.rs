//! The reference front door: a framed JSON-over-Unix-socket server exercising
//! every [`CoreApi`] operation.
//!
//! Grounded on the teacher's `ipc::serve` accept-loop shape (one task per
//! connection, split read/write halves) but framed as length-prefixed JSON
//! rather than postcard, since the protocol this spec fixes is JSON over the
//! wire.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use vellum_core::{CoreApi, Event, Listener, VPath};
use vellum_proto::{
	ErrorCode, IpcFrame, Request, RequestPayload, Response, ResponsePayload, WireChange, WireChangeKind, WireNode,
};

use crate::framing::{read_frame, write_frame};

/// Per-connection state shared between the request handler and the listener
/// the connection registers with the core: which `ProjectNodes`/`FileContent`
/// replies this connection is still waiting on, keyed by an ephemeral id.
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Event>>>>;

struct ConnListener {
	session_user: vellum_proto::UserId,
	pending: PendingMap,
	out_tx: mpsc::UnboundedSender<IpcFrame>,
}

impl Listener for ConnListener {
	fn notify(&self, event: &Event) {
		match event {
			Event::FileEdit { subscribers, .. } => {
				if subscribers.contains(&self.session_user) {
					if let Some(frame) = file_edit_event_frame(event) {
						let _ = self.out_tx.send(IpcFrame::Event(frame));
					}
				}
			}
			Event::ProjectNodes { caller, .. } | Event::FileContent { caller, .. } => {
				let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
				if let Some(tx) = pending.remove(&caller.0) {
					let _ = tx.send(event.clone());
				}
			}
		}
	}
}

fn file_edit_event_frame(event: &Event) -> Option<vellum_proto::Event> {
	let Event::FileEdit { path, changes, version, .. } = event else {
		return None;
	};
	let wire_changes = changes
		.iter()
		.map(|change| match change {
			vellum_core::Change::Insert { pos, text } => WireChange {
				kind: WireChangeKind::Insert,
				pos: *pos as u64,
				content: Some(text.clone()),
				count: None,
			},
			vellum_core::Change::Delete { pos, count } => WireChange {
				kind: WireChangeKind::Delete,
				pos: *pos as u64,
				content: None,
				count: Some(*count as u64),
			},
		})
		.collect();
	Some(vellum_proto::Event {
		payload: vellum_proto::EventPayload::FileEdit {
			file: path.to_string(),
			vers: *version,
			changes: wire_changes,
		},
	})
}

/// Accept connections on `socket_path` until the process is killed, spawning
/// one task per connection. Creates the socket's parent directory and removes
/// a stale socket file from a previous run, matching the teacher bin's own
/// setup before binding.
pub async fn serve(socket_path: &Path, core: Arc<CoreApi>) -> Result<()> {
	if let Some(parent) = socket_path.parent() {
		tokio::fs::create_dir_all(parent)
			.await
			.with_context(|| format!("creating socket parent directory {}", parent.display()))?;
	}
	if socket_path.exists() {
		tokio::fs::remove_file(socket_path)
			.await
			.with_context(|| format!("removing stale socket at {}", socket_path.display()))?;
	}

	let listener = UnixListener::bind(socket_path).with_context(|| format!("binding socket {}", socket_path.display()))?;
	info!(path = %socket_path.display(), "vellumd listening");

	loop {
		let (stream, _addr) = listener.accept().await.context("accepting connection")?;
		let core = Arc::clone(&core);
		tokio::spawn(async move {
			if let Err(err) = handle_connection(stream, core).await {
				warn!(%err, "connection ended with an error");
			}
		});
	}
}

async fn handle_connection(stream: UnixStream, core: Arc<CoreApi>) -> Result<()> {
	let session_user = vellum_proto::UserId(uuid::Uuid::new_v4().to_string());
	let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
	let (out_tx, mut out_rx) = mpsc::unbounded_channel();

	let listener_handle = core.register_application_listener(Box::new(ConnListener {
		session_user: session_user.clone(),
		pending: Arc::clone(&pending),
		out_tx: out_tx.clone(),
	}));

	let (mut read_half, mut write_half) = stream.into_split();

	let writer_task = tokio::spawn(async move {
		while let Some(frame) = out_rx.recv().await {
			if write_frame(&mut write_half, &frame).await.is_err() {
				break;
			}
		}
	});

	loop {
		let frame = match read_frame(&mut read_half).await {
			Ok(Some(frame)) => frame,
			Ok(None) => break,
			Err(err) => {
				debug!(%err, "failed to read frame");
				break;
			}
		};

		let IpcFrame::Request(request) = frame else {
			continue;
		};
		let response = handle_request(&core, request, &session_user, &pending).await;
		if out_tx.send(IpcFrame::Response(response)).is_err() {
			break;
		}
	}

	core.unregister_application_listener(listener_handle);
	core.unregister_user_to_all_files(session_user);
	drop(out_tx);
	let _ = writer_task.await;
	Ok(())
}

async fn handle_request(
	core: &CoreApi,
	request: Request,
	session_user: &vellum_proto::UserId,
	pending: &PendingMap,
) -> Response {
	let id = request.id;
	match request.payload {
		RequestPayload::Open { file } => match VPath::parse(&file) {
			Ok(path) => await_open_file(core, id, path, session_user.clone(), pending).await,
			Err(reason) => bad_request(id, reason),
		},
		RequestPayload::Close { file } => match VPath::parse(&file) {
			Ok(path) => {
				core.unregister_user_to_file(session_user.clone(), path);
				ok(id)
			}
			Err(reason) => bad_request(id, reason),
		},
		RequestPayload::Save { file, changes, .. } => match VPath::parse(&file) {
			Ok(path) => match changes.into_iter().map(from_wire_change).collect::<Result<Vec<_>, _>>() {
				Ok(changes) => {
					core.file_edit(path, changes, session_user.0.clone());
					ok(id)
				}
				Err(reason) => bad_request(id, reason),
			},
			Err(reason) => bad_request(id, reason),
		},
		RequestPayload::Dump { filename } => match VPath::parse(&filename) {
			Ok(path) => match core.peek_file_content(&path) {
				Some((content, vers)) => Response {
					request_id: id,
					payload: ResponsePayload::FileContent {
						file: filename,
						vers,
						content: Some(content),
					},
				},
				None => Response {
					request_id: id,
					payload: ResponsePayload::Error {
						code: ErrorCode::NotFound,
						message: format!("no such file: {filename:?}"),
					},
				},
			},
			Err(reason) => bad_request(id, reason),
		},
		RequestPayload::Tree => await_project_nodes(core, id, pending).await,
		RequestPayload::Archive { path } => match VPath::parse(&path) {
			Ok(prefix) => await_archive(core, id, prefix, session_user.clone()).await,
			Err(reason) => bad_request(id, reason),
		},
		RequestPayload::Subscribe => ok(id),
	}
}

/// Open `path` for `caller` and await the `onFileContent` reply `open_file`'s
/// task dispatches, the same register-then-await shape `await_project_nodes`
/// uses — `open_file`'s event is addressed to `caller` itself, so the pending
/// key is the session user's id rather than an ephemeral one.
async fn await_open_file(
	core: &CoreApi,
	id: vellum_proto::RequestId,
	path: VPath,
	caller: vellum_proto::UserId,
	pending: &PendingMap,
) -> Response {
	let key = caller.0.clone();
	let (tx, rx) = oneshot::channel();
	pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(key.clone(), tx);
	core.open_file(caller, path);

	match tokio::time::timeout(Duration::from_secs(5), rx).await {
		Ok(Ok(Event::FileContent { result: Some((path, content, vers)), .. })) => Response {
			request_id: id,
			payload: ResponsePayload::FileContent {
				file: path.to_string(),
				vers,
				content: Some(content),
			},
		},
		Ok(Ok(Event::FileContent { result: None, .. })) => Response {
			request_id: id,
			payload: ResponsePayload::Error {
				code: ErrorCode::NotFound,
				message: "no such file".to_string(),
			},
		},
		_ => {
			pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(&key);
			internal_error(id, "open request timed out")
		}
	}
}

async fn await_project_nodes(core: &CoreApi, id: vellum_proto::RequestId, pending: &PendingMap) -> Response {
	let key = uuid::Uuid::new_v4().to_string();
	let (tx, rx) = oneshot::channel();
	pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(key.clone(), tx);
	core.get_project_nodes(vellum_proto::UserId(key.clone()));

	match tokio::time::timeout(Duration::from_secs(5), rx).await {
		Ok(Ok(Event::ProjectNodes { nodes, .. })) => Response {
			request_id: id,
			payload: ResponsePayload::Tree {
				nodes: nodes
					.into_iter()
					.map(|(path, is_dir)| WireNode {
						node: path.to_string(),
						is_dir,
					})
					.collect(),
			},
		},
		_ => {
			pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(&key);
			internal_error(id, "tree request timed out")
		}
	}
}

async fn await_archive(
	core: &CoreApi,
	id: vellum_proto::RequestId,
	prefix: VPath,
	caller: vellum_proto::UserId,
) -> Response {
	let rx = core.create_archive(prefix, caller);
	match tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(30))).await {
		Ok(Ok(Ok(out_path))) => Response {
			request_id: id,
			payload: ResponsePayload::Archive {
				path: out_path.display().to_string(),
			},
		},
		Ok(Ok(Err(err))) => {
			error!(%err, "archive creation failed");
			internal_error(id, "archive creation failed")
		}
		_ => internal_error(id, "archive request timed out"),
	}
}

fn from_wire_change(wire: WireChange) -> Result<vellum_core::Change, &'static str> {
	match wire.kind {
		WireChangeKind::Insert => Ok(vellum_core::Change::Insert {
			pos: wire.pos as usize,
			text: wire.content.ok_or("insertion change missing content")?,
		}),
		WireChangeKind::Delete => Ok(vellum_core::Change::Delete {
			pos: wire.pos as usize,
			count: wire.count.ok_or("deletion change missing count")? as usize,
		}),
	}
}

fn ok(id: vellum_proto::RequestId) -> Response {
	Response {
		request_id: id,
		payload: ResponsePayload::Ok,
	}
}

fn bad_request(id: vellum_proto::RequestId, reason: &'static str) -> Response {
	Response {
		request_id: id,
		payload: ResponsePayload::Error {
			code: ErrorCode::BadRequest,
			message: reason.to_string(),
		},
	}
}

fn internal_error(id: vellum_proto::RequestId, message: &'static str) -> Response {
	Response {
		request_id: id,
		payload: ResponsePayload::Error {
			code: ErrorCode::Internal,
			message: message.to_string(),
		},
	}
}
