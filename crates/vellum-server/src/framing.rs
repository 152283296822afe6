//! Length-prefixed JSON framing for the reference socket front door: a 4-byte
//! big-endian length prefix followed by that many bytes of JSON.

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use vellum_proto::IpcFrame;

/// 4 MiB; large enough for any archive-path or tree response this reference
/// server produces, small enough to bound a malicious length prefix.
const MAX_FRAME_LEN: u32 = 4 * 1024 * 1024;

pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<IpcFrame>> {
	let mut len_buf = [0u8; 4];
	match reader.read_exact(&mut len_buf).await {
		Ok(_) => {}
		Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
		Err(err) => return Err(err).context("reading frame length prefix"),
	}
	let len = u32::from_be_bytes(len_buf);
	if len > MAX_FRAME_LEN {
		bail!("frame length {len} exceeds maximum of {MAX_FRAME_LEN}");
	}

	let mut payload = vec![0u8; len as usize];
	reader.read_exact(&mut payload).await.context("reading frame payload")?;
	let frame = serde_json::from_slice(&payload).context("parsing frame JSON")?;
	Ok(Some(frame))
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, frame: &IpcFrame) -> Result<()> {
	let payload = serde_json::to_vec(frame).context("serializing frame JSON")?;
	let len = u32::try_from(payload.len()).context("frame too large to encode")?;
	writer.write_all(&len.to_be_bytes()).await?;
	writer.write_all(&payload).await?;
	writer.flush().await?;
	Ok(())
}
