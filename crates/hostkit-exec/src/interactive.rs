//! Interactive streaming over a remote channel
//!
//! Channel output goes straight to the local terminal; local stdin is
//! forwarded line by line. The loop runs until the remote side closes the
//! channel.

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::result::UNKNOWN_STATUS;

fn io_error(e: std::io::Error) -> ExecError {
    ExecError::IoError(e.to_string())
}

/// Stream a channel to the local terminal and return the exit status
pub(crate) async fn stream(channel: &mut Channel<Msg>) -> Result<i32, ExecError> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut stderr = Vec::new();
    let mut status = UNKNOWN_STATUS;
    let mut input_open = true;

    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    stdout.write_all(&data).await.map_err(io_error)?;
                    stdout.flush().await.map_err(io_error)?;
                }
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    stderr.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = exit_status.cast_signed();
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    debug!(signal = ?signal_name, "remote command killed by signal");
                }
                Some(_) => {}
                None => break,
            },
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    let mut bytes = line.into_bytes();
                    bytes.push(b'\n');
                    channel.data(bytes.as_slice()).await?;
                }
                Ok(None) => {
                    input_open = false;
                    channel.eof().await?;
                }
                Err(e) => {
                    warn!(error = %e, "local stdin failed, closing remote input");
                    input_open = false;
                    channel.eof().await?;
                }
            },
        }
    }

    if !stderr.is_empty() {
        let mut local = tokio::io::stderr();
        local.write_all(&stderr).await.map_err(io_error)?;
        local.flush().await.map_err(io_error)?;
    }

    Ok(status)
}
