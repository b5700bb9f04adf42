use a11y_edit::LiveEditor;
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info};

use crate::dispatch::SessionManager;
use crate::protocol::{Notification, Request};

pub const MAX_LINE_LENGTH: usize = 1 << 20;

pub struct Server {
    editor: Arc<LiveEditor>,
}

impl Server {
    pub fn new(editor: LiveEditor) -> Self {
        Self {
            editor: Arc::new(editor),
        }
    }

    /// Serve JSON lines from `input`, writing notifications to `output`, until
    /// `input` ends and every queued request has been handled.
    pub async fn run<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (notify, mut notifications) = mpsc::unbounded_channel::<Notification>();

        let writer = tokio::spawn(async move {
            let mut sink = FramedWrite::new(output, LinesCodec::new());
            while let Some(notification) = notifications.recv().await {
                let line = match serde_json::to_string(&notification) {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to serialize notification: {:?}", e);
                        continue;
                    }
                };
                debug!("Sending: {}", line);
                if let Err(e) = sink.send(line).await {
                    error!("Failed to write notification: {:?}", e);
                    break;
                }
            }
        });

        let mut sessions = SessionManager::new(self.editor.clone(), notify.clone());
        let mut lines = FramedRead::new(
            input,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        );

        info!("Server ready, waiting for requests");

        // a decode error is followed by one `None`; the stream then resumes
        let mut recovering = false;
        loop {
            let line = match lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    error!("Dropped request longer than {} bytes", MAX_LINE_LENGTH);
                    let _ = notify.send(Notification::error(None, "request line too long"));
                    recovering = true;
                    continue;
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    error!("Failed to read input: {:?}", e);
                    break;
                }
                None if recovering => {
                    recovering = false;
                    continue;
                }
                None => break,
            };
            if line.trim().is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            match serde_json::from_str::<Request>(&line) {
                Ok(request) => sessions.dispatch(request),
                Err(e) => {
                    error!("Malformed request {:?}: {:?}", line, e);
                    let _ = notify.send(Notification::error(None, format!("Parse error: {}", e)));
                }
            }
        }

        info!("Input closed, draining {} session(s)", sessions.session_count());
        sessions.shutdown().await;
        drop(notify);
        writer.await?;
        Ok(())
    }
}
