//! Line-oriented console confirmation channel.
//!
//! Writes the rendered prompt to the output stream and reads one line of
//! reply. End of input is a channel failure, not an answer. Bytes that are
//! not valid UTF-8 are decoded lossily and handed on as an unrecognized reply.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use vigil_types::errors::VigilError;
use vigil_types::traits::HumanConfirmation;
use vigil_types::{ConfirmationPrompt, HumanReply};

use crate::confirmation::render_prompt;

struct ConsoleIo<R, W> {
    reader: R,
    writer: W,
}

/// Confirmation channel over an async reader/writer pair.
///
/// The reviewer named in the prompt is recorded as the responder.
pub struct ConsoleConfirmation<R, W> {
    io: Mutex<ConsoleIo<R, W>>,
}

impl ConsoleConfirmation<BufReader<Stdin>, Stdout> {
    /// Console channel over the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleConfirmation<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new(ConsoleIo { reader, writer }),
        }
    }
}

fn channel_error(action: &str, e: std::io::Error) -> VigilError {
    VigilError::ConfirmationChannel(format!("failed to {action}: {e}"))
}

#[async_trait]
impl<R, W> HumanConfirmation for ConsoleConfirmation<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<HumanReply, VigilError> {
        let mut io = self.io.lock().await;

        let text = format!("{} ", render_prompt(prompt));
        io.writer
            .write_all(text.as_bytes())
            .await
            .map_err(|e| channel_error("write prompt", e))?;
        io.writer
            .flush()
            .await
            .map_err(|e| channel_error("flush prompt", e))?;

        let mut line = Vec::new();
        let read = io
            .reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| channel_error("read reply", e))?;
        if read == 0 {
            return Err(VigilError::ConfirmationChannel(
                "input closed before a reply was given".to_string(),
            ));
        }

        tracing::debug!(
            recommendation = %prompt.recommendation.name,
            attempt = prompt.attempt,
            "console reply received"
        );
        let text = String::from_utf8_lossy(&line);
        Ok(HumanReply::new(prompt.reviewer.clone(), text.trim_end()))
    }
}
