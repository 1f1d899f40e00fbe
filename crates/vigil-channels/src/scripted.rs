//! Scripted confirmation channel.
//!
//! Replays a fixed list of replies for non-interactive runs. Each prompt and
//! the reply given to it can be echoed to a transcript writer so the run
//! still reads like a console session.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Sink};
use tokio::sync::Mutex;

use vigil_types::errors::VigilError;
use vigil_types::traits::HumanConfirmation;
use vigil_types::{ConfirmationPrompt, HumanReply};

use crate::confirmation::render_prompt;

struct ScriptState<W> {
    replies: VecDeque<String>,
    transcript: W,
}

/// Confirmation channel that answers from a queue of canned replies.
///
/// Running out of replies is a channel failure.
pub struct ScriptedConfirmation<W = Sink> {
    state: Mutex<ScriptState<W>>,
}

impl ScriptedConfirmation<Sink> {
    /// Replies without a transcript.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_transcript(replies, tokio::io::sink())
    }
}

impl<W> ScriptedConfirmation<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Replies with every prompt and answer echoed to `transcript`.
    pub fn with_transcript<I, S>(replies: I, transcript: W) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(ScriptState {
                replies: replies.into_iter().map(Into::into).collect(),
                transcript,
            }),
        }
    }
}

#[async_trait]
impl<W> HumanConfirmation for ScriptedConfirmation<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<HumanReply, VigilError> {
        let mut state = self.state.lock().await;

        let reply = state.replies.pop_front().ok_or_else(|| {
            VigilError::ConfirmationChannel(format!(
                "no scripted reply left for '{}'",
                prompt.recommendation.name
            ))
        })?;

        let echo = format!("{} {reply}\n", render_prompt(prompt));
        state
            .transcript
            .write_all(echo.as_bytes())
            .await
            .map_err(|e| VigilError::ConfirmationChannel(format!("failed to write transcript: {e}")))?;
        state
            .transcript
            .flush()
            .await
            .map_err(|e| VigilError::ConfirmationChannel(format!("failed to write transcript: {e}")))?;

        Ok(HumanReply::new(prompt.reviewer.clone(), reply))
    }
}
