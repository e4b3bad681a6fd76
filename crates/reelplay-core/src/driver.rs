//! Event loop driving a playback session
//!
//! One task owns the session and multiplexes its inputs: player events,
//! user commands, store change notifications and the auto-advance timer.

use crate::{player::PlayerEvent, session::PlaybackSession, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

/// Default capacity of the command channel
pub const COMMAND_BUFFER: usize = 32;

/// User-initiated operations on a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    ChangeEpisode(usize),
    NextEpisode,
    PreviousEpisode,
    ChangeSource { source: String, id: String },
    SetAdFilter(bool),
    ToggleFavorite,
    PageHidden,
    Shutdown,
}

/// Runs a session until shutdown
pub struct PlaybackDriver {
    session: PlaybackSession,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    commands: mpsc::Receiver<SessionCommand>,
}

impl PlaybackDriver {
    /// `events` is fed by the player implementation, `commands` by the UI
    pub fn new(
        session: PlaybackSession,
        events: mpsc::UnboundedReceiver<PlayerEvent>,
        commands: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        Self {
            session,
            events,
            commands,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn into_session(self) -> PlaybackSession {
        self.session
    }

    /// Resolve, start playback and process inputs until shutdown or a
    /// terminal error. The session is always shut down on return.
    #[instrument(skip(self), fields(session_id = %self.session.id()))]
    pub async fn run(&mut self) -> Result<()> {
        let outcome = self.drive().await;
        if let Err(e) = &outcome {
            warn!(code = e.error_code(), error = %e, "Playback ended with error");
        }
        self.session.shutdown().await;
        outcome
    }

    async fn drive(&mut self) -> Result<()> {
        self.session.resolve().await?;
        self.session.start()?;

        let mut storage = self.session.subscribe_storage();
        let mut storage_open = true;

        loop {
            let advance_at = self.session.pending_advance_deadline();

            tokio::select! {
                Some(event) = self.events.recv() => {
                    accept(self.session.handle_event(event).await)?;
                }

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) => {
                        info!("Shutdown requested");
                        return Ok(());
                    }
                    Some(command) => self.apply(command).await?,
                    None => {
                        debug!("Command channel closed");
                        return Ok(());
                    }
                },

                update = storage.recv(), if storage_open => match update {
                    Ok(event) => self.session.apply_storage_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Storage notifications lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => storage_open = false,
                },

                _ = sleep_until(advance_at.unwrap_or_else(Instant::now)), if advance_at.is_some() => {
                    accept(self.session.fire_pending_advance(Instant::now()))?;
                }
            }
        }
    }

    async fn apply(&mut self, command: SessionCommand) -> Result<()> {
        debug!(?command, "Applying command");
        let result = match command {
            SessionCommand::ChangeEpisode(index) => self.session.change_episode(index).await,
            SessionCommand::NextEpisode => self.session.next_episode().await,
            SessionCommand::PreviousEpisode => self.session.previous_episode().await,
            SessionCommand::ChangeSource { source, id } => self.session.change_source(&source, &id).await,
            SessionCommand::SetAdFilter(enabled) => self.session.set_ad_filter(enabled),
            SessionCommand::ToggleFavorite => {
                self.session.toggle_favorite().await;
                Ok(())
            }
            SessionCommand::PageHidden => {
                self.session.on_page_hidden().await;
                Ok(())
            }
            SessionCommand::Shutdown => Ok(()),
        };
        accept(result)
    }
}

/// Keep running through rejected operations; stop on terminal errors
fn accept(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_terminal() => Err(e),
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "Operation rejected");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
