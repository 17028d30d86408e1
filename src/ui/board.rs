//! Live "now playing" message, one per guild.
//!
//! The playback core calls [`NowPlayingBoard`] synchronously from inside the
//! guild worker, so the listener only pushes a [`BoardUpdate`] into a channel.
//! [`BoardPresenter::run`] drains that channel on its own task, keeps only the
//! newest view per guild when updates pile up, and edits the message in place.
//! A deleted message is sent again.

use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, GuildId, MessageId},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{buttons, embeds};
use crate::audio::{PlaybackListener, PlaybackView};

#[derive(Debug, Clone)]
pub enum BoardUpdate {
    /// El tablero del guild vive en este canal de texto.
    Bind { guild_id: GuildId, channel_id: ChannelId },
    Changed { guild_id: GuildId, view: PlaybackView },
}

/// Lado del reproductor: encola actualizaciones sin bloquear al worker.
#[derive(Clone)]
pub struct NowPlayingBoard {
    tx: mpsc::UnboundedSender<BoardUpdate>,
}

impl NowPlayingBoard {
    pub fn new() -> (Self, BoardPresenter) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            BoardPresenter {
                rx,
                boards: HashMap::new(),
            },
        )
    }

    /// Usa `channel_id` para el tablero del guild a partir de ahora.
    pub fn bind(&self, guild_id: GuildId, channel_id: ChannelId) {
        let _ = self.tx.send(BoardUpdate::Bind { guild_id, channel_id });
    }
}

impl PlaybackListener for NowPlayingBoard {
    fn playback_changed(&self, guild_id: GuildId, view: &PlaybackView) {
        if self
            .tx
            .send(BoardUpdate::Changed {
                guild_id,
                view: view.clone(),
            })
            .is_err()
        {
            debug!("🪧 Tablero cerrado, se descarta la vista de guild {}", guild_id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BoardMessage {
    channel_id: ChannelId,
    message_id: Option<MessageId>,
}

/// Lado de Discord: dueño de los mensajes de cada guild.
pub struct BoardPresenter {
    rx: mpsc::UnboundedReceiver<BoardUpdate>,
    boards: HashMap<GuildId, BoardMessage>,
}

impl BoardPresenter {
    pub async fn run(mut self, http: Arc<Http>) {
        info!("🪧 Tablero de reproducción iniciado");

        while let Some(first) = self.rx.recv().await {
            let mut pending = Vec::new();
            self.absorb(first, &mut pending);
            while let Ok(next) = self.rx.try_recv() {
                self.absorb(next, &mut pending);
            }

            for (guild_id, view) in pending {
                self.render(&http, guild_id, &view).await;
            }
        }

        info!("🪧 Tablero de reproducción detenido");
    }

    /// Aplica un `Bind` o deja la última vista del guild en `pending`.
    fn absorb(&mut self, update: BoardUpdate, pending: &mut Vec<(GuildId, PlaybackView)>) {
        match update {
            BoardUpdate::Bind { guild_id, channel_id } => {
                let board = self.boards.entry(guild_id).or_insert(BoardMessage {
                    channel_id,
                    message_id: None,
                });
                if board.channel_id != channel_id {
                    // El mensaje viejo queda en el otro canal
                    board.channel_id = channel_id;
                    board.message_id = None;
                }
            }
            BoardUpdate::Changed { guild_id, view } => {
                match pending.iter_mut().find(|(id, _)| *id == guild_id) {
                    Some((_, latest)) => *latest = view,
                    None => pending.push((guild_id, view)),
                }
            }
        }
    }

    async fn render(&mut self, http: &Arc<Http>, guild_id: GuildId, view: &PlaybackView) {
        let Some(board) = self.boards.get_mut(&guild_id) else {
            debug!("🪧 Guild {} sin canal de tablero", guild_id);
            return;
        };

        let embed = embeds::now_playing_embed(view);
        let components = buttons::player_controls(view);

        if let Some(message_id) = board.message_id {
            let edit = EditMessage::new()
                .embed(embed.clone())
                .components(components.clone());
            match board.channel_id.edit_message(http, message_id, edit).await {
                Ok(_) => return,
                Err(e) if is_not_found(&e) => {
                    debug!("🪧 El tablero de guild {} fue borrado, se envía de nuevo", guild_id);
                }
                Err(e) => {
                    warn!("⚠️ No se pudo editar el tablero de guild {}: {}", guild_id, e);
                    return;
                }
            }
        }

        let message = CreateMessage::new().embed(embed).components(components);
        match board.channel_id.send_message(http, message).await {
            Ok(sent) => board.message_id = Some(sent.id),
            Err(e) => {
                board.message_id = None;
                warn!("⚠️ No se pudo enviar el tablero de guild {}: {}", guild_id, e);
            }
        }
    }
}

fn is_not_found(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(e) => e.status_code().is_some_and(|status| status.as_u16() == 404),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackListener;
    use pretty_assertions::assert_eq;

    fn view(title: &str) -> PlaybackView {
        PlaybackView {
            current_title: Some(title.to_string()),
            is_playing: true,
            ..PlaybackView::default()
        }
    }

    #[test]
    fn keeps_only_the_latest_view_per_guild() {
        let (_board, mut presenter) = NowPlayingBoard::new();
        let mut pending = Vec::new();

        presenter.absorb(
            BoardUpdate::Changed { guild_id: GuildId::new(1), view: view("A") },
            &mut pending,
        );
        presenter.absorb(
            BoardUpdate::Changed { guild_id: GuildId::new(2), view: view("X") },
            &mut pending,
        );
        presenter.absorb(
            BoardUpdate::Changed { guild_id: GuildId::new(1), view: view("B") },
            &mut pending,
        );

        assert_eq!(
            pending,
            vec![(GuildId::new(1), view("B")), (GuildId::new(2), view("X"))]
        );
    }

    #[test]
    fn rebinding_to_another_channel_forgets_the_message() {
        let (_board, mut presenter) = NowPlayingBoard::new();
        let guild_id = GuildId::new(1);
        let mut pending = Vec::new();

        presenter.absorb(
            BoardUpdate::Bind { guild_id, channel_id: ChannelId::new(10) },
            &mut pending,
        );
        if let Some(board) = presenter.boards.get_mut(&guild_id) {
            board.message_id = Some(MessageId::new(99));
        }

        // Mismo canal: el mensaje se conserva
        presenter.absorb(
            BoardUpdate::Bind { guild_id, channel_id: ChannelId::new(10) },
            &mut pending,
        );
        assert_eq!(presenter.boards[&guild_id].message_id, Some(MessageId::new(99)));

        presenter.absorb(
            BoardUpdate::Bind { guild_id, channel_id: ChannelId::new(20) },
            &mut pending,
        );
        assert_eq!(
            presenter.boards[&guild_id],
            BoardMessage { channel_id: ChannelId::new(20), message_id: None }
        );
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn listener_forwards_views() {
        let (board, mut presenter) = NowPlayingBoard::new();
        board.playback_changed(GuildId::new(7), &view("Song A"));

        match presenter.rx.recv().await {
            Some(BoardUpdate::Changed { guild_id, view: sent }) => {
                assert_eq!(guild_id, GuildId::new(7));
                assert_eq!(sent.current_title.as_deref(), Some("Song A"));
            }
            other => panic!("actualización inesperada: {:?}", other),
        }
    }
}
