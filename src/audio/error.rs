use std::time::Duration;
use thiserror::Error;

/// Errores del resolvedor de medios (yt-dlp, red, protocolo).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// El proceso externo terminó con un estado distinto de cero.
    #[error("el proceso del resolvedor falló: {0}")]
    Process(String),

    #[error("el resolvedor excedió el tiempo límite de {0:?}")]
    Timeout(Duration),

    /// Respuesta con forma inesperada.
    #[error("respuesta inválida del resolvedor: {0}")]
    Protocol(String),

    #[error("error de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errores del transporte de voz.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("no hay conexión de voz activa")]
    NotConnected,

    #[error("no se pudo entrar al canal de voz: {0}")]
    Join(String),

    #[error("error de control del track: {0}")]
    Control(String),
}

/// Errores visibles para quien invoca una operación del orquestador.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Fallo de transporte o protocolo al resolver; la cola queda intacta.
    #[error("no se pudo resolver '{query}': {source}")]
    ResolveFailed {
        query: String,
        #[source]
        source: ResolveError,
    },

    /// El resolvedor respondió, pero nada era reproducible.
    #[error("no hay resultados reproducibles para '{query}'")]
    NoUsableResult { query: String },

    #[error("la sesión de voz ya no está conectada")]
    TransportDisconnected,

    /// Índice 1-based fuera de la cola.
    #[error("índice {index} inválido (la cola tiene {len} canciones)")]
    InvalidIndex { index: i64, len: usize },

    #[error("volumen {0} fuera de rango (0-100)")]
    InvalidVolume(i64),

    #[error("la cola está llena (máximo {max} canciones)")]
    QueueFull { max: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// El worker del guild ya no acepta comandos.
    #[error("el reproductor del servidor no está disponible")]
    GuildUnavailable,
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
