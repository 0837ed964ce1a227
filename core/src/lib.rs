pub mod track;
pub mod language;
pub mod stream;
pub mod stream_selector;
pub mod repository;
pub mod media_source;
pub mod correlation;
pub mod engine;
pub mod recovery;
pub mod player_state;
pub mod config;
pub mod error;

mod orchestrator;
mod handle;

#[cfg(test)]
mod testing;

pub use config::PlayerConfig;
pub use correlation::CorrelationId;
pub use engine::{engine_event_channel, EngineEvent, EngineEvents, PlaybackEngine, QueueEntry};
pub use error::{PlaybackFault, PlayerError};
pub use handle::{OrchestratorHandle, PlayerHandle};
pub use orchestrator::Orchestrator;
pub use player_state::{PlayMode, PlaybackProgress, PlaylistEntry, RepeatMode, SlotState};
pub use recovery::{
    FnRecoveryPolicy, NoRecoveryPolicy, RecoveryContext, RecoveryPolicy, RecoveryResponse,
};
pub use repository::{Chapter, MediaRepository, RepositoryInfo, TransportConfig};
pub use stream::{Stream, StreamSelection};
pub use track::StreamTrack;
