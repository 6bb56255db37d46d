pub mod comparison;
pub mod debounce;
pub mod playback;

pub use comparison::{ComparisonMember, ComparisonOrchestrator, MemberKind, RecomputeOutcome};
pub use debounce::{DebouncePipeline, RecomputeTicket, Resolution, SettleTimer};
pub use playback::{ChunkOutcome, ChunkTicket, PlaybackEngine, PlaybackState, PlaybackStatus};
