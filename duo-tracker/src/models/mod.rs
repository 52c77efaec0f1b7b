//! Domain models
//!
//! - [`battle`]: raw upstream payload shape
//! - [`game`]: canonical match records, sides and duo keys
//! - [`series`]: finalized best-of-7 series
//! - [`rating`]: per-player rating state and stored snapshots

pub mod battle;
pub mod game;
pub mod rating;
pub mod series;

pub use battle::{RawBattle, RawCard, RawClan, RawGameMode, RawParticipant};
pub use game::{Duo, DuoPairKey, MatchRecord, MatchSummary, ParticipantStats, Side, Winner};
pub use rating::{PlayerRating, RatingSnapshot};
pub use series::SeriesRecord;
