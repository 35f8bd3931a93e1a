//! Piece hashing module
//!
//! File enumeration, piece layout, bounded admission and the concurrent
//! SHA-1 hashing engine shared by torrent creation and hash-checking.

pub mod files;
pub mod hasher;
pub mod layout;
pub mod piece;
pub mod queue;
pub mod relay;

pub use files::{enumerate, FileEntry, FileSource};
pub use hasher::{
    round_percent, EngineState, HashEvent, HashEvents, HashOptions, HashResult, Hasher, HasherControl, Progress,
    DEFAULT_CHUNK_SIZE, DEFAULT_PIECE_LENGTH, MAX_FILES_OPENED,
};
pub use layout::{map_pieces, FileTask, PieceLayout, Segment};
pub use piece::{sha1_digest, PieceBuffer, PieceTable};
pub use queue::{Capacity, Limiter, Ticket};
pub use relay::OrderedRelay;
