//! Output-format decision logic and the transcoding seam.
//!
//! This module owns everything between "the asset exists and is not cached"
//! and "bytes go out": client capability parsing, format negotiation, named
//! optimization profiles, and the transcoder the resolver hands specs to.

pub mod accept;
pub mod negotiate;
pub mod profiles;
pub mod transcode;

pub use accept::ClientSupport;
pub use negotiate::{negotiate_auto, Negotiation};
pub use profiles::{ProfileError, ProfileStore, ResolvedProfile};
pub use transcode::{EngineStats, ImageTranscoder, Transcoder, TranscodeError, TranscodeSpec};
