pub mod codec;
pub mod errors;
pub mod id;
pub mod protocol;
pub mod types;

pub use codec::{decode_frame, encode_frame, frame_len, pack_rgb565, unpack_rgb565, Rgb24};
pub use errors::{ConfigError, DropError, FrameError};
pub use id::ConnectionId;
pub use protocol::{ControlMessage, DropColor, DropEvent};
pub use types::{PairId, PairStatus, Role, Slot};

pub type Result<T> = std::result::Result<T, DropError>;
