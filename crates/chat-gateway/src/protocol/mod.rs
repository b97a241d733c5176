//! Gateway protocol definitions
//!
//! The raw-TCP frame codec, operation codes, and the JSON bodies exchanged
//! with clients and with the delivery tier.

mod frame;
mod messages;
mod opcodes;

pub use frame::{
    max_encodable_frame, pack, unpack, FrameCodec, FrameError, HEADER_SIZE, PING_PAYLOAD,
    VERSION_TAG,
};
pub use messages::{
    JoinRequest, Msg, PushMsgRequest, PushRoomMsgRequest, RoomCountBody, RoomInfoBody,
    SuccessReply, TcpMessage,
};
pub use opcodes::{OpCode, MSG_VERSION, SUCCESS_REPLY_CODE, SUCCESS_REPLY_MSG};
