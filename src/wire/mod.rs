//! Wire protocol: framing and message bodies
//!
//! The codec is symmetric: clients encode requests and decode responses,
//! while a server (or the in-process one in [`crate::net::mem`]) decodes
//! requests and encodes responses. `decode(encode(x)) == x` holds for
//! every message and every value variant.

pub mod codec;
pub mod frame;

pub use codec::{
    BatchGetRequest, BatchResponse, GetRequest, KeyRequest, PutRequest, Response,
    FLAG_CREATE_ONLY, FLAG_EXPECT_GENERATION, RC_BIN_EXISTS, RC_GENERATION, RC_KEY_EXISTS,
    RC_NOT_FOUND, RC_OK, RC_PARAMETER, RC_UNKNOWN,
};
pub use frame::{MsgKind, FRAME_MAGIC, HEADER_LEN, TRAILER_LEN};
