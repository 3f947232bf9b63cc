//! These models represent the objects passed around by the assistant
//!
//! There are a few related formats we need to interact with:
//! - inbound chat messages with their uploaded files, sent from the front-end
//! - ollama chat messages and tool schemas, sent from the assistant to the LLM
//! - streamed deltas and tool calls, sent back from the LLM
//!
//! We convert those into the internal structs as soon as they cross a boundary, so the
//! routing core never looks at raw json.
pub mod attachment;
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
