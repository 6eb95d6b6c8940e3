pub mod book;
pub mod message;
pub mod subscriber;

pub use book::{PriceBook, PriceSnapshot};
pub use message::{decode_message, CombinedEnvelope, StreamMessage, TickerEvent};
pub use subscriber::{process_frame, stream_url, ConnectionStatus, FrameOutcome, PriceSubscriber};
