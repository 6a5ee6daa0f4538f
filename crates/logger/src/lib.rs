mod subscriber;

pub use subscriber::{LogHandle, init_tracing, init_tracing_with_level, parse_level};
