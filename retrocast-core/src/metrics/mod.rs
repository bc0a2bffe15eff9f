//! Small sliding-window primitives used by the hub, the producer loop
//! and the client statistics.

pub mod ring_buffer;
pub mod window_average;

pub use ring_buffer::RingBuffer;
pub use window_average::WindowAverage;
