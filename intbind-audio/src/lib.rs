pub mod sink;

pub use sink::{CpalSink, NullSink, ToneBuffer, ToneSink};
