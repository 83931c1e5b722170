pub mod file_sink;
pub mod log_sink;
pub mod memory_sink;

pub use file_sink::FileSink;
pub use log_sink::LogSink;
pub use memory_sink::MemorySink;
