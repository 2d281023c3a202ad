mod logging;
pub use logging::{init_file_logger, init_stdout_logger, FileLogger, StdoutLogger};
