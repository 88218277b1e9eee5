//! The caller-facing logging sink (§6), distinct from the crate's own internal
//! `tracing` instrumentation in [`crate::pipeline`].

/// The exact shape the host plugin runtime is expected to supply: a single
/// `info` call for the progress messages enumerated in §6.
pub trait Logger {
    fn info(&self, message: &str);
}

/// A minimal default [`Logger`] that writes to standard error, for callers (and
/// this crate's own tests/examples) with no richer sink available.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn info(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLogger {
        messages: RefCell<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn info(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn stderr_logger_does_not_panic() {
        StderrLogger.info("starts reading from /tmp/t.qvd");
    }

    #[test]
    fn a_custom_logger_receives_the_exact_message() {
        let logger = RecordingLogger::default();
        logger.info("Total number of records: 3");
        assert_eq!(logger.messages.borrow().as_slice(), ["Total number of records: 3"]);
    }
}
