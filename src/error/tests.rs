//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("tick interval cannot be 0");
        assert_eq!(
            err.to_string(),
            "configuration error: tick interval cannot be 0"
        );
    }

    #[test]
    fn test_storage_error_not_found() {
        let err = StorageError::not_found("spectrum", "12");
        assert_eq!(err.to_string(), "not found: spectrum with id '12'");
    }

    #[test]
    fn test_storage_error_conversion() {
        let storage_err = StorageError::Database("connection failed".to_string());
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_ledger_error_is_fatal() {
        let err: Error = LedgerError::Open("disk full".to_string()).into();
        assert!(matches!(err, Error::Ledger(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ledger_error_insert_display() {
        let err = LedgerError::Insert {
            checksum: "abc".to_string(),
            reason: "readonly database".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to record checksum 'abc': readonly database"
        );
    }

    #[test]
    fn test_watcher_error_conversion() {
        let watch_err = WatcherError::WatchFailed {
            path: "/tmp/spectra".to_string(),
            reason: "permission denied".to_string(),
        };
        let err: Error = watch_err.into();
        assert!(matches!(err, Error::Watcher(_)));
    }

    #[test]
    fn test_watcher_error_invalid_filter() {
        let err = WatcherError::InvalidFilter {
            pattern: "[".to_string(),
            reason: "unclosed class".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid filter pattern '[': unclosed class"
        );
    }

    #[test]
    fn test_parse_error_display_and_line() {
        let err = ParseError::InvalidNumber {
            line: 7,
            field: "live time",
            value: "abc".to_string(),
        };
        assert_eq!(err.line(), 7);
        assert_eq!(
            err.to_string(),
            "line 7: invalid number 'abc' for live time"
        );

        let err: Error = err.into();
        assert!(matches!(err, Error::Parse(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_parse_error_datetime_display() {
        let err = ParseError::InvalidDateTime {
            line: 3,
            field: "sample time",
            value: "yesterday".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "line 3: invalid date-time 'yesterday' for sample time"
        );
    }

    #[test]
    fn test_generator_error_exit_status() {
        let err = GeneratorError::ExitStatus {
            program: "report".to_string(),
            status: "exit status: 2".to_string(),
            stderr: "no such template".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'report' exited with exit status: 2: no such template"
        );
    }

    #[test]
    fn test_generator_error_timed_out() {
        let err = GeneratorError::TimedOut {
            program: "report".to_string(),
            seconds: 1.5,
        };
        assert_eq!(err.to_string(), "'report' timed out after 1.5s");
    }

    #[test]
    fn test_generator_error_conversion() {
        let err: Error = GeneratorError::MissingOutput {
            path: "/tmp/out.rpt".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Generator(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_internal() {
        let err = Error::internal("tick task panicked");
        assert_eq!(err.to_string(), "internal error: tick task panicked");
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<i32> {
            Err(Error::config("inner error"))
        }

        fn outer() -> Result<i32> {
            let _ = inner()?;
            Ok(0)
        }

        let result = outer();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "configuration error: inner error"
        );
    }
}
