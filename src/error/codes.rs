/// Error code registry for coloc-dataset
///
/// Error codes are organized by pipeline stage:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Input and classification errors
/// - 3000-3999: Aggregation errors
/// - 4000-4999: Output routing errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;

    // Input errors (2000-2999)
    pub const INPUT_IO_ERROR: u16 = 2001;
    pub const INPUT_TOLERANCE_EXCEEDED: u16 = 2003;

    // Aggregation errors (3000-3999)
    pub const AGGREGATION_COUNTER_OVERFLOW: u16 = 3001;

    // Routing errors (4000-4999)
    pub const ROUTING_DESTINATION_UNAVAILABLE: u16 = 4001;
    pub const ROUTING_COMMIT_FAILED: u16 = 4002;

    // Other errors (9000-9999)
    pub const WORKER_FAILED: u16 = 9001;
    pub const JOB_ABORTED: u16 = 9002;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "Generic configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",
        ErrorCode::INPUT_IO_ERROR => "Input file could not be read",
        ErrorCode::INPUT_TOLERANCE_EXCEEDED => "Too many malformed input lines",
        ErrorCode::AGGREGATION_COUNTER_OVERFLOW => "Aggregated count exceeded u64 range",
        ErrorCode::ROUTING_DESTINATION_UNAVAILABLE => "Output destination could not be written",
        ErrorCode::ROUTING_COMMIT_FAILED => "Staged output could not be committed",
        ErrorCode::WORKER_FAILED => "Worker task panicked or was cancelled",
        ErrorCode::JOB_ABORTED => "Job aborted after a failure in another worker",
        _ => "Unknown error",
    }
}
