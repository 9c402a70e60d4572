/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Node identifier inside a workflow graph (the JSON object key).
pub type NodeId = String;

/// Identifier assigned by the execution engine to a submitted run.
/// Reused verbatim as the job id.
pub type ExecutionId = String;
