//! Error types for the crate.
//!
//! [`GitError`] covers object parsing, pack encoding/decoding, index handling,
//! caching, and streaming. [`EngineError`] covers the engine layer built on
//! top of it: blob store, repository operations, the invocation dispatcher,
//! the VFS, the PR check engine and the HTTP control plane. Both integrate
//! with `thiserror` for `Display` impls and error source chaining.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the Git-Internal library.
///
/// - Used across object parsing, pack encode/decode, index, caching and streams.
/// - Implements `std::error::Error` via `thiserror`.
pub enum GitError {
    /// Invalid or unsupported git object type name.
    #[error("The `{0}` is not a valid git object type.")]
    InvalidObjectType(String),

    /// Malformed or unsupported blob object encoding.
    #[error("The `{0}` is not a valid git blob object.")]
    InvalidBlobObject(String),

    /// Malformed tree object.
    #[error("Not a valid git tree object.")]
    InvalidTreeObject,

    /// Invalid tree entry (mode/name/hash).
    #[error("The `{0}` is not a valid git tree item.")]
    InvalidTreeItem(String),

    /// Tree contains no entries.
    #[error("`{0}`.")]
    EmptyTreeItems(String),

    /// Invalid commit signature type.
    #[error("The `{0}` is not a valid git commit signature.")]
    InvalidSignatureType(String),

    /// Malformed commit object.
    #[error("Not a valid git commit object.")]
    InvalidCommitObject,

    /// Commit parse or validation failed.
    #[error("Invalid Commit: {0}")]
    InvalidCommit(String),

    /// Malformed tag object.
    #[error("Not a valid git tag object: {0}")]
    InvalidTagObject(String),

    /// Malformed note object.
    #[error("Not a valid git note object: {0}")]
    InvalidNoteObject(String),

    /// Malformed or unsupported index (.idx) file.
    #[error("The `{0}` is not a valid idx file.")]
    InvalidIdxFile(String),

    /// Malformed or unsupported pack file.
    #[error("The `{0}` is not a valid pack file.")]
    InvalidPackFile(String),

    /// Invalid pack header magic or version.
    #[error("The `{0}` is not a valid pack header.")]
    InvalidPackHeader(String),

    /// Malformed or unsupported git index file.
    #[error("The `{0}` is not a valid index file.")]
    InvalidIndexFile(String),

    /// Invalid git index header.
    #[error("The `{0}` is not a valid index header.")]
    InvalidIndexHeader(String),

    /// Invalid CLI or function argument.
    #[error("Argument parse failed: {0}")]
    InvalidArgument(String),

    /// I/O error from underlying reader or writer.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// Invalid SHA1 hash formatting or value.
    #[error("The {0} is not a valid Hash value ")]
    InvalidHashValue(String),

    /// Delta object reconstruction error.
    #[error("Delta Object Error Info:{0}")]
    DeltaObjectError(String),

    /// Object not fully populated for packing.
    #[error("The object to be packed is incomplete ,{0}")]
    UnCompletedPackObject(String),

    /// Invalid decoded object info.
    #[error("Error decode in the Object ,info:{0}")]
    InvalidObjectInfo(String),

    /// Hash not found in current file context.
    #[error("Cannot find Hash value: {0} from current file")]
    NotFoundHashValue(String),

    /// Failed to encode object to bytes.
    #[error("Can't encode the object which id [{0}] to bytes")]
    EncodeObjectError(String),

    /// Text encoding or UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    ConversionError(String),

    /// Invalid path when locating parent tree.
    #[error("Can't find parent tree by path: {0}")]
    InvalidPathError(String),

    /// Failed to encode pack entries.
    #[error("Can't encode entries to pack: {0}")]
    PackEncodeError(String),

    /// Object missing from caches or storage.
    #[error("Can't find specific object: {0}")]
    ObjectNotFound(String),

    /// Repository not found.
    #[error("Repository not found")]
    RepoNotFound,

    /// Unauthorized access.
    #[error("UnAuthorized: {0}")]
    UnAuthorized(String),

    /// Network communication error.
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// Generic custom error for miscellaneous failures.
    #[error("{0}")]
    CustomError(String),
}

/// Unified error enumeration for the engine-level subsystems: blob store,
/// repository operations, the invocation dispatcher, the VFS, the PR check
/// engine and the HTTP control plane.
///
/// Kept alongside [`GitError`] rather than merged into it: object-level parse
/// failures keep using `GitError` unchanged, everything at the engine layer
/// uses `EngineError`, and [`From<GitError>`] bridges the two at module
/// boundaries.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Repo/commit/tree/blob/ref/file/invocation/PR absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A segmented path walk hit a missing or wrong-kind segment.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Branch/PR create collision.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Invocation status transition disallowed.
    #[error("invalid status transition: cannot go from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Malformed arguments JSON, duplicate tree entries, invalid check name, etc.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Blob backend I/O failure.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Stage function raised; message carries the stringified error (and
    /// stack, if any) that was recorded as `error_message` on the invocation.
    #[error("workflow execution error: {0}")]
    WorkflowExecutionError(String),

    /// Merge-gate failure, with a human-readable reason.
    #[error("pull request not mergeable: {0}")]
    PullRequestNotMergeable(String),

    /// Control plane unreachable from a worker; transient, caller should retry.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Object-model-level failure bridged in from [`GitError`].
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        EngineError::NotFound(what.to_string())
    }

    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        EngineError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
