use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::DimmId;

/// The memory allocation request is malformed or contradicts itself or the
/// inventory. Not retryable without the caller changing its input.
#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum BadRequestError {
    #[error("Only one of the volatile, persistent or storage capacities can be set to 'remaining', but {count} were")]
    TooManyRemaining { count: usize },

    #[error("A request can target either a list of DIMMs or a list of sockets, but not both")]
    DimmsAndSocketsSpecified,

    #[error("'persistent' and 'persistent1' sizes cannot be used together")]
    ConflictingPersistentSizes,

    #[error("A second persistent extent requires a first persistent extent")]
    SecondExtentWithoutFirst,

    #[error("At most two persistent extents can be requested, but {count} were")]
    TooManyPersistentExtents { count: usize },

    #[error("Storage capacity can only be set to 'remaining', got '{value}'")]
    InvalidStorageCapacity { value: String },

    #[error("A volatile, persistent or storage capacity must be requested")]
    NoCapacityRequested,

    #[error("Reserving a DIMM on a single-DIMM request is only valid together with storage capacity 'remaining'")]
    ReserveDimmWithOtherProperties,

    #[error("No manageable DIMMs were found")]
    NoManageableDimms,

    #[error("DIMM '{dimm_id}' is not a manageable DIMM")]
    InvalidDimm { dimm_id: DimmId },

    #[error("DIMM '{dimm_id}' is requested more than once")]
    DuplicateDimm { dimm_id: DimmId },

    #[error("Socket {socket_id} does not exist or has no manageable DIMMs")]
    InvalidSocket { socket_id: u16 },

    #[error("DIMM '{dimm_id}' belongs to pool '{pool_id}', which still contains namespaces")]
    NamespacesExist { dimm_id: DimmId, pool_id: String },

    #[error("Requested {kind} capacity of {requested} bytes exceeds the {available} bytes available")]
    CapacityExceedsAvailable {
        kind: &'static str,
        requested: u64,
        available: u64,
    },

    #[error("Mirrored persistent memory requires an even number of DIMMs on socket {socket_id}, found {count}")]
    MirrorRequiresEvenDimms { socket_id: u16, count: usize },

    #[error("Persistent settings '{value}' are invalid")]
    InvalidPersistentSettings { value: String },

    #[error("Size '{value}' is invalid")]
    InvalidSize { value: String },

    #[error("The configuration goals of all DIMMs on socket {socket_id} must be deleted together")]
    PartialSocketDelete { socket_id: u16 },

    #[error("The requested DIMM(s) are not configured")]
    NotConfigured,
}

/// The platform does not provide a capability the request depends on.
#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum UnsupportedError {
    #[error("The platform does not support memory mode '{mode}'")]
    MemoryMode { mode: String },

    #[error("Interleave format '{format}' is not supported by the platform")]
    InterleaveFormat { format: String },

    #[error("The platform supports {max} persistent interleave set(s) per DIMM, but {requested} were requested")]
    TooManyInterleaveSets { max: u8, requested: usize },
}

/// A layout produced by the pipeline violates an invariant. Indicates a bug in
/// the layout steps.
#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidLayoutError {
    #[error("DIMM '{dimm_id}' is assigned {assigned} bytes, but only has {raw} bytes")]
    CapacityExceedsRaw {
        dimm_id: DimmId,
        assigned: u64,
        raw: u64,
    },

    #[error("DIMM '{dimm_id}' has {unaccounted} bytes that are not assigned to any region")]
    CapacityUnaccounted { dimm_id: DimmId, unaccounted: u64 },

    #[error("Requested DIMM '{dimm_id}' is missing from the layout")]
    MissingDimm { dimm_id: DimmId },

    #[error("DIMM '{dimm_id}' has an invalid interleave index {index}")]
    InterleaveIndex { dimm_id: DimmId, index: u8 },

    #[error("Mirrored region of interleave set {set_id} on DIMM '{dimm_id}' has no valid partner")]
    MirrorPair { dimm_id: DimmId, set_id: u32 },

    #[error("Members of interleave set {set_id} do not match")]
    SetMemberMismatch { set_id: u32 },
}

/// The device library failed to apply a configuration change to a DIMM.
#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryError {
    #[error("Device library call failed with return code {code}")]
    ReturnCode { code: i32 },

    #[error("Failed to apply the configuration goal on {} DIMM(s), {succeeded} succeeded: {}", .failed.len(), .failed.join(", "))]
    PartialCommit {
        failed: Vec<DimmId>,
        succeeded: usize,
    },
}

impl LibraryError {
    /// Returns the device library return code, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::ReturnCode { code } => Some(*code),
            Self::PartialCommit { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceError {
    #[error("Capacity calculation overflowed")]
    CapacityOverflow,
}

/// User provided files were invalid.
#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Failed to read input file '{path}'")]
    ReadInputFile { path: String },
    #[error("Failed to parse memory allocation request")]
    ParseRequest,
    #[error("Failed to load platform snapshot from '{path}'")]
    LoadPlatformSnapshot { path: String },
    #[error("Failed to parse agent configuration")]
    ParseAgentConfig,
}

#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum PersistenceError {
    #[error("Failed to load goal store from '{path}'")]
    LoadGoalStore { path: String },
    #[error("Failed to write goal store to '{path}'")]
    WriteGoalStore { path: String },
    #[error("Failed to export configuration to '{path}'")]
    ExportConfig { path: String },
    #[error("Failed to import configuration from '{path}'")]
    ImportConfig { path: String },
}

#[derive(Debug, Clone, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Failed to serialize layout")]
    SerializeLayout,
}

/// Each variant of `ErrorKind` corresponds to a different category of error.
/// The categories are intended to be user-meaningful.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The request is malformed or contradictory.
    #[error(transparent)]
    BadRequest(#[from] BadRequestError),

    /// The platform lacks a requested capability.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),

    /// The computed layout violates an invariant.
    #[error(transparent)]
    InvalidLayout(#[from] InvalidLayoutError),

    /// Applying a configuration to a device failed.
    #[error(transparent)]
    Library(#[from] LibraryError),

    /// Computation ran out of a resource.
    #[error(transparent)]
    ResourceExhausted(#[from] ResourceError),

    /// An input file could not be loaded.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// Persisted goal state could not be read or written.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A bug was encountered.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct NvmErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct NvmError(Box<NvmErrorInner>);
impl NvmError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        NvmError(Box::new(NvmErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    pub fn unstructured(self, context: impl Into<Cow<'static, str>>) -> anyhow::Error {
        match self.0.source {
            Some(source) => source.context(self.0.kind).context(context.into()),
            None => anyhow::Error::from(self.0.kind).context(context.into()),
        }
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured NvmError.
    fn structured(self, kind: K) -> Result<T, NvmError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, NvmError> {
        match self {
            Some(t) => Ok(t),
            None => Err(NvmError(Box::new(NvmErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, NvmError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(NvmError(Box::new(NvmErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait NvmResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, NvmError>;

    /// Convert the error into an unstructured error.
    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error>;
}
impl<T> NvmResultExt<T> for Result<T, NvmError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, NvmError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }

    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error> {
        self.map_err(|e| e.unstructured(context))
    }
}

impl Serialize for NvmError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("nvm-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::BadRequest(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Unsupported(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidLayout(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Library(ref e) => state.serialize_field("error", e)?,
            ErrorKind::ResourceExhausted(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Persistence(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for NvmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use serde_yaml::Value;

    use super::*;

    #[test]
    fn test_error_serialize() {
        let e = NvmError(Box::new(NvmErrorInner {
            kind: ErrorKind::BadRequest(BadRequestError::TooManyRemaining { count: 2 }),
            location: Location::caller(),
            source: Some(
                std::fs::read("/non-existant-file")
                    .context("failed to read file")
                    .unwrap_err(),
            ),
            context: Vec::new(),
        }));
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m.len(), 5);
                assert!(matches!(m["error"], Value::Mapping(_)));
                assert_eq!(m["category"], Value::String("bad-request".into()));
                assert!(matches!(m["cause"], Value::String(_)));
                assert_eq!(
                    m["message"],
                    Value::String(
                        "Only one of the volatile, persistent or storage capacities can be set to 'remaining', but 2 were"
                            .into()
                    )
                );
                match m["location"] {
                    Value::String(ref s) => assert!(s.contains("error.rs:")),
                    _ => panic!("location isn't string"),
                }
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_unit_variant_serialize() {
        let e = NvmError::new(BadRequestError::NoManageableDimms);
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m["error"], Value::String("no-manageable-dimms".into()));
                assert_eq!(m["cause"], Value::Null);
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_error_debug() {
        let error = Err::<(), _>(anyhow::anyhow!("z"))
            .context("x\ny")
            .structured(InternalError::Internal("w"))
            .unwrap_err();
        assert_eq!(
            format!("{:?}", error),
            format!(
                "Internal error: w at {}:{}\n\nCaused by:\n    0: x\n       y\n    1: z\n",
                error.0.location.file(),
                error.0.location.line(),
            ),
        );
    }

    #[test]
    fn test_message_context() {
        let error = Err::<(), _>(NvmError::new(LibraryError::ReturnCode { code: 5 }))
            .message("Failed to commit goal")
            .unwrap_err();
        assert_eq!(error.0.context.len(), 1);
        assert_eq!(
            error.kind(),
            &ErrorKind::Library(LibraryError::ReturnCode { code: 5 })
        );
        assert!(format!("{error:?}").contains("Failed to commit goal"));
    }

    #[test]
    fn test_library_error_code() {
        assert_eq!(LibraryError::ReturnCode { code: 5 }.code(), Some(5));
        let partial = LibraryError::PartialCommit {
            failed: vec!["0x0001".into()],
            succeeded: 2,
        };
        assert_eq!(partial.code(), None);
        assert_eq!(
            partial.to_string(),
            "Failed to apply the configuration goal on 1 DIMM(s), 2 succeeded: 0x0001"
        );
    }
}
