pub mod client;
pub mod error;
pub mod payload;
pub mod types;

pub use client::{
    DEFAULT_CAUSE, DEFAULT_RUN_LIMIT, DbtCloudClient, FromResponse, JobId, RunApi, RunId,
};
pub use error::{CloudError, ParseError, RunError, UnknownStatusCode};
pub use payload::Payload;
pub use types::{
    DerivedState, Job, RequestStatus, RunStatus, RunStatusList, StatusLabel, TIMEOUT_STATUS_CODE,
    derive_state,
};
