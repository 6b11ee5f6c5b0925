//! AWS client modules for the scrubber
//!
//! This module provides wrappers around AWS SDK clients for:
//! - RDS: Instance restore/modify/delete and snapshot management
//! - error: Classification of SDK errors into [`AwsError`]

pub mod context;
pub mod error;
pub mod rds;

pub use context::AwsContext;
pub use error::{AwsError, classify_aws_error};
pub use rds::{RdsClient, RdsOperations};
