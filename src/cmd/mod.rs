//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                   |
//! |-----------------|-----------------------------------------------------|
//! | `github`        | `Github`                                           |
//! | `s3`            | `S3`                                               |
//! | `pack`          | `Pack`                                             |
//! | `unpack`        | `Unpack`                                           |
//! | `staging`       | `ClearStaging`                                     |
//! | `status`        | `Status`                                           |
//! | `config`        | `Config`                                           |
//!
//! `job` holds the flags and orchestrator wiring the four job commands share.

pub mod config;
pub mod github;
pub mod job;
pub mod pack;
pub mod s3;
pub mod staging;
pub mod status;
pub mod unpack;

pub use config::cmd_config;
pub use github::cmd_github;
pub use pack::cmd_pack;
pub use s3::cmd_s3;
pub use staging::cmd_clear_staging;
pub use status::cmd_status;
pub use unpack::cmd_unpack;
