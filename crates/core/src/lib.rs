//! Core types, validation, and store contracts for the web tracker.

pub mod application;
pub mod auth;
pub mod deadline;
pub mod enrichment;
pub mod error;
pub mod event;
pub mod limits;
pub mod stats;
pub mod store;

pub use application::{Application, ApplicationStatus, CreateApplication, UpdateApplication};
pub use auth::ApiKey;
pub use deadline::Deadline;
pub use enrichment::Enricher;
pub use error::{Error, ErrorCode, Result};
pub use event::{ClientHints, CustomParameters, TimeRange, TrackEventInput, TrackingEvent};
pub use stats::{GroupBy, Statistics, StatsQuery, TimeBucket, TopItem};
pub use store::{ApplicationStore, EventStore, KeyRotation};
