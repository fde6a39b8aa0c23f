//! Crowdwatch - client-side orchestration for crowd-risk monitoring.
//!
//! # Overview
//!
//! Crowdwatch turns a raw video-analysis result and a stream of GPS fixes
//! into actionable, time-ordered safety signals for two consumers: an
//! uploader ("user" role) and a monitoring authority ("police" role).
//!
//! Three independent activities make up the core:
//!
//! - **Analysis**: submit a media clip to the remote analysis service and
//!   reduce its per-window loss sequence into a classified risk report.
//! - **Alerts**: poll the external alert store on a fixed cadence and drive
//!   the one-way NEW → ACKNOWLEDGED transition with a single-flight guard.
//! - **Location sharing**: a permission-gated state machine that watches
//!   GPS and continuously publishes the latest fix to the store.
//!
//! The activities never share mutable state; they compose only through the
//! external store. The video-analysis model, alert/location persistence,
//! and credential storage are all external collaborators reached through
//! request/response HTTP.
//!
//! # Modules
//!
//! - [`model`]: Risk classification and the data types shared with the store
//! - [`config`]: Environment-driven configuration with documented defaults
//! - [`error`]: Typed error taxonomy, one type per activity
//! - [`client`]: HTTP client for the analysis service and alert/location store
//! - [`analysis`]: Analysis request assembly and report reduction
//! - [`alerts`]: Alert polling and acknowledgment
//! - [`location`]: The live-location-sharing session state machine
//! - [`context`]: Explicit session/theme context and role gating

pub mod alerts;
pub mod analysis;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod location;
pub mod model;
