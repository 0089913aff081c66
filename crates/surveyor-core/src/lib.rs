//! Session engine, admission control, and storage/gateway ports for Surveyor.
//!
//! This crate defines the "ports" (the `SurveyStore` and `MessagingGateway`
//! traits) that the infrastructure layer implements, plus the components
//! that only depend on those ports: the rate limiter, the per-pair session
//! state machine, the broadcast dispatcher, and the cleanup scheduler.
//!
//! It depends only on `surveyor-types` -- never on `surveyor-infra` or any
//! filesystem/transport crate.

pub mod broadcast;
pub mod cleanup;
pub mod engine;
pub mod gateway;
pub mod locks;
pub mod ratelimit;
pub mod session;
pub mod store;
pub mod validate;
