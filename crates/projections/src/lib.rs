//! Read models and projections for the CQRS query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`Projection`] trait for processing committed events into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for catch-up and live delivery with checkpoints
//! - [`AccountsView`], the account read model

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::AccountsView;
