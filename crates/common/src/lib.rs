//! Identifier types shared across the account event-sourcing workspace.

mod types;

pub use types::{AggregateId, ParseAggregateIdError};
