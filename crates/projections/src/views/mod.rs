//! Read model views for the CQRS query side.

pub mod accounts;

pub use accounts::AccountsView;
