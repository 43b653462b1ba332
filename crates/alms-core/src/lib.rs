//! Core types and the donation workflow for Alms.
//!
//! This crate is free of HTTP and database dependencies. It
//! holds the entity model, the authorization gate, the workflow engine and
//! the notification dispatcher; storage backends implement
//! [`store::DonationStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod application;
pub mod authz;
pub mod donation;
pub mod engine;
pub mod error;
pub mod id;
pub mod identity;
pub mod message;
pub mod messaging;
pub mod notification;
pub mod notify;
pub mod offer;
pub mod review;
pub mod session;
pub mod store;
pub mod workflow;

pub use engine::Engine;
pub use error::{Error, Result};
