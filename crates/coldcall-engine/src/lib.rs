//! The Coldcall engine: the conversation state machine and the call
//! orchestrator, connected to the outside world through the
//! [`textgen::TextGenerator`] and [`gateway::TelephonyGateway`] seams.
//!
//! Nothing in this crate speaks HTTP; the webhook boundary lives in
//! `coldcall-server` and calls into the types here.

#![allow(async_fn_in_trait)]

pub mod conversation;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod orchestrator;
pub mod textgen;

pub use error::{Error, Result};
