//! Bot command surface.
//!
//! Exposes the subscription commands over HTTP. Each transport registers an
//! [`Adapter`] on its own path; the [`Server`] hands the parsed
//! [`subscriptions::Command`] to a [`subscriptions::CommandExecutor`] and
//! returns the plain-text reply through the same adapter.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP routing, body limits, and content negotiation live
//! here. The [`subscriptions`] crate sees only [`subscriptions::Command`] values.
//!
//! ## Routes
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /healthz` | Liveness probe, replies `ok` |
//! | `POST <path>` | One per registered adapter |

mod adapter;
mod server;

pub use adapter::{Adapter, AdapterError, JsonAdapter, MAX_BODY_BYTES};
pub use server::{Server, ServerError};
