//! Runtime - turns inbound chat messages into replies.
//!
//! - [`directive`]: classifies completion text
//! - [`delivery`]: verified image delivery state machine
//! - [`dispatcher`]: per-message pipeline
//! - [`handler`]: stream-driven message loop

mod attachments;
pub mod delivery;
pub mod directive;
pub mod dispatcher;
pub mod handler;

pub use attachments::AttachmentFetcher;
pub use delivery::{
    DEFAULT_MAX_ATTEMPTS, DeliveryAttempt, DeliveryOutcome, DeliveryReport, DeliveryRequest,
    ImageDeliveryMachine, LiveMessage, Transition, VerificationVerdict, decide,
};
pub use directive::{Directive, DirectiveParser};
pub use dispatcher::{ChatDispatcher, DispatchOutcome, TROUBLE_THINKING_NOTICE};
pub use handler::{run_message_loop, spawn_message_loop};
