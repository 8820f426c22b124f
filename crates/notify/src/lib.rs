//! Notification delivery for training requests.
//!
//! Delivery is best effort and always happens after the workflow write has
//! committed: a failed email never rolls back an approval. Two surfaces are
//! fed from the same composed payloads:
//! - **In-app records** (`Notification`) persisted for the dashboard
//! - **Email** (`mailer`) posted to an outbound webhook relay
//!
//! `transition` composes the fan-out for committed workflow transitions;
//! `generators` produces the scheduled reminder batches (certificate expiry,
//! pending-approval digests).

pub mod generators;
pub mod mailer;
pub mod transition;

pub use generators::{
    certificate_expiry_warnings, pending_approval_digests, CERTIFICATE_WARNING_WINDOW_DAYS,
};
pub use mailer::{Mailer, MailerError, NoopMailer, RecordingMailer, WebhookMailer};
pub use transition::{eligible_approvers, TransitionNotifier};
