//! LeadForge Mail - campaign delivery.
//!
//! Templates use `{{name}}` placeholders filled from lead fields. Each sent
//! email carries a random tracking id inside a hidden pixel so opens can be
//! recorded by the server.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod campaign;
pub mod error;
pub mod sender;
pub mod templates;
pub mod tracking;

pub use campaign::{CampaignRunner, Delivery, SendSummary};
pub use error::{MailError, Result};
pub use sender::{body_hash, LettreMailer, Mailer, OutgoingEmail, SmtpSettings};
pub use templates::{extract_variables, lead_variables, render, render_for_lead, RenderedEmail};
pub use tracking::{generate_tracking_id, tracking_pixel_html, TRACKING_PIXEL_GIF};
