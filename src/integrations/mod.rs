// src/integrations/mod.rs
//
// External Integrations Module

pub mod sendgrid;

pub use sendgrid::client::{Content, EmailAddress, Mail, Personalization, SendGridClient};
