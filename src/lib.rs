pub mod config;

pub mod sender;
pub use sender::{smtp, Sender, Smtp, SmtpConfig};

pub mod domain;
pub use domain::*;

pub mod mailer;
