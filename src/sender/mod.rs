pub mod sender;
pub use sender::{Error, Result, Sender};

pub mod smtp;
pub use smtp::{Smtp, SmtpConfig};
