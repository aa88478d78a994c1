// mailer, a Rust library for composing and sending emails.
// Copyright (C) 2022  soywod <clement.douin@posteo.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Command-line utility composing and sending one email over SMTP.

use clap::Parser;
use log::debug;
use std::{error::Error, process};

use mailer::{
    config::{self, Credentials},
    mailer::{self as pipeline, Draft},
};

/// Compose and send an email over SMTP
#[derive(Parser, Debug)]
#[command(name = "mailer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SMTP server host
    #[arg(long, default_value = "")]
    host: String,

    /// SMTP server port
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// SMTP login
    #[arg(long, default_value = "")]
    user: String,

    /// SMTP password
    #[arg(long, default_value = "")]
    pass: String,

    /// Sender address, `Name <addr>` or bare
    #[arg(long, default_value = "")]
    from: String,

    /// Recipient address
    #[arg(long, default_value = "")]
    to: String,

    /// Comma-separated carbon copy addresses
    #[arg(long, default_value = "")]
    cc: String,

    /// Comma-separated blind carbon copy addresses
    #[arg(long, default_value = "")]
    bcc: String,

    #[arg(long, default_value = "")]
    subject: String,

    /// Body of the email, sent as HTML when it contains an html tag
    #[arg(long, default_value = "")]
    body: String,

    /// Comma-separated paths of files to attach
    #[arg(long, default_value = "")]
    attach: String,

    /// Path of a raw email to send as is
    #[arg(long)]
    eml: Option<String>,

    /// Path of the JSON config file
    #[arg(long)]
    config: Option<String>,

    /// Log what is going on
    #[arg(short, long)]
    verbose: bool,
}

/// Splits a comma-separated list and trims its items. Blank items
/// are kept so that they fail validation later on.
fn split_list(list: &str) -> Vec<String> {
    if list.is_empty() {
        return vec![];
    }

    list.split(',').map(|item| item.trim().to_owned()).collect()
}

fn run(cli: Cli) -> pipeline::Result<()> {
    let explicit = Credentials {
        host: cli.host,
        port: cli.port,
        username: cli.user,
        password: cli.pass,
        from: cli.from,
    };
    let credentials = config::resolve(explicit, cli.config.as_deref())?;
    debug!("resolved credentials: {:?}", credentials);

    match cli.eml {
        Some(path) => {
            pipeline::send_eml(&credentials, path)?;
        }
        None => {
            let draft = Draft {
                to: cli.to,
                cc: split_list(&cli.cc),
                bcc: split_list(&cli.bcc),
                subject: cli.subject,
                body: cli.body,
                attachments: split_list(&cli.attach),
            };
            pipeline::send_draft(&credentials, &draft)?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        let mut source = err.source();
        while let Some(err) = source {
            eprintln!("  caused by: {}", err);
            source = err.source();
        }
        process::exit(1);
    }

    println!("email sent");
}
