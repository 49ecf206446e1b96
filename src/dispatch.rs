//! Mail dispatch through the local Mail client.
//!
//! Delivery drives Mail.app over `osascript`, spawned with
//! `tokio::process::Command`. Subject and body are user-controlled (article
//! titles flow into them), so both are escaped against AppleScript's
//! string-literal syntax: backslashes first, then double quotes. Naive
//! quote-only escaping lets a title containing `\"` break out of the literal.
//!
//! A run performs two sends: the primary delivery with the deliverable
//! attached, then a confirmation notice without an attachment. A failed
//! confirmation must never roll back or re-trigger the primary delivery; the
//! caller treats it as log-and-continue.

use std::error::Error;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// Escape a string for inclusion in an AppleScript double-quoted literal.
///
/// Backslashes must be doubled before quotes are escaped, otherwise an input
/// ending in `\` turns the closing quote into an escaped one.
pub fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the AppleScript source for one outgoing message.
pub fn build_mail_script(
    recipient: &str,
    subject: &str,
    body: &str,
    attachment: Option<&Path>,
) -> String {
    let mut script = format!(
        "tell application \"Mail\"\n\
         set msg to make new outgoing message with properties {{subject:\"{}\", content:\"{}\", visible:false}}\n\
         tell msg to make new to recipient at end of to recipients with properties {{address:\"{}\"}}\n",
        escape_applescript(subject),
        escape_applescript(body),
        escape_applescript(recipient),
    );
    if let Some(path) = attachment {
        script.push_str(&format!(
            "tell content of msg to make new attachment with properties {{file name:POSIX file \"{}\"}} at after the last paragraph\n",
            escape_applescript(&path.to_string_lossy()),
        ));
    }
    script.push_str("send msg\nend tell");
    script
}

/// Send one message through the local mail client.
///
/// # Arguments
///
/// * `recipient` - Destination address
/// * `subject` / `body` - Message text; escaped before templating
/// * `attachment` - Optional file to attach
///
/// # Errors
///
/// Fails when `osascript` cannot be spawned or exits non-zero; the error
/// carries the script's stderr.
#[instrument(level = "info", skip(subject, body, attachment), fields(%recipient, attachment = ?attachment))]
pub async fn send(
    recipient: &str,
    subject: &str,
    body: &str,
    attachment: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let script = build_mail_script(recipient, subject, body, attachment);
    let output = Command::new("osascript").arg("-e").arg(&script).output().await?;

    if output.status.success() {
        info!("Mail handed to local client");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = ?output.status.code(), stderr = %stderr.trim(), "osascript failed");
        Err(format!(
            "mail dispatch failed (status {:?}): {}",
            output.status.code(),
            stderr.trim()
        )
        .into())
    }
}
