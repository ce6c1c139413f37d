use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Error;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid pattern")
    })
}

/// Whether the address is syntactically valid: local part, "@", domain with
/// at least one dot and a TLD of two or more letters. Never fails on a
/// malformed string, it just returns false.
pub fn validate_email(address: &str) -> bool {
    email_pattern().is_match(address)
}

/// One address or an ordered list of addresses.
#[derive(Debug, Clone)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::One(address.to_string())
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Recipients::One(address)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addresses: Vec<String>) -> Self {
        Recipients::Many(addresses)
    }
}

impl From<&[&str]> for Recipients {
    fn from(addresses: &[&str]) -> Self {
        Recipients::Many(addresses.iter().map(|a| a.to_string()).collect())
    }
}

/// Validate the recipients and serialize them to the mail client's
/// semicolon-delimited form. A single address is returned as-is; every
/// element of a list must validate.
pub fn format_valid_emails(recipients: &Recipients) -> Result<String, Error> {
    match recipients {
        Recipients::One(address) => {
            if !validate_email(address) {
                return Err(Error::InvalidEmail(address.clone()));
            }
            Ok(address.clone())
        }
        Recipients::Many(addresses) => {
            for address in addresses {
                if !validate_email(address) {
                    return Err(Error::InvalidEmail(address.clone()));
                }
            }
            Ok(addresses.join(";"))
        }
    }
}

/// A fully validated message, ready for the mail client.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub sender: String,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub body: String,
    /// Absolute paths, each verified to exist.
    pub attachments: Vec<PathBuf>,
}

/// The desktop mail client capability. One concrete implementation per
/// supported platform; tests inject their own.
pub trait MailClient {
    /// Compose and transmit the message. No retry; a transport failure
    /// propagates to the caller.
    fn send(&self, mail: &OutgoingMail) -> Result<(), Error>;
}

/// Validate, compose and send a message through the given mail client.
///
/// The sender must be a single valid address; receiver, cc and bcc accept
/// one address or a list. Every attachment is resolved to an absolute path
/// first, and the first missing file aborts the whole send with
/// [`Error::AttachmentMissing`].
#[allow(clippy::too_many_arguments)]
pub fn send_mail(
    client: &dyn MailClient,
    sender: &str,
    receiver: &Recipients,
    subject: &str,
    body: &str,
    attachments: &[PathBuf],
    cc: Option<&Recipients>,
    bcc: Option<&Recipients>,
) -> Result<(), Error> {
    if !validate_email(sender) {
        return Err(Error::InvalidEmail(sender.to_string()));
    }
    let to = format_valid_emails(receiver)?;
    let cc = cc.map(format_valid_emails).transpose()?;
    let bcc = bcc.map(format_valid_emails).transpose()?;

    let mut resolved = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let absolute = std::path::absolute(attachment)?;
        if !absolute.exists() {
            return Err(Error::AttachmentMissing(attachment.clone()));
        }
        resolved.push(absolute);
    }

    let mail = OutgoingMail {
        sender: sender.to_string(),
        to,
        cc,
        bcc,
        subject: subject.to_string(),
        body: body.to_string(),
        attachments: resolved,
    };
    client.send(&mail)?;
    log::info!("email sent: {subject}");
    Ok(())
}

/// Outlook driven over COM, the Windows implementation of [`MailClient`].
#[cfg(windows)]
pub struct OutlookClient;

#[cfg(windows)]
impl MailClient for OutlookClient {
    fn send(&self, mail: &OutgoingMail) -> Result<(), Error> {
        let script = outlook_script(mail);
        let output = std::process::Command::new("powershell.exe")
            .args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .output()
            .map_err(|e| Error::Mail(e.to_string()))?;
        if !output.status.success() {
            return Err(Error::Mail(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(windows)]
fn outlook_script(mail: &OutgoingMail) -> String {
    fn quoted(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    let mut script = String::from(
        "$outlook = New-Object -ComObject Outlook.Application\n$mail = $outlook.CreateItem(0)\n",
    );
    script.push_str(&format!(
        "$mail.SentOnBehalfOfName = {}\n",
        quoted(&mail.sender)
    ));
    script.push_str(&format!("$mail.To = {}\n", quoted(&mail.to)));
    if let Some(cc) = &mail.cc {
        script.push_str(&format!("$mail.CC = {}\n", quoted(cc)));
    }
    if let Some(bcc) = &mail.bcc {
        script.push_str(&format!("$mail.BCC = {}\n", quoted(bcc)));
    }
    script.push_str(&format!("$mail.Subject = {}\n", quoted(&mail.subject)));
    script.push_str(&format!("$mail.Body = {}\n", quoted(&mail.body)));
    for attachment in &mail.attachments {
        script.push_str(&format!(
            "$null = $mail.Attachments.Add({})\n",
            quoted(&attachment.display().to_string())
        ));
    }
    script.push_str("$mail.Send()\n");
    script
}
