//! RFC 5424 message formatting with RFC 6587 octet-counting framing.

use chrono::{SecondsFormat, TimeZone, Utc};

const NIL: &str = "-";

/// Fields of one syslog line.
#[derive(Debug, Clone, Copy)]
pub struct SyslogLine<'a> {
    pub priority: i32,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub hostname: &'a str,
    pub app_name: &'a str,
    pub source_type: &'a str,
    pub source_instance: &'a str,
    pub message: &'a [u8],
}

fn or_nil(field: &str) -> &str {
    if field.is_empty() {
        NIL
    } else {
        field
    }
}

fn trim_line_ending(message: &[u8]) -> &[u8] {
    let mut end = message.len();
    while end > 0 && matches!(message[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &message[..end]
}

impl SyslogLine<'_> {
    /// `<PRI>1 TIMESTAMP HOSTNAME APP-NAME [SOURCE/INSTANCE] - - MSG\n`
    pub fn render(&self) -> String {
        let timestamp =
            Utc.timestamp_nanos(self.timestamp).to_rfc3339_opts(SecondsFormat::Micros, true);
        let proc_id = format!("[{}/{}]", self.source_type.to_uppercase(), self.source_instance);
        let message = String::from_utf8_lossy(trim_line_ending(self.message));
        format!(
            "<{}>1 {} {} {} {} - - {}\n",
            self.priority,
            timestamp,
            or_nil(self.hostname),
            or_nil(self.app_name),
            proc_id,
            message
        )
    }

    /// Octet-counted frame: `"<len> <msg>"`.
    pub fn frame(&self) -> Vec<u8> {
        frame(&self.render())
    }
}

/// Prefix a rendered message with its byte length.
pub fn frame(rendered: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(rendered.len() + 8);
    out.extend_from_slice(rendered.len().to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(rendered.as_bytes());
    out
}
