// Event records
//
// One record per printer/job state change that made it into the feed.
// Notifications come from the event source with every attribute optional;
// only the ones carrying an uptime, a sequence number and a printer URI
// become records.

use serde::Deserialize;
use url::Url;

/// A decoded notification as delivered by the event source
///
/// Field names follow the IPP attribute names used by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Notification {
    #[serde(default)]
    pub notify_job_id: Option<i32>,

    #[serde(default)]
    pub job_name: Option<String>,

    #[serde(default)]
    pub job_state: Option<i32>,

    #[serde(default)]
    pub printer_state: Option<i32>,

    /// Printer uptime, used as the event timestamp
    #[serde(default)]
    pub printer_up_time: Option<i64>,

    #[serde(default)]
    pub notify_sequence_number: Option<i32>,

    #[serde(default)]
    pub notify_printer_uri: Option<String>,
}

/// One entry of the event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub sequence_number: i32,
    pub printer_state: Option<i32>,
    pub job_id: Option<i32>,
    pub job_state: Option<i32>,
    /// Empty when the notification carried no job name
    pub job_name: String,
    pub link_url: Option<String>,
    pub event_time: i64,
}

impl EventRecord {
    /// Build a record from a notification
    ///
    /// Returns `None` when the uptime, sequence number or printer URI is
    /// missing. Zero state/id values are stored as absent.
    pub fn from_notification(notification: Notification) -> Option<Self> {
        let event_time = notification.printer_up_time?;
        let sequence_number = notification.notify_sequence_number?;
        let printer_uri = notification.notify_printer_uri?;

        Some(Self {
            sequence_number,
            printer_state: present(notification.printer_state),
            job_id: present(notification.notify_job_id),
            job_state: present(notification.job_state),
            job_name: notification.job_name.unwrap_or_default(),
            link_url: Some(link_url(&printer_uri)),
            event_time,
        })
    }
}

/// Zero means "not set" for IPP integer attributes in the feed
pub(crate) fn present(value: Option<i32>) -> Option<i32> {
    value.filter(|v| *v != 0)
}

/// Rewrite a printer URI as an `http` link to the same printer
///
/// `ipp://host/printers/p` becomes `http://host:631/printers/p`: the port
/// is made explicit unless it is the http default. Unparsable URIs are
/// used verbatim.
pub fn link_url(printer_uri: &str) -> String {
    let Ok(uri) = Url::parse(printer_uri) else {
        tracing::debug!(uri = %printer_uri, "Printer URI is not a valid URL, linking verbatim");
        return printer_uri.to_string();
    };

    let Some(host) = uri.host_str().filter(|h| !h.is_empty()) else {
        return printer_uri.to_string();
    };

    let mut link = String::from("http://");

    if !uri.username().is_empty() {
        link.push_str(uri.username());
        if let Some(password) = uri.password() {
            link.push(':');
            link.push_str(password);
        }
        link.push('@');
    }

    link.push_str(host);

    match uri.port().or_else(|| default_port(uri.scheme())) {
        Some(80) | None => {}
        Some(port) => {
            link.push(':');
            link.push_str(&port.to_string());
        }
    }

    link.push_str(uri.path());

    if let Some(query) = uri.query() {
        link.push('?');
        link.push_str(query);
    }

    link
}

/// Default ports for the schemes a printer URI may use
pub(crate) fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        "ipp" | "ipps" => Some(631),
        "lpd" => Some(515),
        "socket" => Some(9100),
        _ => None,
    }
}
