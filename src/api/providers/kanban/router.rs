//! Ticket routing between the gated tracker and alternate backends

use serde::{Deserialize, Serialize};

/// Backend that owns a ticket identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketBackend {
    /// The issue tracker whose review phase gates merging
    Tracker,
    /// A backend not held to the review gate (e.g. local ticket files)
    Alternate,
    /// No backend claims the ticket
    Unknown,
}

/// Decides which backend owns a ticket
pub trait TicketRouter: Send + Sync {
    fn route(&self, ticket_id: &str) -> TicketBackend;
}

/// Routes by the ticket's project prefix (the part before the first `-`).
///
/// Alternate prefixes win over tracker prefixes. An empty tracker prefix list
/// means the tracker owns every ticket that is not alternate.
#[derive(Debug, Clone, Default)]
pub struct PrefixRouter {
    tracker_prefixes: Vec<String>,
    alternate_prefixes: Vec<String>,
}

impl PrefixRouter {
    pub fn new(tracker_prefixes: Vec<String>, alternate_prefixes: Vec<String>) -> Self {
        Self {
            tracker_prefixes,
            alternate_prefixes,
        }
    }
}

impl TicketRouter for PrefixRouter {
    fn route(&self, ticket_id: &str) -> TicketBackend {
        let prefix = match ticket_id.split_once('-') {
            Some((prefix, _)) if !prefix.is_empty() => prefix,
            _ => return TicketBackend::Unknown,
        };

        let matches = |list: &[String]| list.iter().any(|p| p.eq_ignore_ascii_case(prefix));

        if matches(&self.alternate_prefixes) {
            TicketBackend::Alternate
        } else if self.tracker_prefixes.is_empty() || matches(&self.tracker_prefixes) {
            TicketBackend::Tracker
        } else {
            TicketBackend::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> PrefixRouter {
        PrefixRouter::new(
            vec!["PROJ".to_string(), "OPS".to_string()],
            vec!["rig".to_string()],
        )
    }

    #[test]
    fn test_routes_tracker_prefix() {
        assert_eq!(router().route("PROJ-123"), TicketBackend::Tracker);
        assert_eq!(router().route("ops-7"), TicketBackend::Tracker);
    }

    #[test]
    fn test_routes_alternate_prefix() {
        assert_eq!(router().route("rig-80a"), TicketBackend::Alternate);
        assert_eq!(router().route("RIG-1"), TicketBackend::Alternate);
    }

    #[test]
    fn test_unknown_prefix() {
        assert_eq!(router().route("ABC-1"), TicketBackend::Unknown);
        assert_eq!(router().route("nodash"), TicketBackend::Unknown);
        assert_eq!(router().route("-12"), TicketBackend::Unknown);
    }

    #[test]
    fn test_empty_tracker_list_claims_everything_else() {
        let router = PrefixRouter::new(Vec::new(), vec!["rig".to_string()]);
        assert_eq!(router.route("ANY-9"), TicketBackend::Tracker);
        assert_eq!(router.route("rig-9"), TicketBackend::Alternate);
    }
}
