//! Recovers a ticket identifier from a branch name.
//!
//! Branch names are split on `/` and `_` only. `-` is not a boundary because
//! ticket keys carry their own dash (`PROJ-123`, `rig-80a`).
//!
//! The shape test is loose: any `letters-alnum` segment passes, so a plain
//! branch like `feature-abc` is read as a ticket id.

/// Find the rightmost branch segment that looks like a ticket id
pub fn extract_ticket_from_branch(branch: &str) -> Option<String> {
    let bytes = branch.as_bytes();
    let mut end = branch.len();

    for i in (0..bytes.len()).rev() {
        if is_boundary(bytes[i]) {
            let candidate = &branch[i + 1..end];
            if looks_like_ticket(candidate) {
                return Some(candidate.to_string());
            }
            end = i;
        }
    }

    let first = &branch[..end];
    looks_like_ticket(first).then(|| first.to_string())
}

fn is_boundary(b: u8) -> bool {
    b == b'/' || b == b'_'
}

/// `letters-alnum`: at least 3 chars, letters before the dash, letters and
/// digits after it, and no second dash
pub fn looks_like_ticket(s: &str) -> bool {
    if s.len() < 3 {
        return false;
    }

    let Some((prefix, suffix)) = s.split_once('-') else {
        return false;
    };

    !prefix.is_empty()
        && !suffix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && suffix.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_after_slash() {
        assert_eq!(
            extract_ticket_from_branch("feature/PROJ-123").as_deref(),
            Some("PROJ-123")
        );
    }

    #[test]
    fn test_extract_whole_branch() {
        assert_eq!(extract_ticket_from_branch("rig-80a").as_deref(), Some("rig-80a"));
    }

    #[test]
    fn test_extract_leading_segment() {
        assert_eq!(
            extract_ticket_from_branch("PROJ-5/wip").as_deref(),
            Some("PROJ-5")
        );
        assert_eq!(
            extract_ticket_from_branch("OPS-9_cleanup").as_deref(),
            Some("OPS-9")
        );
    }

    #[test]
    fn test_no_candidate() {
        assert_eq!(extract_ticket_from_branch("no_numbers_here"), None);
        assert_eq!(extract_ticket_from_branch("main"), None);
        assert_eq!(extract_ticket_from_branch(""), None);
    }

    #[test]
    fn test_rightmost_candidate_wins() {
        assert_eq!(
            extract_ticket_from_branch("PROJ-1/OPS-2").as_deref(),
            Some("OPS-2")
        );
        assert_eq!(
            extract_ticket_from_branch("user_jdoe/PROJ-77/wip").as_deref(),
            Some("PROJ-77")
        );
        assert_eq!(
            extract_ticket_from_branch("PROJ-9_cleanup").as_deref(),
            Some("PROJ-9")
        );
    }

    #[test]
    fn test_hyphenated_names() {
        // Known false positive of the heuristic
        assert_eq!(
            extract_ticket_from_branch("feature-abc").as_deref(),
            Some("feature-abc")
        );
        // A second dash breaks the shape
        assert_eq!(extract_ticket_from_branch("fix-login-bug"), None);
    }

    #[test]
    fn test_looks_like_ticket() {
        assert!(looks_like_ticket("PROJ-123"));
        assert!(looks_like_ticket("rig-80a"));
        assert!(looks_like_ticket("a-1"));
        assert!(!looks_like_ticket("a-"));
        assert!(!looks_like_ticket("-123"));
        assert!(!looks_like_ticket("PR0J-1"));
        assert!(!looks_like_ticket("PROJ-1.2"));
        assert!(!looks_like_ticket("PROJ"));
    }
}
