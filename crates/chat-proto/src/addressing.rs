//! The `to` addressing grammar.
//!
//! ```text
//! to   = user / room "/" user
//! ```
//!
//! A value without `/` addresses a user directly. With a room segment the
//! event goes to every member of that room; the trailing user segment is
//! context only.

/// A parsed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Room segment, empty for direct delivery.
    pub room: String,
    /// User segment.
    pub user: String,
}

impl Destination {
    /// Split a `to` value. Segments past the second `/` are ignored.
    pub fn parse(to: &str) -> Self {
        match to.split_once('/') {
            Some((room, rest)) => {
                let user = rest.split('/').next().unwrap_or_default();
                Self {
                    room: room.to_string(),
                    user: user.to_string(),
                }
            }
            None => Self {
                room: String::new(),
                user: to.to_string(),
            },
        }
    }

    /// The room, if this destination is room-scoped.
    pub fn room(&self) -> Option<&str> {
        if self.room.is_empty() {
            None
        } else {
            Some(&self.room)
        }
    }

    /// True when neither segment names anything.
    pub fn is_empty(&self) -> bool {
        self.room.is_empty() && self.user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_value_is_direct() {
        let dest = Destination::parse("bob");
        assert_eq!(dest.room(), None);
        assert_eq!(dest.user, "bob");
    }

    #[test]
    fn room_and_user() {
        let dest = Destination::parse("room1/bob");
        assert_eq!(dest.room(), Some("room1"));
        assert_eq!(dest.user, "bob");
    }

    #[test]
    fn leading_slash_means_no_room() {
        let dest = Destination::parse("/bob");
        assert_eq!(dest.room(), None);
        assert_eq!(dest.user, "bob");
    }

    #[test]
    fn room_without_user() {
        let dest = Destination::parse("room1/");
        assert_eq!(dest.room(), Some("room1"));
        assert!(dest.user.is_empty());
    }

    #[test]
    fn extra_segments_ignored() {
        let dest = Destination::parse("room1/bob/extra");
        assert_eq!(dest.user, "bob");
    }

    #[test]
    fn empty() {
        assert!(Destination::parse("").is_empty());
        assert!(Destination::parse("/").is_empty());
    }
}
