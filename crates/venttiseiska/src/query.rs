//! Event query parsing and tag matching.
//!
//! A query is either one delimited string (`"a:tagA:tagB b"`) or a sequence of
//! tokens. Each token is `event[:tag...]`; tokens with an empty event name are
//! dropped. Order and duplicates are preserved.

use crate::config::EmitterConfig;
use smallvec::SmallVec;

/// Anything that can be turned into a list of `event[:tag...]` tokens.
pub trait EventSelector {
    /// Returns the raw tokens in input order.
    fn tokens(&self, event_delimiter: char) -> SmallVec<[&str; 4]>;
}

impl EventSelector for str {
    fn tokens(&self, event_delimiter: char) -> SmallVec<[&str; 4]> {
        self.split(event_delimiter).collect()
    }
}

impl EventSelector for String {
    fn tokens(&self, event_delimiter: char) -> SmallVec<[&str; 4]> {
        self.as_str().tokens(event_delimiter)
    }
}

impl<S: AsRef<str>> EventSelector for [S] {
    fn tokens(&self, _event_delimiter: char) -> SmallVec<[&str; 4]> {
        self.iter().map(AsRef::as_ref).collect()
    }
}

impl<S: AsRef<str>, const N: usize> EventSelector for [S; N] {
    fn tokens(&self, event_delimiter: char) -> SmallVec<[&str; 4]> {
        self.as_slice().tokens(event_delimiter)
    }
}

impl<S: AsRef<str>> EventSelector for Vec<S> {
    fn tokens(&self, event_delimiter: char) -> SmallVec<[&str; 4]> {
        self.as_slice().tokens(event_delimiter)
    }
}

/// One parsed `(event, tags)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery<'a> {
    pub event: &'a str,
    pub tags: SmallVec<[&'a str; 4]>,
}

impl EventQuery<'_> {
    /// Whether this query filters by tags at all
    #[inline]
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// Parses a selector into `(event, tags)` pairs, skipping tokens with an
/// empty event name.
pub fn parse_events<'a, E>(events: &'a E, config: &EmitterConfig) -> SmallVec<[EventQuery<'a>; 4]>
where
    E: EventSelector + ?Sized,
{
    events
        .tokens(config.event_delimiter)
        .into_iter()
        .filter_map(|token| {
            let mut parts = token.split(config.tag_delimiter);
            let event = parts.next().unwrap_or_default();
            if event.is_empty() {
                return None;
            }
            Some(EventQuery {
                event,
                tags: parts.collect(),
            })
        })
        .collect()
}

/// Subset test: every query tag must appear somewhere in the listener's tags.
/// An empty query matches everything.
pub fn tags_match<Q, L>(query: &[Q], listener: &[L]) -> bool
where
    Q: AsRef<str>,
    L: AsRef<str>,
{
    query
        .iter()
        .all(|wanted| listener.iter().any(|tag| tag.as_ref() == wanted.as_ref()))
}
