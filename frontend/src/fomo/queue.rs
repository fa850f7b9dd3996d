use std::collections::VecDeque;

use rand::Rng;

use crate::fomo::payload::Package;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Purchase { package: Package },
    Testimonial { quote: &'static str, rating: u8 },
}

/// One rendered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEvent {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    /// Epoch ms. Testimonials are backdated.
    pub created_at: i64,
    pub payload: Payload,
}

/// `prefix-<now>-<seq>-<8 hex digits>`; unique within a page session
/// through `seq` alone.
pub fn event_id<R: Rng + ?Sized>(prefix: &str, now: i64, seq: u64, rng: &mut R) -> String {
    format!("{}-{}-{}-{:08x}", prefix, now, seq, rng.gen::<u32>())
}

/// Bounded FIFO of what is currently on screen. Pushing past the bound
/// evicts the oldest events.
#[derive(Debug, Clone)]
pub struct DisplayQueue {
    bound: usize,
    events: VecDeque<DisplayEvent>,
}

impl DisplayQueue {
    pub fn new(bound: usize) -> Self {
        let bound = bound.max(1);
        Self {
            bound,
            events: VecDeque::with_capacity(bound),
        }
    }

    /// Returns whatever was pushed out the front.
    pub fn push(&mut self, event: DisplayEvent) -> Vec<DisplayEvent> {
        self.events.push_back(event);
        let mut evicted = Vec::new();
        while self.events.len() > self.bound {
            if let Some(old) = self.events.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }

    pub fn remove(&mut self, id: &str) -> Option<DisplayEvent> {
        let index = self.events.iter().position(|e| e.id == id)?;
        self.events.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) -> Vec<DisplayEvent> {
        self.events.drain(..).collect()
    }
}

pub fn time_ago(from: i64, now: i64) -> String {
    let s = (now - from).max(0) / 1000;
    if s < 60 {
        return format!("{}s ago", s);
    }
    let m = s / 60;
    if m < 60 {
        return format!("{}m ago", m);
    }
    let h = m / 60;
    if h < 24 {
        return format!("{}h ago", h);
    }
    format!("{}d ago", h / 24)
}

/// First letters of the first two words, `U` for an empty name.
pub fn initials(name: &str) -> String {
    let mut words = name.split_whitespace();
    let first = words.next().and_then(|w| w.chars().next()).unwrap_or('U');
    let mut out = first.to_string();
    if let Some(c) = words.next().and_then(|w| w.chars().next()) {
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fomo::payload::PACKAGES;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn event(id: &str) -> DisplayEvent {
        DisplayEvent {
            id: id.to_string(),
            name: format!("Name {}", id),
            avatar_url: format!("https://a/{}.jpg", id),
            created_at: 0,
            payload: Payload::Purchase {
                package: PACKAGES[0],
            },
        }
    }

    #[test]
    fn bound_one_replaces_the_visible_event() {
        let mut q = DisplayQueue::new(1);
        assert!(q.push(event("a")).is_empty());
        let evicted = q.push(event("b"));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "a");
        assert_eq!(q.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut q = DisplayQueue::new(3);
        for id in ["a", "b", "c", "d"] {
            q.push(event(id));
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["b", "c", "d"]);
    }

    #[test]
    fn remove_by_id() {
        let mut q = DisplayQueue::new(3);
        q.push(event("a"));
        q.push(event("b"));
        assert_eq!(q.remove("a").map(|e| e.id), Some("a".to_string()));
        assert!(q.remove("a").is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn ids_do_not_collide_within_a_millisecond() {
        let mut rng = SmallRng::seed_from_u64(1);
        let a = event_id("fomo", 1000, 1, &mut rng);
        let b = event_id("fomo", 1000, 2, &mut rng);
        assert!(a.starts_with("fomo-1000-1-"));
        assert_ne!(a, b);
    }

    #[test]
    fn sequence_is_delimited_from_the_random_suffix() {
        let mut rng = SmallRng::seed_from_u64(7);
        let ids: Vec<String> = [1u64, 11, 111]
            .iter()
            .map(|seq| event_id("fomo", 1000, *seq, &mut rng))
            .collect();
        for (id, seq) in ids.iter().zip(["1", "11", "111"]) {
            let parts: Vec<&str> = id.split('-').collect();
            assert_eq!(parts.len(), 4);
            assert_eq!(parts[2], seq);
            assert_eq!(parts[3].len(), 8);
        }
    }

    #[rstest]
    #[case(0, "0s ago")]
    #[case(59_999, "59s ago")]
    #[case(60_000, "1m ago")]
    #[case(3_600_000, "1h ago")]
    #[case(90_000_000, "1d ago")]
    #[case(-5_000, "0s ago")]
    fn time_ago_labels(#[case] elapsed: i64, #[case] label: &str) {
        assert_eq!(time_ago(1_000_000, 1_000_000 + elapsed), label);
    }

    #[rstest]
    #[case("Olivia Smith", "OS")]
    #[case("Olivia Q. Smith-Jones", "OQ")]
    #[case("Cher", "C")]
    #[case("   ", "U")]
    fn initials_of(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(initials(name), expected);
    }
}
