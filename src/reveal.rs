use std::time::Duration;
use tokio::time::{ interval_at, Instant, MissedTickBehavior };

/// Character cursor over a message being revealed.
#[derive(Debug, Clone)]
pub struct Typewriter {
    content: String,
    position: usize,
}

impl Typewriter {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), position: 0 }
    }

    /// Reveals the next character.
    pub fn advance(&mut self) -> Option<char> {
        let next = self.content[self.position..].chars().next()?;
        self.position += next.len_utf8();
        Some(next)
    }

    pub fn displayed(&self) -> &str {
        &self.content[..self.position]
    }

    pub fn is_complete(&self) -> bool {
        self.position == self.content.len()
    }

    /// Jumps to the end and returns whatever had not been shown yet.
    pub fn finish(&mut self) -> &str {
        let start = self.position;
        self.position = self.content.len();
        &self.content[start..]
    }
}

/// Feeds one character per tick to `emit` until the typewriter is exhausted.
///
/// The first character is emitted one full interval after the call. Returns
/// `false` if `emit` asked to stop early. A zero interval emits everything at
/// once.
pub async fn run_reveal<F>(typewriter: &mut Typewriter, interval: Duration, mut emit: F) -> bool
    where F: FnMut(char) -> bool
{
    if interval.is_zero() {
        while let Some(ch) = typewriter.advance() {
            if !emit(ch) {
                return false;
            }
        }
        return true;
    }

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while !typewriter.is_complete() {
        ticker.tick().await;
        if let Some(ch) = typewriter.advance() {
            if !emit(ch) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_char_not_byte() {
        let mut tw = Typewriter::new("두통a");
        assert_eq!(tw.advance(), Some('두'));
        assert_eq!(tw.displayed(), "두");
        assert_eq!(tw.advance(), Some('통'));
        assert_eq!(tw.advance(), Some('a'));
        assert!(tw.is_complete());
        assert_eq!(tw.advance(), None);
    }

    #[test]
    fn finish_returns_unrevealed_tail() {
        let mut tw = Typewriter::new("기침");
        tw.advance();
        assert_eq!(tw.finish(), "침");
        assert!(tw.is_complete());
        assert_eq!(tw.displayed(), "기침");
    }

    #[test]
    fn empty_content_is_complete() {
        let tw = Typewriter::new("");
        assert!(tw.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn one_char_per_interval() {
        let mut tw = Typewriter::new("열이 나요");
        let started = Instant::now();
        let mut seen = String::new();
        let finished = run_reveal(&mut tw, Duration::from_millis(20), |ch| {
            seen.push(ch);
            true
        }).await;
        assert!(finished);
        assert_eq!(seen, "열이 나요");
        assert_eq!(started.elapsed(), Duration::from_millis(20 * 5));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_consumer_declines() {
        let mut tw = Typewriter::new("abcdef");
        let mut count = 0;
        let finished = run_reveal(&mut tw, Duration::from_millis(20), |_| {
            count += 1;
            count < 3
        }).await;
        assert!(!finished);
        assert_eq!(tw.displayed(), "abc");
    }

    #[tokio::test]
    async fn zero_interval_is_immediate() {
        let mut tw = Typewriter::new("abc");
        let mut seen = String::new();
        assert!(
            run_reveal(&mut tw, Duration::ZERO, |ch| {
                seen.push(ch);
                true
            }).await
        );
        assert_eq!(seen, "abc");
    }
}
