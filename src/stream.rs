//! Typing-simulation stream
//!
//! Re-emits a complete response as word fragments with a jittered delay, so
//! the UI can render a natural typing cadence. The delay timer lives inside
//! the stream state: dropping the stream drops the pending sleep, so an
//! abandoned consumer leaks no timers.

use futures_util::stream::{self, Stream};
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;

/// Jittered inter-fragment delay, milliseconds: [30, 80).
const DELAY_MIN_MS: u64 = 30;
const DELAY_MAX_MS: u64 = 80;

/// Surfaced ahead of the word stream when the answering provider had to
/// drop an attachment.
pub const ATTACHMENT_NOTICE: &str =
    "Note: attachments are not supported in the current fallback mode.\n\n";

/// Fixed terminal message when every provider in the chain failed.
pub const ALL_PROVIDERS_FAILED: &str = "Sorry, all available services failed. Please:\n\n\
1. Check your internet connection\n\
2. Try again in a few minutes\n\
3. Contact support if the problem persists";

enum Fragment {
    /// Yielded immediately, before the typing cadence starts.
    Notice(String),
    Word(String),
}

/// Lazily re-emit `text` word by word, each fragment a word plus a trailing
/// space, so concatenating all fragments reproduces `text` plus one
/// trailing space. `notice` is yielded first, undelayed, when present.
///
/// Each call builds a fresh, finite, non-restartable sequence.
pub fn typing_stream(
    text: &str,
    notice: Option<&'static str>,
) -> impl Stream<Item = String> + Send {
    let mut fragments: VecDeque<Fragment> = VecDeque::new();
    if let Some(n) = notice {
        fragments.push_back(Fragment::Notice(n.to_string()));
    }
    // split(' ') rather than split_whitespace: empty fragments preserve
    // runs of spaces so reconstruction is exact
    for word in text.split(' ') {
        fragments.push_back(Fragment::Word(format!("{} ", word)));
    }

    stream::unfold((fragments, false), |(mut fragments, started)| async move {
        let fragment = fragments.pop_front()?;
        match fragment {
            Fragment::Notice(text) => Some((text, (fragments, started))),
            Fragment::Word(text) => {
                if started {
                    tokio::time::sleep(word_delay()).await;
                }
                Some((text, (fragments, true)))
            }
        }
    })
}

fn word_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(DELAY_MIN_MS..DELAY_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_reconstruction() {
        let text = "an investment plan built for the long term";
        let fragments: Vec<String> = typing_stream(text, None).collect().await;

        assert_eq!(fragments.len(), 8);
        let rebuilt: String = fragments.concat();
        assert_eq!(rebuilt.trim_end_matches(' '), text);
    }

    #[tokio::test]
    async fn test_preserves_internal_spacing() {
        let text = "two  spaces";
        let fragments: Vec<String> = typing_stream(text, None).collect().await;
        let rebuilt: String = fragments.concat();
        assert_eq!(rebuilt, "two  spaces ");
    }

    #[tokio::test]
    async fn test_notice_comes_first() {
        let fragments: Vec<String> =
            typing_stream("hello there", Some(ATTACHMENT_NOTICE)).collect().await;

        assert_eq!(fragments[0], ATTACHMENT_NOTICE);
        assert_eq!(fragments[1], "hello ");
    }

    #[tokio::test]
    async fn test_single_word() {
        let fragments: Vec<String> = typing_stream("hi", None).collect().await;
        assert_eq!(fragments, vec!["hi ".to_string()]);
    }

    #[tokio::test]
    async fn test_each_call_is_a_fresh_sequence() {
        let a: Vec<String> = typing_stream("one two", None).collect().await;
        let b: Vec<String> = typing_stream("one two", None).collect().await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_dropped_mid_stream() {
        // Pulling one fragment and dropping must not hang or panic; the
        // pending delay is cancelled with the stream.
        let mut s = Box::pin(typing_stream("a b c d", None));
        let first = s.next().await.unwrap();
        assert_eq!(first, "a ");
        drop(s);
    }
}
