use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use tracing::debug;

use super::{ParsedTranscript, TipEvent, TranscriptError, Visitor};

/// A time-of-day going backwards by more than this is a midnight rollover.
const ROLLOVER_GAP_SECS: i64 = 12 * 3600;
const SECS_PER_DAY: i64 = 24 * 3600;

struct Patterns {
    timestamp: Regex,
    tip: Regex,
    join: Regex,
    leave: Regex,
    follow: Regex,
    unfollow: Regex,
    ban: Regex,
    subject: Regex,
    chat: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("transcript pattern must compile");
        Patterns {
            timestamp: re(
                r"^\[(?:(\d{4}-\d{2}-\d{2})[ T])?(\d{1,2}):(\d{2})(?::(\d{2}))?\]\s*(.*)$",
            ),
            tip: re(r"(?i)^(\S+) tipped (\d+) tokens?\b"),
            join: re(r"(?i)^(\S+) has joined the room\b"),
            leave: re(r"(?i)^(\S+) has left the room\b"),
            follow: re(r"(?i)^(\S+) has followed\b"),
            unfollow: re(r"(?i)^(\S+) has unfollowed\b"),
            ban: re(r"(?i)^(\S+) (?:was|has been) banned\b"),
            subject: re(r"(?i)^room subject changed to:?\s*(.+)$"),
            chat: re(r"^([A-Za-z0-9_.\-]+):\s*(.*)$"),
        }
    })
}

#[derive(Debug, PartialEq)]
enum Event {
    Tip { username: String, tokens: i64 },
    Join(String),
    Leave(String),
    Follow(String),
    Unfollow(String),
    Ban(String),
    Subject(String),
    Chat(String),
}

/// Converts raw timestamps into seconds elapsed since the first one seen.
///
/// Undated times are placed on the most recent date seen (1970-01-01 until a
/// dated line appears), moving to the next day when the clock jumps backwards
/// by more than `ROLLOVER_GAP_SECS`.
#[derive(Default)]
struct Clock {
    origin: Option<i64>,
    last_absolute: Option<i64>,
    current_date: NaiveDate,
}

impl Clock {
    fn observe(&mut self, date: Option<NaiveDate>, time: NaiveTime) -> i64 {
        let absolute = match date {
            Some(d) => {
                self.current_date = d;
                d.and_time(time).and_utc().timestamp()
            }
            None => {
                let mut absolute = self.current_date.and_time(time).and_utc().timestamp();
                if let Some(last) = self.last_absolute {
                    if absolute + ROLLOVER_GAP_SECS < last {
                        if let Some(next) = self.current_date.succ_opt() {
                            self.current_date = next;
                            absolute += SECS_PER_DAY;
                        }
                    }
                }
                absolute
            }
        };
        self.last_absolute = Some(absolute);
        let origin = *self.origin.get_or_insert(absolute);
        absolute - origin
    }
}

#[derive(Default)]
struct Presence {
    open_since: Option<i64>,
    dwell: i64,
    timed: bool,
}

/// Parses a raw transcript. Unrecognised lines are skipped.
pub fn parse(text: &str) -> Result<ParsedTranscript, TranscriptError> {
    if text.trim().is_empty() {
        return Err(TranscriptError::Empty);
    }

    let mut clock = Clock::default();
    let mut last_elapsed: Option<i64> = None;
    let mut parsed = ParsedTranscript::default();
    let mut usernames: BTreeSet<String> = BTreeSet::new();
    let mut presence: HashMap<String, Presence> = HashMap::new();
    let mut visitor_order: Vec<String> = Vec::new();
    let mut skipped = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (elapsed, body) = split_timestamp(line, &mut clock);
        if let Some(t) = elapsed {
            last_elapsed = Some(last_elapsed.map_or(t, |l| l.max(t)));
        }

        let Some(event) = classify(body) else {
            skipped += 1;
            continue;
        };

        match event {
            Event::Tip { username, tokens } => {
                parsed.total_tokens = parsed.total_tokens.saturating_add(tokens);
                usernames.insert(username.clone());
                parsed.tips.push(TipEvent { username, tokens });
            }
            Event::Join(username) => {
                usernames.insert(username.clone());
                let state = visitor_entry(&mut presence, &mut visitor_order, &username);
                if let Some(t) = elapsed {
                    state.timed = true;
                    if state.open_since.is_none() {
                        state.open_since = Some(t);
                    }
                }
            }
            Event::Leave(username) => {
                usernames.insert(username.clone());
                let state = visitor_entry(&mut presence, &mut visitor_order, &username);
                if let Some(t) = elapsed {
                    state.timed = true;
                    // no join seen: present since the transcript began
                    let since = state.open_since.take().unwrap_or(0);
                    state.dwell += (t - since).max(0);
                }
            }
            Event::Follow(username) => {
                usernames.insert(username.clone());
                parsed.follows.push(username);
            }
            Event::Unfollow(username) => {
                usernames.insert(username.clone());
                parsed.unfollows.push(username);
            }
            Event::Ban(username) => {
                usernames.insert(username.clone());
                if !parsed.banned.contains(&username) {
                    parsed.banned.push(username);
                }
            }
            Event::Subject(subject) => {
                if !parsed.room_subjects.contains(&subject) {
                    parsed.room_subjects.push(subject);
                }
            }
            Event::Chat(username) => {
                usernames.insert(username);
                parsed.chat_message_count += 1;
            }
        }
    }

    let end = last_elapsed.unwrap_or(0);
    parsed.visitors = visitor_order
        .into_iter()
        .map(|username| {
            let state = presence.remove(&username).unwrap_or_default();
            let dwell_seconds = state.timed.then(|| {
                state.dwell + state.open_since.map_or(0, |since| (end - since).max(0))
            });
            Visitor {
                username,
                dwell_seconds,
            }
        })
        .collect();
    parsed.unique_usernames = usernames.into_iter().collect();

    debug!(
        "Parsed transcript: {} tips, {} visitors, {} chat lines, {} skipped",
        parsed.tips.len(),
        parsed.visitors.len(),
        parsed.chat_message_count,
        skipped
    );

    Ok(parsed)
}

fn visitor_entry<'a>(
    presence: &'a mut HashMap<String, Presence>,
    order: &mut Vec<String>,
    username: &str,
) -> &'a mut Presence {
    if !presence.contains_key(username) {
        order.push(username.to_string());
    }
    presence.entry(username.to_string()).or_default()
}

/// Strips a leading `[...]` timestamp, returning elapsed seconds when present.
fn split_timestamp<'a>(line: &'a str, clock: &mut Clock) -> (Option<i64>, &'a str) {
    let Some(caps) = patterns().timestamp.captures(line) else {
        return (None, line);
    };
    let body = caps.get(5).map_or("", |m| m.as_str());

    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let time = match (field(2), field(3)) {
        (Some(h), Some(m)) => NaiveTime::from_hms_opt(h, m, field(4).unwrap_or(0)),
        _ => None,
    };
    let Some(time) = time else {
        return (None, body);
    };
    let date = caps
        .get(1)
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok());

    (Some(clock.observe(date, time)), body)
}

fn classify(body: &str) -> Option<Event> {
    let p = patterns();
    let user = |re: &Regex| re.captures(body).map(|c| c[1].to_string());

    if let Some(c) = p.tip.captures(body) {
        let tokens = c[2].parse::<i64>().ok()?;
        return Some(Event::Tip {
            username: c[1].to_string(),
            tokens,
        });
    }
    if let Some(u) = user(&p.join) {
        return Some(Event::Join(u));
    }
    if let Some(u) = user(&p.leave) {
        return Some(Event::Leave(u));
    }
    if let Some(u) = user(&p.unfollow) {
        return Some(Event::Unfollow(u));
    }
    if let Some(u) = user(&p.follow) {
        return Some(Event::Follow(u));
    }
    if let Some(u) = user(&p.ban) {
        return Some(Event::Ban(u));
    }
    if let Some(c) = p.subject.captures(body) {
        return Some(Event::Subject(c[1].trim().to_string()));
    }
    if let Some(c) = p.chat.captures(body) {
        if c[1].eq_ignore_ascii_case("notice") {
            return None;
        }
        return Some(Event::Chat(c[1].to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[20:00:00] Room subject changed to: Chill Friday stream
[20:00:05] alice has joined the room
[20:00:10] alice: hey!
[20:00:30] bob has joined the room
[20:01:00] bob tipped 10 tokens
[20:01:10] bob has left the room
[20:02:00] carol tipped 20 tokens
[20:03:00] dave has followed
[20:04:00] erin has followed
[20:05:00] frank has unfollowed
[20:06:00] mallory was banned
[20:06:30] Notice: Welcome to the room
[20:10:05] alice tipped 5 tokens
[20:10:05] alice has left the room
"#;

    #[test]
    fn test_empty_transcript_is_error() {
        assert_eq!(parse("   \n  ").unwrap_err(), TranscriptError::Empty);
    }

    #[test]
    fn test_tokens_are_summed() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.total_tokens, 35);
        assert_eq!(parsed.tips.len(), 3);
    }

    #[test]
    fn test_follows_and_unfollows() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.follows, vec!["dave", "erin"]);
        assert_eq!(parsed.unfollows, vec!["frank"]);
    }

    #[test]
    fn test_unique_usernames_sorted_and_distinct() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(
            parsed.unique_usernames,
            vec!["alice", "bob", "carol", "dave", "erin", "frank", "mallory"]
        );
    }

    #[test]
    fn test_notice_lines_are_not_chat() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.chat_message_count, 1);
    }

    #[test]
    fn test_visitor_dwell_from_join_and_leave() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.visitors.len(), 2);
        assert_eq!(parsed.visitors[0].username, "alice");
        assert_eq!(parsed.visitors[0].dwell_seconds, Some(600));
        assert_eq!(parsed.visitors[1].username, "bob");
        assert_eq!(parsed.visitors[1].dwell_seconds, Some(40));
    }

    #[test]
    fn test_open_visit_closes_at_last_timestamp() {
        let text = "[10:00:00] zed has joined the room\n[10:05:00] amy: hello";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.visitors[0].dwell_seconds, Some(300));
    }

    #[test]
    fn test_untimed_visitors_have_unknown_dwell() {
        let parsed = parse("zed has joined the room\nzed has left the room").unwrap();
        assert_eq!(parsed.visitors.len(), 1);
        assert_eq!(parsed.visitors[0].dwell_seconds, None);
    }

    #[test]
    fn test_midnight_rollover() {
        let text = "[23:59:00] zed has joined the room\n[00:01:00] zed has left the room";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.visitors[0].dwell_seconds, Some(120));
    }

    #[test]
    fn test_dated_timestamps() {
        let text = "[2024-03-01 23:50:00] zed has joined the room\n\
                    [2024-03-02 00:20:00] zed has left the room";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.visitors[0].dwell_seconds, Some(1800));
    }

    #[test]
    fn test_undated_time_follows_last_date() {
        let text = "[2024-03-01 20:00:00] zed has joined the room\n\
                    [20:10:00] zed has left the room";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.visitors[0].dwell_seconds, Some(600));
    }

    #[test]
    fn test_undated_time_after_dated_rolls_over_midnight() {
        let text = "[2024-03-01 23:50:00] zed has joined the room\n\
                    [00:20:00] zed has left the room";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.visitors[0].dwell_seconds, Some(1800));
    }

    #[test]
    fn test_huge_tips_saturate_total() {
        let parsed = parse("a tipped 9223372036854775807 tokens\nb tipped 1 token").unwrap();
        assert_eq!(parsed.total_tokens, i64::MAX);
        assert_eq!(parsed.tips.len(), 2);
    }

    #[test]
    fn test_room_subjects_deduplicated() {
        let text = "Room subject changed to: A\nroom subject changed to B\nRoom subject changed to: A";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.room_subjects, vec!["A", "B"]);
    }

    #[test]
    fn test_single_token_tip() {
        let parsed = parse("[12:00] kim tipped 1 token").unwrap();
        assert_eq!(parsed.total_tokens, 1);
    }

    #[test]
    fn test_banned_deduplicated() {
        let parsed = parse("x was banned\nx has been banned").unwrap();
        assert_eq!(parsed.banned, vec!["x"]);
    }
}
