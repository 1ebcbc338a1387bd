//! XMLTV EPG parsing.
//!
//! Streaming event parser over `<tv><programme>` markup. Programmes whose
//! timestamps fail to parse are dropped individually; one broken element
//! never aborts the batch. Mapping raw `channel` attributes onto internal
//! channel ids is a separate step driven by a caller-supplied lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::time::{interval, sleep};
use tracing::{debug, warn};

use crate::models::EpgProgram;
use crate::services::fetch::ResilientFetcher;
use crate::store::repository::programs;
use crate::store::DocumentStore;

/// Which child element's text is being collected.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    None,
    Title,
    Desc,
    Category,
}

#[derive(Debug, Default)]
struct ProgrammeBuilder {
    epg_channel_id: String,
    start_raw: String,
    stop_raw: String,
    title: String,
    description: String,
    category: String,
}

impl ProgrammeBuilder {
    fn build(self) -> Option<EpgProgram> {
        if self.epg_channel_id.is_empty() || self.title.is_empty() {
            return None;
        }
        let start = parse_xmltv_time(&self.start_raw)?;
        let end = parse_xmltv_time(&self.stop_raw)?;

        let span = (end - start).num_seconds();
        let duration_secs = if span >= 0 { Some(span) } else { None };

        let opt = |s: String| if s.is_empty() { None } else { Some(s) };
        Some(EpgProgram {
            channel_id: None,
            epg_channel_id: Some(self.epg_channel_id),
            title: self.title,
            description: opt(self.description),
            start,
            end,
            duration_secs,
            category: opt(self.category),
        })
    }
}

/// Streaming XMLTV parser.
pub struct EpgParser;

impl EpgParser {
    /// Parse XMLTV text into unmapped programs (`channel_id` is always
    /// `None` here). Only the `channel`/`start`/`stop` attributes and the
    /// `title`/`desc`/`category` children are consumed; everything else,
    /// `icon` included, is skipped.
    pub fn parse(xml: &str) -> Vec<EpgProgram> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut programs = Vec::new();
        let mut dropped = 0usize;
        let mut current: Option<ProgrammeBuilder> = None;
        let mut field = Field::None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                    b"programme" => {
                        let mut builder = ProgrammeBuilder::default();
                        for attr in e.attributes().flatten() {
                            let value = attr
                                .unescape_value()
                                .map(|v| v.into_owned())
                                .unwrap_or_default();
                            match attr.key.as_ref() {
                                b"channel" => builder.epg_channel_id = value,
                                b"start" => builder.start_raw = value,
                                b"stop" => builder.stop_raw = value,
                                _ => {}
                            }
                        }
                        current = Some(builder);
                        field = Field::None;
                    }
                    b"title" if current.is_some() => field = Field::Title,
                    b"desc" if current.is_some() => field = Field::Desc,
                    b"category" if current.is_some() => field = Field::Category,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(ref mut builder) = current {
                        let text = e.unescape().unwrap_or_default();
                        match field {
                            Field::Title => builder.title.push_str(&text),
                            Field::Desc => builder.description.push_str(&text),
                            Field::Category => builder.category.push_str(&text),
                            Field::None => {}
                        }
                    }
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"programme" => {
                        if let Some(builder) = current.take() {
                            match builder.build() {
                                Some(program) => programs.push(program),
                                None => dropped += 1,
                            }
                        }
                        field = Field::None;
                    }
                    b"title" | b"desc" | b"category" => field = Field::None,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    // Recover at the next well-formed element
                    warn!(error = %e, "xml error in epg feed, skipping element");
                    dropped += current.take().is_some() as usize;
                    field = Field::None;
                }
                _ => {}
            }
        }

        if dropped > 0 {
            warn!(dropped, kept = programs.len(), "dropped unparseable programmes");
        }
        programs
    }
}

/// Parse XMLTV's compact timestamp (`YYYYMMDDHHMMSS[ ±HHMM|Z]`) into an
/// absolute instant. Returns `None` when the value is unusable.
pub fn parse_xmltv_time(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if digits_end < 14 {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(&s[..14], "%Y%m%d%H%M%S").ok()?;
    let suffix = s[digits_end..].trim();

    let offset_secs = if suffix.is_empty() || suffix.eq_ignore_ascii_case("z") {
        0
    } else {
        parse_tz_offset(suffix)?
    };

    Some(Utc.from_utc_datetime(&naive) - chrono::Duration::seconds(offset_secs))
}

/// `+0100` / `-0530` → signed seconds.
fn parse_tz_offset(tz: &str) -> Option<i64> {
    let (sign, rest) = if let Some(rest) = tz.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = tz.strip_prefix('-') {
        (-1, rest)
    } else {
        return None;
    };

    if rest.len() < 4 {
        return None;
    }
    let hours: i64 = rest[0..2].parse().ok()?;
    let minutes: i64 = rest[2..4].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Fill `channel_id` from the `epg_channel_id -> channel_id` lookup built
/// from the user's stored channels. Unmatched programs keep `None` and are
/// still persisted under their raw provider id.
pub fn map_to_channels(programs: &mut [EpgProgram], lookup: &HashMap<String, String>) -> usize {
    let mut mapped = 0;
    for program in programs.iter_mut() {
        if let Some(channel_id) = program
            .epg_channel_id
            .as_ref()
            .and_then(|id| lookup.get(id))
        {
            program.channel_id = Some(channel_id.clone());
            mapped += 1;
        }
    }
    mapped
}

/// Fetch several EPG documents with a bounded fan-out: `concurrency`
/// requests at a time with a short pause between batches to respect
/// upstream rate limits. Failed fetches are skipped with a warning.
pub async fn fetch_many(
    fetcher: &ResilientFetcher,
    urls: &[String],
    concurrency: usize,
    pause_ms: u64,
) -> Vec<String> {
    let concurrency = concurrency.max(1);
    let mut bodies = Vec::new();

    for chunk in urls.chunks(concurrency) {
        let results =
            futures::future::join_all(chunk.iter().map(|url| fetcher.fetch_text(url))).await;
        for (url, result) in chunk.iter().zip(results) {
            match result {
                Ok(body) => bodies.push(body),
                Err(err) => warn!(url = %url, error = %err, "epg fetch failed, skipping"),
            }
        }
        if chunk.len() == concurrency && pause_ms > 0 {
            sleep(StdDuration::from_millis(pause_ms)).await;
        }
    }

    bodies
}

/// Background retention loop: periodically deletes programs that ended more
/// than `retention_days` ago. Spawn with `tokio::spawn`.
pub async fn start_retention_task(
    store: Arc<dyn DocumentStore>,
    retention_days: u32,
    interval_secs: u64,
) {
    debug!(retention_days, interval_secs, "starting epg retention task");
    let mut ticker = interval(StdDuration::from_secs(interval_secs));

    loop {
        ticker.tick().await;
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
        match programs::delete_programs_before(store.as_ref(), cutoff).await {
            Ok(0) => {}
            Ok(deleted) => tracing::info!(deleted, "epg retention cleanup"),
            Err(e) => warn!(error = %e, "epg retention cleanup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="cnn.us">
    <display-name>CNN</display-name>
    <icon src="http://logo/cnn.png"/>
  </channel>
  <programme start="20260115120000 +0000" stop="20260115130000 +0000" channel="cnn.us">
    <title>News at Noon</title>
    <desc>Daily news &amp; weather</desc>
    <category>News</category>
    <icon src="http://img/noon.png"/>
  </programme>
  <programme start="20260115130000 +0000" stop="20260115140000 +0000" channel="cnn.us">
    <title>Afternoon Report</title>
  </programme>
</tv>"#;

    #[test]
    fn test_parse_programmes() {
        let programs = EpgParser::parse(SAMPLE);
        assert_eq!(programs.len(), 2);

        let first = &programs[0];
        assert_eq!(first.epg_channel_id.as_deref(), Some("cnn.us"));
        assert!(first.channel_id.is_none());
        assert_eq!(first.title, "News at Noon");
        assert_eq!(first.description.as_deref(), Some("Daily news & weather"));
        assert_eq!(first.category.as_deref(), Some("News"));
        assert_eq!(first.duration_secs, Some(3600));
        assert!(first.start < first.end);
    }

    #[test]
    fn test_bad_timestamp_drops_record_only() {
        let xml = r#"<tv>
  <programme start="garbage" stop="20260115130000" channel="c1"><title>Bad</title></programme>
  <programme start="20260115120000" stop="20260115130000" channel="c1"><title>Good</title></programme>
</tv>"#;
        let programs = EpgParser::parse(xml);
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].title, "Good");
    }

    #[test]
    fn test_missing_channel_or_title_is_dropped() {
        let xml = r#"<tv>
  <programme start="20260115120000" stop="20260115130000"><title>No channel</title></programme>
  <programme start="20260115120000" stop="20260115130000" channel="c1"></programme>
</tv>"#;
        assert!(EpgParser::parse(xml).is_empty());
    }

    #[test]
    fn test_negative_span_keeps_record_with_null_duration() {
        let xml = r#"<tv>
  <programme start="20260115140000" stop="20260115130000" channel="c1"><title>Odd</title></programme>
</tv>"#;
        let programs = EpgParser::parse(xml);
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].duration_secs, None);
    }

    #[test]
    fn test_parse_xmltv_time_offsets() {
        let utc = parse_xmltv_time("20260115120000 +0000").unwrap();
        let plus_one = parse_xmltv_time("20260115120000 +0100").unwrap();
        assert_eq!((utc - plus_one).num_seconds(), 3600);

        // Compact, Z-suffixed and bare forms
        assert_eq!(parse_xmltv_time("20260115120000+0000"), Some(utc));
        assert_eq!(parse_xmltv_time("20260115120000Z"), Some(utc));
        assert_eq!(parse_xmltv_time("20260115120000"), Some(utc));

        assert!(parse_xmltv_time("2026").is_none());
        assert!(parse_xmltv_time("").is_none());
    }

    #[test]
    fn test_map_to_channels() {
        let mut programs = EpgParser::parse(SAMPLE);
        let lookup = HashMap::from([("cnn.us".to_string(), "chan_1".to_string())]);

        let mapped = map_to_channels(&mut programs, &lookup);
        assert_eq!(mapped, 2);
        assert_eq!(programs[0].channel_id.as_deref(), Some("chan_1"));
    }

    #[test]
    fn test_unmatched_channels_stay_unmapped() {
        let mut programs = EpgParser::parse(SAMPLE);
        let mapped = map_to_channels(&mut programs, &HashMap::new());
        assert_eq!(mapped, 0);
        assert!(programs[0].channel_id.is_none());
    }

    #[tokio::test]
    async fn test_fetch_many_skips_failures() {
        use crate::config::Config;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<tv/>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = Config {
            fetch_timeout_ms: 2_000,
            max_retries: 0,
            user_agent: "test".to_string(),
            epg_retention_days: 7,
            epg_fetch_concurrency: 5,
            epg_fetch_pause_ms: 0,
            classifier_rules_path: None,
        };
        let fetcher = ResilientFetcher::new(&config);
        let urls = vec![
            format!("{}/ok.xml", server.uri()),
            format!("{}/missing.xml", server.uri()),
        ];

        let bodies = fetch_many(&fetcher, &urls, 5, 0).await;
        assert_eq!(bodies, vec!["<tv/>".to_string()]);
    }
}
