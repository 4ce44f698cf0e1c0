use std::collections::BTreeMap;

use comfy_table::Table;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use tracing::warn;

use crate::journal::StoredEntry;

/// Display labels for the category buckets, in bucket order.
pub const CATEGORY_LABELS: [&str; 5] = ["Daily", "Weekly", "Monthly", "Unblock", "AI Chat"];

const DATE_LABEL: &[FormatItem<'_>] = format_description!("[month repr:short] [day padding:none]");
const BAR_WIDTH: u64 = 20;

pub const NO_EMOTION_DATA: &str = "No emotion data yet. Start journaling!";
pub const NO_TIMELINE_DATA: &str = "Not enough data for timeline.";

/// Chart-ready aggregation of a user's entries: category buckets, emotion
/// frequencies, and a per-day emotion timeline. Built in one linear pass.
#[derive(Debug, Default, PartialEq)]
pub struct EntrySummary {
    pub category_counts: [u64; 5],
    /// Entries whose category is outside the known set. Surfaced instead of
    /// silently dropped.
    pub unmapped_categories: u64,
    /// Emotion label -> count, in first-seen order.
    pub emotion_counts: Vec<(String, u64)>,
    /// Day -> (emotion -> count), ascending by day.
    pub timeline: BTreeMap<Date, Vec<(String, u64)>>,
}

fn bucket_index(category: &str) -> Option<usize> {
    match category {
        "daily" => Some(0),
        "weekly" => Some(1),
        "monthly" => Some(2),
        "stumped" => Some(3),
        "ai" => Some(4),
        _ => None,
    }
}

fn bump(counts: &mut Vec<(String, u64)>, label: &str) {
    match counts.iter_mut().find(|(name, _)| name == label) {
        Some((_, count)) => *count += 1,
        None => counts.push((label.to_string(), 1)),
    }
}

impl EntrySummary {
    pub fn from_entries(entries: &[StoredEntry]) -> Self {
        let mut summary = Self::default();

        for entry in entries {
            match bucket_index(&entry.category) {
                Some(idx) => summary.category_counts[idx] += 1,
                None => {
                    warn!("Skipping entry with unmapped category {:?}", entry.category);
                    summary.unmapped_categories += 1;
                }
            }

            if let Some(sentiment) = entry.sentiment.as_deref() {
                bump(&mut summary.emotion_counts, sentiment);

                let day = entry.created_at.date();
                let day_counts = summary.timeline.entry(day).or_default();
                bump(day_counts, sentiment);
            }
        }

        summary
    }

    pub fn total_entries(&self) -> u64 {
        self.category_counts.iter().sum::<u64>() + self.unmapped_categories
    }

    pub fn has_emotion_data(&self) -> bool {
        !self.emotion_counts.is_empty()
    }

    /// Entries-per-category table with a proportional bar column.
    pub fn render_categories(&self) -> String {
        let max = self.category_counts.iter().copied().max().unwrap_or(0);

        let mut table = Table::new();
        table.set_header(vec!["Category", "Entries", ""]);
        for (label, count) in CATEGORY_LABELS.iter().zip(self.category_counts) {
            table.add_row(vec![label.to_string(), count.to_string(), bar(count, max)]);
        }

        table.to_string()
    }

    pub fn render_emotions(&self) -> String {
        let max = self
            .emotion_counts
            .iter()
            .map(|(_, count)| *count)
            .max()
            .unwrap_or(0);

        let mut table = Table::new();
        table.set_header(vec!["Emotion", "Entries", ""]);
        for (label, count) in &self.emotion_counts {
            table.add_row(vec![label.clone(), count.to_string(), bar(*count, max)]);
        }

        table.to_string()
    }

    /// Stacked-bar equivalent: one row per day, one column per emotion.
    pub fn render_timeline(&self) -> String {
        let emotions: Vec<&str> = self
            .emotion_counts
            .iter()
            .map(|(label, _)| label.as_str())
            .collect();

        let mut header = vec!["Day".to_string()];
        header.extend(emotions.iter().map(|label| label.to_string()));

        let mut table = Table::new();
        table.set_header(header);

        for (day, day_counts) in &self.timeline {
            let label = day
                .format(&DATE_LABEL)
                .unwrap_or_else(|_| day.to_string());
            let mut row = vec![label];
            for emotion in &emotions {
                let count = day_counts
                    .iter()
                    .find(|(name, _)| name == emotion)
                    .map(|(_, count)| *count)
                    .unwrap_or(0);
                row.push(if count == 0 {
                    String::new()
                } else {
                    count.to_string()
                });
            }
            table.add_row(row);
        }

        table.to_string()
    }
}

fn bar(count: u64, max: u64) -> String {
    if max == 0 {
        return String::new();
    }
    let width = (count * BAR_WIDTH).div_ceil(max).min(BAR_WIDTH);
    "█".repeat(width as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn entry(category: &str, sentiment: Option<&str>, created_at: OffsetDateTime) -> StoredEntry {
        StoredEntry {
            category: category.to_string(),
            sentiment: sentiment.map(str::to_string),
            created_at,
        }
    }

    #[test]
    fn categories_land_in_their_buckets() {
        let entries = vec![
            entry("daily", None, datetime!(2026-01-05 09:00 UTC)),
            entry("daily", None, datetime!(2026-01-06 09:00 UTC)),
            entry("weekly", None, datetime!(2026-01-07 09:00 UTC)),
            entry("stumped", None, datetime!(2026-01-08 09:00 UTC)),
            entry("ai", None, datetime!(2026-01-09 09:00 UTC)),
        ];

        let summary = EntrySummary::from_entries(&entries);
        assert_eq!(summary.category_counts, [2, 1, 0, 1, 1]);
        assert_eq!(summary.unmapped_categories, 0);
        assert_eq!(summary.total_entries(), 5);
    }

    #[test]
    fn unmapped_categories_are_counted_not_dropped() {
        let entries = vec![
            entry("daily", None, datetime!(2026-01-05 09:00 UTC)),
            entry("retired-mode", None, datetime!(2026-01-05 10:00 UTC)),
            entry("", None, datetime!(2026-01-05 11:00 UTC)),
        ];

        let summary = EntrySummary::from_entries(&entries);
        assert_eq!(summary.category_counts, [1, 0, 0, 0, 0]);
        assert_eq!(summary.unmapped_categories, 2);
        assert_eq!(summary.total_entries(), 3);
    }

    #[test]
    fn emotions_keep_first_seen_order() {
        let entries = vec![
            entry("daily", Some("Anxiety"), datetime!(2026-01-05 09:00 UTC)),
            entry("daily", Some("Gratitude"), datetime!(2026-01-06 09:00 UTC)),
            entry("weekly", Some("Anxiety"), datetime!(2026-01-07 09:00 UTC)),
            entry("daily", None, datetime!(2026-01-08 09:00 UTC)),
        ];

        let summary = EntrySummary::from_entries(&entries);
        assert_eq!(
            summary.emotion_counts,
            vec![("Anxiety".to_string(), 2), ("Gratitude".to_string(), 1)]
        );
    }

    #[test]
    fn timeline_groups_by_day_ascending() {
        let entries = vec![
            entry("daily", Some("Anxiety"), datetime!(2026-01-05 09:00 UTC)),
            entry("daily", Some("Anxiety"), datetime!(2026-01-05 21:00 UTC)),
            entry("weekly", Some("Gratitude"), datetime!(2026-01-07 09:00 UTC)),
        ];

        let summary = EntrySummary::from_entries(&entries);
        let days: Vec<Date> = summary.timeline.keys().copied().collect();
        assert_eq!(
            days,
            vec![
                datetime!(2026-01-05 00:00 UTC).date(),
                datetime!(2026-01-07 00:00 UTC).date()
            ]
        );

        let first_day = &summary.timeline[&days[0]];
        assert_eq!(first_day, &vec![("Anxiety".to_string(), 2)]);
    }

    #[test]
    fn entries_without_sentiment_skip_emotion_charts() {
        let entries = vec![entry("daily", None, datetime!(2026-01-05 09:00 UTC))];
        let summary = EntrySummary::from_entries(&entries);
        assert!(!summary.has_emotion_data());
        assert!(summary.timeline.is_empty());
    }

    #[test]
    fn rendering_includes_every_bucket_label() {
        let summary = EntrySummary::from_entries(&[]);
        let rendered = summary.render_categories();
        for label in CATEGORY_LABELS {
            assert!(rendered.contains(label));
        }
    }

    #[test]
    fn bar_scales_to_the_maximum() {
        assert_eq!(bar(0, 10), "");
        assert_eq!(bar(10, 10).chars().count(), 20);
        assert_eq!(bar(5, 10).chars().count(), 10);
        assert_eq!(bar(3, 0), "");
    }
}
