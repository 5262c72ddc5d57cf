use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estimate presets (minutes) offered when adding a task.
///
/// The engine accepts any positive value; only the CLI restricts input to these.
pub const ESTIMATE_PRESETS: [u32; 6] = [30, 60, 90, 120, 180, 240];

/// Represents a single task in the canonical local collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, generated when the task is created.
    pub id: Uuid,
    /// The display title of the task.
    pub title: String,
    /// When the task is due.
    #[serde(with = "flexible_date")]
    pub due_date: DateTime<Utc>,
    /// Planned duration in minutes.
    pub estimated_minutes: u32,
    /// Whether the task has been completed.
    #[serde(default)]
    pub is_completed: bool,
}

impl Task {
    /// Creates an incomplete task with a fresh id.
    pub fn new(title: impl Into<String>, due_date: DateTime<Utc>, estimated_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            due_date,
            estimated_minutes,
            is_completed: false,
        }
    }
}

/// A task as stored in the remote per-user document collection.
///
/// This is not the same entity as [`Task`]: ids are opaque strings, the due
/// date is optional and ownership is explicit. The two are never merged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub is_completed: bool,
    #[serde(with = "flexible_date")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "flexible_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: String,
}

/// The display capability shared by local and remote tasks.
pub trait TaskLike {
    fn title(&self) -> &str;
    fn is_completed(&self) -> bool;
    /// The date shown next to the task, if any.
    fn display_due(&self) -> Option<DateTime<Utc>>;
}

impl TaskLike for Task {
    fn title(&self) -> &str {
        &self.title
    }

    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn display_due(&self) -> Option<DateTime<Utc>> {
        Some(self.due_date)
    }
}

impl TaskLike for RemoteTask {
    fn title(&self) -> &str {
        &self.title
    }

    fn is_completed(&self) -> bool {
        self.is_completed
    }

    // Remote tasks without a due date fall back to their creation time.
    fn display_due(&self) -> Option<DateTime<Utc>> {
        self.due_date.or(Some(self.created_at))
    }
}

/// Lightweight projection of a task for the upcoming list.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UpcomingEntry {
    pub title: String,
    pub completed: bool,
    pub due: Option<DateTime<Utc>>,
}

impl UpcomingEntry {
    pub fn from_task_like<T: TaskLike + ?Sized>(task: &T) -> Self {
        Self {
            title: task.title().to_string(),
            completed: task.is_completed(),
            due: task.display_due(),
        }
    }

    /// Short date label, or "No date" when the entry has none.
    pub fn due_label(&self) -> String {
        match self.due {
            Some(due) => due.format("%Y-%m-%d").to_string(),
            None => "No date".to_string(),
        }
    }
}

/// Serde adapter for timestamps.
///
/// Writes RFC 3339. Reads RFC 3339 strings or a number of seconds since
/// 2001-01-01T00:00:00Z, the default encoding of blobs written by the mobile client.
pub mod flexible_date {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Unix timestamp of 2001-01-01T00:00:00Z.
    pub const REFERENCE_EPOCH_SECS: i64 = 978_307_200;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDate {
        Text(String),
        Seconds(f64),
    }

    fn from_raw<E: serde::de::Error>(raw: RawDate) -> Result<DateTime<Utc>, E> {
        match raw {
            RawDate::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| E::custom(format!("invalid date '{text}': {err}"))),
            RawDate::Seconds(secs) => {
                if !secs.is_finite() {
                    return Err(E::custom("date is not a finite number"));
                }
                let out_of_range = || E::custom(format!("date out of range: {secs}"));
                if secs.abs() >= (i64::MAX / 1000) as f64 {
                    return Err(out_of_range());
                }
                let millis = ((secs * 1000.0).round() as i64)
                    .checked_add(REFERENCE_EPOCH_SECS * 1000)
                    .ok_or_else(out_of_range)?;
                Utc.timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(out_of_range)
            }
        }
    }

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        from_raw(RawDate::deserialize(deserializer)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<RawDate>::deserialize(deserializer)? {
                Some(raw) => from_raw(raw).map(Some),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn task_uses_camel_case_fields() {
        let due = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        let task = Task::new("Read chapter 3", due, 60);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["title"], "Read chapter 3");
        assert_eq!(value["estimatedMinutes"], 60);
        assert_eq!(value["isCompleted"], false);
        assert_eq!(value["dueDate"], "2025-01-10T09:00:00Z");
    }

    #[test]
    fn task_reads_reference_date_seconds() {
        let json = r#"{
            "id": "6f2b8f3c-8a0e-4b7e-9a57-0f3c2d1e4b5a",
            "title": "Essay",
            "dueDate": 0,
            "estimatedMinutes": 90
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.due_date, Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());
        assert!(!task.is_completed);
    }

    #[test]
    fn huge_reference_seconds_are_rejected() {
        for secs in ["1e300", "-1e300", "9223372036854775"] {
            let json = format!(
                r#"{{"id": "6f2b8f3c-8a0e-4b7e-9a57-0f3c2d1e4b5a", "title": "x", "dueDate": {secs}, "estimatedMinutes": 30}}"#
            );
            assert!(serde_json::from_str::<Task>(&json).is_err(), "{secs}");
        }
    }

    #[test]
    fn remote_task_falls_back_to_created_at() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let remote = RemoteTask {
            id: "r1".into(),
            title: "Lab report".into(),
            description: String::new(),
            is_completed: false,
            created_at: created,
            due_date: None,
            user_id: "u1".into(),
        };
        assert_eq!(remote.display_due(), Some(created));
    }

    #[test]
    fn due_label_without_date() {
        let entry = UpcomingEntry {
            title: "x".into(),
            completed: false,
            due: None,
        };
        assert_eq!(entry.due_label(), "No date");
    }
}
