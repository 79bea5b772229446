//! Row types for the exported tables.
//!
//! Spreadsheet exports are loosely typed: ids may arrive as `12`, `12.0` or
//! `"12"`, and missing values as `null`, `""` or `"NA"`. The `cell` helpers
//! normalise those before a row reaches the database.

use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    #[serde(deserialize_with = "cell::id")]
    pub user_id: i64,
    #[serde(deserialize_with = "cell::text")]
    pub user_name: String,
    #[serde(default, deserialize_with = "cell::datetime")]
    pub user_created_at: Option<OffsetDateTime>,
    #[serde(deserialize_with = "cell::text")]
    pub user_state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRecord {
    #[serde(deserialize_with = "cell::id")]
    pub course_id: i64,
    #[serde(deserialize_with = "cell::text")]
    pub semester: String,
    #[serde(deserialize_with = "cell::text")]
    pub course_code: String,
    #[serde(deserialize_with = "cell::text")]
    pub course_name: String,
    #[serde(default, deserialize_with = "cell::datetime")]
    pub course_created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRecord {
    #[serde(deserialize_with = "cell::id")]
    pub user_id: i64,
    #[serde(deserialize_with = "cell::id")]
    pub course_id: i64,
    #[serde(deserialize_with = "cell::text")]
    pub enrollment_type: String,
    #[serde(deserialize_with = "cell::text")]
    pub enrollment_state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRecord {
    #[serde(deserialize_with = "cell::id")]
    pub user_id: i64,
    #[serde(deserialize_with = "cell::text")]
    pub user_login_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicRecord {
    #[serde(deserialize_with = "cell::id")]
    pub topic_id: i64,
    #[serde(deserialize_with = "cell::text")]
    pub topic_title: String,
    #[serde(default, deserialize_with = "cell::text")]
    pub topic_content: String,
    #[serde(default, deserialize_with = "cell::datetime")]
    pub topic_created_at: Option<OffsetDateTime>,
    #[serde(deserialize_with = "cell::text")]
    pub topic_state: String,
    #[serde(deserialize_with = "cell::id")]
    pub course_id: i64,
    #[serde(deserialize_with = "cell::id")]
    pub topic_posted_by_user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryRecord {
    #[serde(deserialize_with = "cell::id")]
    pub entry_id: i64,
    #[serde(default, deserialize_with = "cell::text")]
    pub entry_content: String,
    #[serde(default, deserialize_with = "cell::datetime")]
    pub entry_created_at: Option<OffsetDateTime>,
    #[serde(deserialize_with = "cell::text")]
    pub entry_state: String,
    #[serde(default, deserialize_with = "cell::opt_id")]
    pub entry_parent_id: Option<i64>,
    #[serde(deserialize_with = "cell::id")]
    pub entry_posted_by_user_id: i64,
    #[serde(deserialize_with = "cell::id")]
    pub topic_id: i64,
}

mod cell {
    use serde::{de::Error, Deserialize, Deserializer};
    use serde_json::Value;
    use time::OffsetDateTime;

    use crate::ingest::dates::{is_missing, parse_datetime};

    fn as_id(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            }),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0 && f.is_finite())
                        .map(|f| f as i64)
                })
            }
            _ => None,
        }
    }

    fn is_blank(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => is_missing(s),
            Value::Number(n) => n.as_f64().map(f64::is_nan).unwrap_or(false),
            _ => false,
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(de)?;
        as_id(&value).ok_or_else(|| D::Error::custom(format!("invalid id {value}")))
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
        let value = Value::deserialize(de)?;
        if is_blank(&value) {
            return Ok(None);
        }
        as_id(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid id {value}")))
    }

    pub fn text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        match Value::deserialize(de)? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.trim().to_string()),
            other => Ok(other.to_string()),
        }
    }

    pub fn datetime<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        match Value::deserialize(de)? {
            Value::String(s) => Ok(parse_datetime(&s)),
            _ => Ok(None),
        }
    }
}
