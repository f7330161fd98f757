//! Activity logs: the free-form progress records behind each action item

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::goals;
use crate::error::{MandalartError, Result};

pub const LOG_TYPES: [&str; 4] = ["note", "metric", "media", "link"];

pub(crate) fn default_log_type() -> String {
    "note".to_string()
}

#[derive(Debug, Clone)]
pub struct ActivityLogRow {
    pub id: String,
    pub action_item_id: String,
    pub log_type: String,
    pub body: Option<String>,
    pub value: Option<f64>,
    pub url: Option<String>,
    pub logged_at: String,
    pub created_at: String,
}

impl ActivityLogRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            action_item_id: row.get("action_item_id")?,
            log_type: row.get("log_type")?,
            body: row.get("body")?,
            value: row.get("value")?,
            url: row.get("url")?,
            logged_at: row.get("logged_at")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLogInput {
    #[serde(default = "default_log_type")]
    pub log_type: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub logged_at: Option<String>,
}

/// Each log type carries one required payload field
pub(crate) fn validate_log_fields(
    log_type: &str,
    body: &Option<String>,
    value: &Option<f64>,
    url: &Option<String>,
) -> Result<()> {
    if !LOG_TYPES.contains(&log_type) {
        return Err(MandalartError::InvalidInput(format!(
            "Invalid log type '{}', expected one of: {}",
            log_type,
            LOG_TYPES.join(", ")
        )));
    }
    match log_type {
        "note" if body.as_deref().map_or(true, |b| b.trim().is_empty()) => Err(
            MandalartError::InvalidInput("A 'note' log requires a body".to_string()),
        ),
        "metric" if value.is_none() => Err(MandalartError::InvalidInput(
            "A 'metric' log requires a value".to_string(),
        )),
        "media" | "link" if url.as_deref().map_or(true, |u| u.trim().is_empty()) => {
            Err(MandalartError::InvalidInput(format!(
                "A '{}' log requires a url",
                log_type
            )))
        }
        _ => Ok(()),
    }
}

/// Accept either SQLite datetime format or RFC 3339, storing the former
pub(crate) fn normalize_timestamp(ts: &str) -> Result<String> {
    if chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").is_ok() {
        return Ok(ts.to_string());
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(ts) {
        return Ok(parsed
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string());
    }
    Err(MandalartError::InvalidInput(format!(
        "Invalid timestamp '{}', expected RFC 3339 or YYYY-MM-DD HH:MM:SS",
        ts
    )))
}

pub fn create_log(
    conn: &Connection,
    user_id: &str,
    action_item_id: &str,
    input: &CreateLogInput,
) -> Result<ActivityLogRow> {
    validate_log_fields(&input.log_type, &input.body, &input.value, &input.url)?;
    let logged_at = match &input.logged_at {
        Some(ts) => normalize_timestamp(ts)?,
        None => chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    if goals::get_action_item(conn, user_id, action_item_id)?.is_none() {
        return Err(MandalartError::NotFound("Action item not found".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO activity_logs (id, action_item_id, log_type, body, value, url, logged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            action_item_id,
            input.log_type,
            input.body,
            input.value,
            input.url,
            logged_at
        ],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    get_log(conn, &id)?
        .ok_or_else(|| MandalartError::Internal("Log not found after insert".to_string()))
}

fn get_log(conn: &Connection, id: &str) -> Result<Option<ActivityLogRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM activity_logs WHERE id = ?1")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(ActivityLogRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Newest-first page of an action's logs
pub fn list_logs(
    conn: &Connection,
    user_id: &str,
    action_item_id: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<ActivityLogRow>> {
    if goals::get_action_item(conn, user_id, action_item_id)?.is_none() {
        return Err(MandalartError::NotFound("Action item not found".to_string()));
    }

    let mut stmt = conn
        .prepare(
            "SELECT * FROM activity_logs WHERE action_item_id = ?1
             ORDER BY logged_at DESC, created_at DESC
             LIMIT ?2 OFFSET ?3",
        )
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let logs = stmt
        .query_map(
            params![action_item_id, limit as i64, offset as i64],
            |row| ActivityLogRow::from_row(row),
        )
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;

    Ok(logs)
}

/// All logs of an action oldest-first, for export. The caller is expected
/// to have verified ownership of the parent chain.
pub(crate) fn logs_for_action(conn: &Connection, action_item_id: &str) -> Result<Vec<ActivityLogRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT * FROM activity_logs WHERE action_item_id = ?1
             ORDER BY logged_at ASC, created_at ASC",
        )
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let logs = stmt
        .query_map(params![action_item_id], |row| ActivityLogRow::from_row(row))
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;

    Ok(logs)
}

pub fn delete_log(conn: &Connection, user_id: &str, id: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM activity_logs
             WHERE id = ?1
               AND action_item_id IN (
                   SELECT a.id FROM action_items a
                   JOIN sub_goals sg ON sg.id = a.sub_goal_id
                   JOIN primary_goals g ON g.id = sg.goal_id
                   WHERE g.user_id = ?2
               )",
            params![id, user_id],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::goals::{
        create_action_item, create_goal, create_sub_goal, delete_action_item, CreateActionInput,
        CreateGoalInput, CreateSubGoalInput,
    };
    use crate::db::users::create_user;
    use crate::db::GoalDb;

    fn db_with_action() -> (GoalDb, String, String) {
        let db = GoalDb::open_in_memory().unwrap();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();
        let goal = db
            .with_conn_mut(|conn| {
                create_goal(
                    conn,
                    &user.id,
                    &CreateGoalInput {
                        title: "Run a marathon".to_string(),
                        description: None,
                    },
                )
            })
            .unwrap();
        let sub_goal = db
            .with_conn_mut(|conn| {
                create_sub_goal(
                    conn,
                    &user.id,
                    &goal.id,
                    &CreateSubGoalInput {
                        position: 1,
                        title: "Endurance".to_string(),
                        description: None,
                    },
                )
            })
            .unwrap();
        let action = db
            .with_conn_mut(|conn| {
                create_action_item(
                    conn,
                    &user.id,
                    &sub_goal.id,
                    &CreateActionInput {
                        position: 1,
                        title: "Weekly long run".to_string(),
                        description: None,
                        due_date: None,
                    },
                )
            })
            .unwrap();
        (db, user.id, action.id)
    }

    fn note(body: &str) -> CreateLogInput {
        CreateLogInput {
            log_type: "note".to_string(),
            body: Some(body.to_string()),
            value: None,
            url: None,
            logged_at: None,
        }
    }

    #[test]
    fn each_log_type_requires_its_payload() {
        let (db, user_id, action_id) = db_with_action();

        let cases: Vec<CreateLogInput> = vec![
            // note without body
            CreateLogInput {
                log_type: "note".to_string(),
                body: None,
                value: Some(5.0),
                url: None,
                logged_at: None,
            },
            // metric without value
            CreateLogInput {
                log_type: "metric".to_string(),
                body: Some("distance".to_string()),
                value: None,
                url: None,
                logged_at: None,
            },
            // link without url
            CreateLogInput {
                log_type: "link".to_string(),
                body: None,
                value: None,
                url: None,
                logged_at: None,
            },
            // unknown type
            CreateLogInput {
                log_type: "photo".to_string(),
                body: Some("x".to_string()),
                value: None,
                url: None,
                logged_at: None,
            },
        ];

        for input in cases {
            let err = db
                .with_conn(|conn| create_log(conn, &user_id, &action_id, &input))
                .unwrap_err();
            assert!(matches!(err, MandalartError::InvalidInput(_)));
        }
    }

    #[test]
    fn metric_and_link_logs_roundtrip() {
        let (db, user_id, action_id) = db_with_action();

        let metric = db
            .with_conn(|conn| {
                create_log(
                    conn,
                    &user_id,
                    &action_id,
                    &CreateLogInput {
                        log_type: "metric".to_string(),
                        body: Some("distance km".to_string()),
                        value: Some(21.1),
                        url: None,
                        logged_at: None,
                    },
                )
            })
            .unwrap();
        assert_eq!(metric.value, Some(21.1));

        let link = db
            .with_conn(|conn| {
                create_log(
                    conn,
                    &user_id,
                    &action_id,
                    &CreateLogInput {
                        log_type: "link".to_string(),
                        body: None,
                        value: None,
                        url: Some("https://example.com/strava/123".to_string()),
                        logged_at: None,
                    },
                )
            })
            .unwrap();
        assert_eq!(link.url.as_deref(), Some("https://example.com/strava/123"));
    }

    #[test]
    fn listing_is_newest_first_with_pagination() {
        let (db, user_id, action_id) = db_with_action();

        for (i, day) in ["2026-01-01", "2026-01-02", "2026-01-03"].iter().enumerate() {
            db.with_conn(|conn| {
                create_log(
                    conn,
                    &user_id,
                    &action_id,
                    &CreateLogInput {
                        log_type: "note".to_string(),
                        body: Some(format!("entry {}", i)),
                        value: None,
                        url: None,
                        logged_at: Some(format!("{} 08:00:00", day)),
                    },
                )
            })
            .unwrap();
        }

        let page = db
            .with_conn(|conn| list_logs(conn, &user_id, &action_id, 2, 0))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].body.as_deref(), Some("entry 2"));

        let rest = db
            .with_conn(|conn| list_logs(conn, &user_id, &action_id, 2, 2))
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].body.as_deref(), Some("entry 0"));
    }

    #[test]
    fn logs_against_an_unknown_action_are_not_found() {
        let (db, user_id, _action_id) = db_with_action();
        let err = db
            .with_conn(|conn| create_log(conn, &user_id, "nonexistent", &note("hi")))
            .unwrap_err();
        assert!(matches!(err, MandalartError::NotFound(_)));
    }

    #[test]
    fn delete_is_scoped_to_the_owner() {
        let (db, user_id, action_id) = db_with_action();
        let log = db
            .with_conn(|conn| create_log(conn, &user_id, &action_id, &note("mine")))
            .unwrap();

        let rival = db
            .with_conn_mut(|conn| create_user(conn, "rival", "hash", None))
            .unwrap();
        assert!(!db
            .with_conn(|conn| delete_log(conn, &rival.id, &log.id))
            .unwrap());
        assert!(db
            .with_conn(|conn| delete_log(conn, &user_id, &log.id))
            .unwrap());
    }

    #[test]
    fn deleting_the_action_cascades_to_logs() {
        let (db, user_id, action_id) = db_with_action();
        db.with_conn(|conn| create_log(conn, &user_id, &action_id, &note("soon gone")))
            .unwrap();

        db.with_conn(|conn| delete_action_item(conn, &user_id, &action_id))
            .unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))
                    .map_err(|e| MandalartError::Database(e.to_string()))
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn rfc3339_timestamps_are_normalized() {
        assert_eq!(
            normalize_timestamp("2026-03-01T08:30:00Z").unwrap(),
            "2026-03-01 08:30:00"
        );
        assert_eq!(
            normalize_timestamp("2026-03-01 08:30:00").unwrap(),
            "2026-03-01 08:30:00"
        );
        assert!(normalize_timestamp("yesterday").is_err());
    }
}
