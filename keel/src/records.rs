use chrono::{DateTime, Utc};
use keel_orm::Record;
use serde::Serialize;

#[derive(Debug, Clone, Default, Record, Serialize)]
pub struct User {
    #[orm("primaryKey;autoIncrement")]
    pub id: i64,
    #[orm("size:50;uniqueIndex")]
    pub username: String,
    pub age: i32,
    pub email: Option<String>,
    #[orm("default:CURRENT_TIMESTAMP")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Record, Serialize)]
pub struct Account {
    #[orm("primaryKey;autoIncrement")]
    pub id: i64,
    #[orm("index")]
    pub user_id: i64,
    #[orm("column:type;size:21")]
    pub r#type: String,
}
