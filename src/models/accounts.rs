use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Clone, Debug, Deserialize, Serialize, FromRow)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: String,
    pub account_type: String,
    pub created_at: chrono::NaiveDateTime,
}
