use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::models::resume::scalar_text;

/// Row of the application's `job` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub description: String,
    /// JSON array of strings in practice; a bare string is tolerated.
    pub requirements: Option<Value>,
    pub location: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub employment_type: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

impl JobRecord {
    pub fn requirement_list(&self) -> Vec<String> {
        match &self.requirements {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(other) => scalar_text(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(requirements: Option<Value>) -> JobRecord {
        JobRecord {
            id: 3,
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            description: "Build APIs".to_string(),
            requirements,
            location: None,
            salary_min: None,
            salary_max: None,
            employment_type: None,
            category: None,
            is_active: Some(true),
        }
    }

    #[test]
    fn test_requirement_list_from_array() {
        let j = job(Some(json!(["Rust", "", "SQL"])));
        assert_eq!(j.requirement_list(), vec!["Rust", "SQL"]);
    }

    #[test]
    fn test_requirement_list_from_bare_string() {
        let j = job(Some(json!("5 years of Go")));
        assert_eq!(j.requirement_list(), vec!["5 years of Go"]);
    }

    #[test]
    fn test_requirement_list_missing() {
        assert!(job(None).requirement_list().is_empty());
    }
}
