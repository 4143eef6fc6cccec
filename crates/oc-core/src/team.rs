//! A scoring team within a game room (spec.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u8,
    pub name: String,
    pub score: i32,
    pub vote: Option<String>,
}

impl Team {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Team {
            id,
            name: name.into(),
            score: 0,
            vote: None,
        }
    }
}
