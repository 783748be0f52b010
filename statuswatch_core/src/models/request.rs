//! Query parameters accepted by the API

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct SelectionQuery {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub more: Option<String>,
}

impl StatusQuery {
    pub fn verbose(&self) -> bool {
        self.more.as_deref() == Some("true")
    }
}
