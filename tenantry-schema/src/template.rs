//! Script templating.
//!
//! `<database>`, `<user>` and `<password>` are substituted literally. No
//! quoting or escaping is applied.

use crate::naming::SchemaIdentity;

pub const DATABASE: &str = "<database>";
pub const USER: &str = "<user>";
pub const PASSWORD: &str = "<password>";

/// An init or drop script with placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    text: String,
}

impl ScriptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn render(&self, database: &str, user: &str, password: &str) -> String {
        self.text
            .replace(DATABASE, database)
            .replace(USER, user)
            .replace(PASSWORD, password)
    }

    pub fn render_for(&self, identity: &SchemaIdentity) -> String {
        self.render(&identity.database, &identity.user, &identity.password)
    }
}
