//! Prompt construction for SQL generation

use crate::nl_sql::datasets::DatasetDescriptor;
use crate::nl_sql::dialect::SqlDialect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One chat message sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Prompt generator for dataset-grounded SQL questions
pub struct PromptGenerator;

impl PromptGenerator {
    /// Build the system + user message pair for a question
    pub fn build(
        question: &str,
        descriptor: &DatasetDescriptor,
        dialect: SqlDialect,
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(Self::system_prompt(dialect)),
            ChatMessage::user(Self::user_prompt(question, descriptor, dialect)),
        ]
    }

    pub fn system_prompt(dialect: SqlDialect) -> String {
        format!("You are an expert SQL generator for {}.", dialect.dialect_name())
    }

    /// Rules, examples, instruction, question and DDL, in that order.
    /// The DDL block is embedded whole.
    pub fn user_prompt(question: &str, descriptor: &DatasetDescriptor, dialect: SqlDialect) -> String {
        let mut prompt = String::with_capacity(
            descriptor.rules.len() + descriptor.examples.len() + descriptor.ddl.len() + question.len() + 256,
        );

        prompt.push_str(descriptor.rules.trim());
        prompt.push_str("\n\n### BAD <-> GOOD EXAMPLES\n");
        prompt.push_str(descriptor.examples.trim());
        prompt.push_str(&format!(
            "\n\nWrite only a single {} SELECT statement.\n",
            dialect.dialect_name()
        ));
        prompt.push_str("\n### QUESTION\n");
        prompt.push_str(question.trim());
        prompt.push_str("\n\n### DDL BLOCK (stay faithful to this DDL)\n");
        prompt.push_str(descriptor.ddl);
        prompt.push_str("\n\nSQL:");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nl_sql::datasets::get_descriptor;

    #[test]
    fn test_system_prompt_names_dialect() {
        let prompt = PromptGenerator::system_prompt(SqlDialect::SqlServer);
        assert!(prompt.contains("Microsoft SQL Server"));
        assert!(prompt.contains("SQL generator"));
    }

    #[test]
    fn test_build_returns_system_then_user() {
        let descriptor = get_descriptor(1).unwrap();
        let messages = PromptGenerator::build("List factories", descriptor, SqlDialect::SqlServer);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_user_prompt_section_order() {
        let descriptor = get_descriptor(1).unwrap();
        let prompt = PromptGenerator::user_prompt(
            "List factories and their machines",
            descriptor,
            SqlDialect::SqlServer,
        );

        let rules = prompt.find("JOIN HIERARCHY").unwrap();
        let examples = prompt.find("BAD <-> GOOD").unwrap();
        let instruction = prompt.find("Write only a single").unwrap();
        let question = prompt.find("List factories and their machines").unwrap();
        let ddl = prompt.find("CREATE TABLE PlcTag").unwrap();

        assert!(rules < examples);
        assert!(examples < instruction);
        assert!(instruction < question);
        assert!(question < ddl);
    }

    #[test]
    fn test_user_prompt_uses_only_selected_rules() {
        let descriptor = get_descriptor(3).unwrap();
        let prompt = PromptGenerator::user_prompt("Average efficiency", descriptor, SqlDialect::SqlServer);

        assert!(prompt.contains("Pursu_hat_verileri"));
        assert!(!prompt.contains("JOIN HIERARCHY"));
    }

    #[test]
    fn test_ddl_is_never_truncated() {
        let descriptor = get_descriptor(1).unwrap();
        let long_question = "machines ".repeat(10_000);
        let prompt = PromptGenerator::user_prompt(&long_question, descriptor, SqlDialect::SqlServer);

        assert!(prompt.contains(descriptor.ddl));
    }

    #[test]
    fn test_chat_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
