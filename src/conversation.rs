//! Conversation history for an agent
//!
//! A Conversation is an ordered, append-only list of Turns. Turn 0 is always
//! the system turn. An optional memory-context turn lives at index 1 and is
//! replaced in place rather than duplicated.

use serde_json::{Map, Value};

/// Role of the turn author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// Backend-specific marker requesting reuse of the prompt prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheControl {
    Ephemeral,
}

/// Content of a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Plain text
    Text(String),
    /// Text block that may carry a cache annotation
    Block {
        text: String,
        cache: Option<CacheControl>,
    },
}

impl Content {
    pub fn text(&self) -> &str {
        match self {
            Content::Text(text) => text,
            Content::Block { text, .. } => text,
        }
    }

    pub fn is_cache_annotated(&self) -> bool {
        matches!(self, Content::Block { cache: Some(_), .. })
    }

    /// Strip the cache annotation, keeping the block shape
    pub fn clear_cache(&mut self) {
        if let Content::Block { cache, .. } = self {
            *cache = None;
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// One role-tagged entry in the conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: Content,
    /// Tool-call directives (assistant turns only)
    pub tool_calls: Vec<ToolCall>,
    /// Correlation id (tool turns only)
    pub tool_call_id: Option<String>,
}

impl Turn {
    pub fn system(content: impl Into<Content>) -> Self {
        Self::plain(Role::System, content.into())
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::plain(Role::User, content.into())
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Content::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn text(&self) -> &str {
        self.content.text()
    }
}

/// Ordered turn history owned by a single agent
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    has_memory: bool,
}

impl Conversation {
    /// Start a conversation with its system turn
    pub fn new(system: impl Into<Content>) -> Self {
        Self {
            turns: vec![Turn::system(system)],
            has_memory: false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn system(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn has_memory(&self) -> bool {
        self.has_memory
    }

    pub fn memory(&self) -> Option<&Turn> {
        if self.has_memory {
            self.turns.get(1)
        } else {
            None
        }
    }

    /// Append a turn. System turns are rejected: there is exactly one.
    pub fn push(&mut self, turn: Turn) {
        debug_assert!(turn.role != Role::System, "system turn is fixed at index 0");
        debug_assert!(
            turn.role != Role::Tool || self.is_known_call_id(turn.tool_call_id.as_deref()),
            "tool turn without a matching tool call"
        );
        self.turns.push(turn);
    }

    /// Install, replace or remove the memory-context turn at index 1
    pub fn set_memory(&mut self, content: Option<Content>) {
        match (content, self.has_memory) {
            (Some(content), true) => self.turns[1] = Turn::user(content),
            (Some(content), false) => {
                self.turns.insert(1, Turn::user(content));
                self.has_memory = true;
            },
            (None, true) => {
                self.turns.remove(1);
                self.has_memory = false;
            },
            (None, false) => {},
        }
    }

    /// Truncate to [system] or [system, memory]
    pub fn reset(&mut self) {
        let keep = if self.has_memory { 2 } else { 1 };
        self.turns.truncate(keep);
    }

    /// Most recent user turn after the memory turn, if any
    pub fn last_user_mut(&mut self) -> Option<&mut Turn> {
        let floor = if self.has_memory { 2 } else { 1 };
        self.turns
            .iter_mut()
            .skip(floor)
            .rev()
            .find(|t| t.role == Role::User)
    }

    /// Number of cache-annotated user turns, the memory turn included
    pub fn annotated_user_turns(&self) -> usize {
        annotated_user_turns(&self.turns)
    }

    fn is_known_call_id(&self, id: Option<&str>) -> bool {
        let Some(id) = id else { return false };
        self.turns
            .iter()
            .filter(|t| t.role == Role::Assistant)
            .flat_map(|t| t.tool_calls.iter())
            .any(|c| c.id == id)
    }

    /// Check that every tool turn answers an earlier tool call
    pub fn is_well_formed(&self) -> bool {
        if self.turns.first().map(|t| t.role) != Some(Role::System) {
            return false;
        }
        let mut seen: Vec<&str> = Vec::new();
        for turn in &self.turns {
            match turn.role {
                Role::Assistant => seen.extend(turn.tool_calls.iter().map(|c| c.id.as_str())),
                Role::Tool => match turn.tool_call_id.as_deref() {
                    Some(id) if seen.contains(&id) => {},
                    _ => return false,
                },
                _ => {},
            }
        }
        true
    }
}

/// Count cache-annotated user turns in a slice of history
pub fn annotated_user_turns(turns: &[Turn]) -> usize {
    turns
        .iter()
        .filter(|t| t.role == Role::User && t.content.is_cache_annotated())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "Bash", Map::new())
    }

    #[test]
    fn test_new_starts_with_system() {
        let conv = Conversation::new("sys");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.system().role, Role::System);
        assert!(conv.is_well_formed());
    }

    #[test]
    fn test_reset_without_memory() {
        let mut conv = Conversation::new("sys");
        conv.push(Turn::user("hi"));
        conv.push(Turn::assistant("hello", vec![]));
        conv.reset();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.system().text(), "sys");
    }

    #[test]
    fn test_reset_with_memory_keeps_two_turns() {
        let mut conv = Conversation::new("sys");
        conv.set_memory(Some("<system-reminder>ctx</system-reminder>".into()));
        for i in 0..5 {
            conv.push(Turn::user(format!("q{}", i)));
            conv.push(Turn::assistant(format!("a{}", i), vec![]));
        }
        conv.reset();
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.turns()[0].role, Role::System);
        assert_eq!(conv.memory().map(|t| t.text()), Some("<system-reminder>ctx</system-reminder>"));
    }

    #[test]
    fn test_memory_replaced_in_place() {
        let mut conv = Conversation::new("sys");
        conv.set_memory(Some("first".into()));
        conv.push(Turn::user("q"));
        conv.set_memory(Some("second".into()));
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.turns()[1].text(), "second");
        assert_eq!(conv.turns()[2].text(), "q");

        conv.set_memory(None);
        assert_eq!(conv.len(), 2);
        assert!(!conv.has_memory());
        assert_eq!(conv.turns()[1].text(), "q");
    }

    #[test]
    fn test_last_user_skips_memory() {
        let mut conv = Conversation::new("sys");
        conv.set_memory(Some("mem".into()));
        assert!(conv.last_user_mut().is_none());
        conv.push(Turn::user("q"));
        assert_eq!(conv.last_user_mut().map(|t| t.text().to_string()), Some("q".to_string()));
    }

    #[test]
    fn test_well_formed_tool_turns() {
        let mut conv = Conversation::new("sys");
        conv.push(Turn::user("q"));
        conv.push(Turn::assistant("", vec![call("c1"), call("c2")]));
        conv.push(Turn::tool("c1", "r1"));
        conv.push(Turn::tool("c2", "r2"));
        assert!(conv.is_well_formed());
    }

    #[test]
    fn test_clear_cache_keeps_text() {
        let mut content = Content::Block {
            text: "x".into(),
            cache: Some(CacheControl::Ephemeral),
        };
        assert!(content.is_cache_annotated());
        content.clear_cache();
        assert!(!content.is_cache_annotated());
        assert_eq!(content.text(), "x");
    }
}
