use crate::llm::types::{ChatMessage, Role};

/// The conversation log sent to the model.
///
/// Element 0 is always the system message. Every mutation keeps it in place;
/// nothing here ever removes it.
#[derive(Debug, Clone)]
pub struct Transcript {
    system_prompt: String,
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new("")
    }
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.system_prompt = system_prompt.into();
        let system = ChatMessage::system(self.system_prompt.clone());
        match self.messages.first_mut() {
            Some(first) => *first = system,
            None => self.messages.push(system),
        }
    }

    /// Collapses the log back to a single system message.
    pub fn reset(&mut self, system_prompt: Option<&str>) {
        if let Some(prompt) = system_prompt {
            self.system_prompt = prompt.to_string();
        }
        self.messages.clear();
        self.messages.push(ChatMessage::system(self.system_prompt.clone()));
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add_message(ChatMessage::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.add_message(ChatMessage::assistant(content));
    }

    /// Drops the last two messages, typically a failed user/assistant
    /// exchange. Returns `false` and leaves the log untouched when fewer than
    /// two non-system messages exist.
    pub fn truncate_last_pair(&mut self) -> bool {
        if self.messages.len() < 3 {
            return false;
        }
        self.messages.truncate(self.messages.len() - 2);
        true
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> &ChatMessage {
        // index 0 always exists
        &self.messages[self.messages.len() - 1]
    }

    pub fn last_by_role(&self, role: Role) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    pub fn last_content(&self) -> &str {
        &self.last().content
    }

    pub fn last_assistant_content(&self) -> &str {
        self.last_by_role(Role::Assistant)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// Experimental: builds a copy of the log with user and assistant roles
    /// swapped pairwise, skipping the first exchange and the last two
    /// messages. Returns the transposed messages and the content of the last
    /// transposed prompt. Not used by the tool-call loop.
    pub fn transposed_prompt_state(&self) -> (Vec<ChatMessage>, String) {
        let mut transposed = vec![self.messages[0].clone()];
        let mut prompt = String::new();
        let end = self.messages.len().saturating_sub(2);
        let mut i = 2;
        while i < end {
            let mut as_user = self.messages[i].clone();
            as_user.role = Role::User;
            let mut as_assistant = self.messages[i + 1].clone();
            as_assistant.role = Role::Assistant;
            prompt = as_user.content.clone();
            transposed.push(as_user);
            transposed.push(as_assistant);
            i += 2;
        }
        (transposed, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_system_first(t: &Transcript) {
        assert!(t.len() >= 1);
        assert_eq!(t.all()[0].role, Role::System);
    }

    #[test]
    fn new_transcript_has_system_slot() {
        let t = Transcript::new("be brief");
        assert_eq!(t.len(), 1);
        assert_eq!(t.all()[0].content, "be brief");
        assert_eq!(t.last().role, Role::System);
    }

    #[test]
    fn set_system_prompt_replaces_in_place() {
        let mut t = Transcript::new("one");
        t.add_user("hi");
        t.set_system_prompt("two");
        t.set_system_prompt("three");
        assert_eq!(t.len(), 2);
        assert_eq!(t.all()[0].content, "three");
        assert_eq!(t.system_prompt(), "three");
        assert_system_first(&t);
    }

    #[test]
    fn truncate_last_pair_needs_two_non_system_messages() {
        let mut t = Transcript::new("sys");
        assert!(!t.truncate_last_pair());
        t.add_user("q");
        assert!(!t.truncate_last_pair());
        assert_eq!(t.len(), 2);
        t.add_assistant("a");
        assert!(t.truncate_last_pair());
        assert_eq!(t.len(), 1);
        assert_system_first(&t);
    }

    #[test]
    fn reset_keeps_or_replaces_prompt() {
        let mut t = Transcript::new("sys");
        t.add_user("q");
        t.add_assistant("a");
        t.reset(None);
        assert_eq!(t.len(), 1);
        assert_eq!(t.all()[0].content, "sys");
        t.add_user("q2");
        t.reset(Some("new"));
        assert_eq!(t.len(), 1);
        assert_eq!(t.all()[0].content, "new");
    }

    #[test]
    fn invariant_holds_over_mixed_operations() {
        let mut t = Transcript::default();
        for i in 0..20 {
            match i % 6 {
                0 => t.add_user(format!("u{i}")),
                1 => t.add_assistant(format!("a{i}")),
                2 => {
                    t.truncate_last_pair();
                }
                3 => t.set_system_prompt(format!("s{i}")),
                4 => t.add_message(ChatMessage::tool_result("c", "OK")),
                _ => {
                    t.truncate_last_pair();
                    t.truncate_last_pair();
                }
            }
            assert_system_first(&t);
        }
        t.reset(None);
        assert_system_first(&t);
    }

    #[test]
    fn last_by_role_searches_backwards() {
        let mut t = Transcript::new("sys");
        t.add_user("q1");
        t.add_assistant("a1");
        t.add_user("q2");
        assert_eq!(t.last_by_role(Role::User).unwrap().content, "q2");
        assert_eq!(t.last_assistant_content(), "a1");
        assert!(t.last_by_role(Role::Tool).is_none());
        assert_eq!(t.last_content(), "q2");
    }

    #[test]
    fn transposed_state_swaps_roles() {
        let mut t = Transcript::new("sys");
        t.add_user("q1");
        t.add_assistant("a1");
        t.add_user("q2");
        t.add_assistant("a2");
        t.add_user("q3");
        t.add_assistant("a3");
        let (msgs, prompt) = t.transposed_prompt_state();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "a1");
        assert_eq!(msgs[2].role, Role::Assistant);
        assert_eq!(msgs[2].content, "q2");
        assert_eq!(msgs[4].content, "q3");
        assert_eq!(prompt, "a2");
    }
}
