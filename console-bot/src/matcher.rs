//! Resolves a partial `user_id` to candidate conversations.

use crate::dashboard::{ConversationRecord, DashboardClient, Session};
use crate::error::{ConsoleError, ConsoleResult};

/// Conversations whose `user_id` contains a search fragment, in listing order.
///
/// Indices shown to the user are 1-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSet {
    records: Vec<ConversationRecord>,
}

impl MatchSet {
    /// Keep the records whose `user_id` contains `fragment` (case-sensitive).
    pub fn filter(records: Vec<ConversationRecord>, fragment: &str) -> Self {
        Self {
            records: records
                .into_iter()
                .filter(|r| r.user_id.contains(fragment))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ConversationRecord] {
        &self.records
    }

    /// Resolve a user-typed 1-based index.
    pub fn select(&self, raw: &str) -> ConsoleResult<&ConversationRecord> {
        let index: usize = raw
            .trim()
            .parse()
            .map_err(|_| ConsoleError::Validation(format!("'{raw}' is not an index")))?;

        index
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
            .ok_or_else(|| {
                ConsoleError::Validation(format!("index {index} outside 1..={}", self.len()))
            })
    }

    /// Numbered listing of the matches for the user.
    pub fn render(&self) -> String {
        let mut text = format!(
            "找到 {} 个匹配的对话，请重新发送删除指令，并空格以参数附上要删除的目标序号数据：\n",
            self.len()
        );
        for (index, record) in self.records.iter().enumerate() {
            text.push_str(&format!("\n{}. {}", index + 1, record.user_id));
        }
        text
    }
}

/// Fetch the full listing and match it against `fragment`.
pub async fn find_by_fragment(
    client: &DashboardClient,
    session: &mut Session,
    fragment: &str,
) -> ConsoleResult<MatchSet> {
    let all = client.list_all_conversations(session).await?;
    let total = all.len();
    let matches = MatchSet::filter(all, fragment);
    tracing::debug!(fragment, total, matched = matches.len(), "Matched conversations by fragment");
    Ok(matches)
}
