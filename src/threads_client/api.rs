use serde::{Deserialize, Serialize};

/// Media type of entries that merely re-share someone else's post.
pub const REPOST_FACADE: &str = "REPOST_FACADE";

pub const POST_FIELDS: &str = "id,media_type,permalink,text,timestamp";

pub const INSIGHT_METRICS: &str = "views,likes,replies,reposts,quotes,shares";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response<Data> {
    pub data: Data,
    pub paging: Option<Paging>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Paging {
    pub cursors: Option<Cursors>,
    pub next: Option<String>,
}

impl Paging {
    /// The `after` cursor, but only while the server still advertises a next page.
    pub fn next_cursor(&self) -> Option<String> {
        self.next.as_ref()?;
        self.cursors.as_ref()?.after.clone()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cursors {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// A listing entry exactly as the API sends it; nothing is trusted until
/// [crate::post::PostDraft::try_from] has looked at it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Post {
    pub id: Option<String>,
    pub media_type: Option<String>,
    pub permalink: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Insight {
    pub name: String,
    pub period: Option<String>,
    pub values: Option<Vec<InsightValue>>,
    pub total_value: Option<InsightValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: GraphError,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphError {
    pub message: String,
    pub r#type: Option<String>,
    pub code: Option<i64>,
    pub error_subcode: Option<i64>,
}
