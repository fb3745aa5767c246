use serde::{Deserialize, Serialize};

/// Identifier of a filtering rule. Positive, unique, monotonically allocated.
pub type RuleId = i64;

/// What the engine should do with a matching request.
///
/// Serialized as a tagged object (`{"type": "block"}`) so exported rules
/// stay compatible with the engine's own rule shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    Block,
    Allow,
    AllowAllRequests,
    UpgradeScheme,
    Redirect { redirect: RedirectTarget },
}

/// Target of a redirect action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub url: String,
}

impl RuleAction {
    /// Collapses the action to its kind, dropping any payload.
    pub fn kind(&self) -> ActionKind {
        match self {
            RuleAction::Block => ActionKind::Block,
            RuleAction::Allow => ActionKind::Allow,
            RuleAction::AllowAllRequests => ActionKind::AllowAllRequests,
            RuleAction::UpgradeScheme => ActionKind::UpgradeScheme,
            RuleAction::Redirect { .. } => ActionKind::Redirect,
        }
    }
}

/// Action discriminant without payload, used for log entries and log filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Block,
    Allow,
    AllowAllRequests,
    UpgradeScheme,
    Redirect,
}

impl ActionKind {
    /// Stable lowercase label, used as the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Block => "block",
            ActionKind::Allow => "allow",
            ActionKind::AllowAllRequests => "allowAllRequests",
            ActionKind::UpgradeScheme => "upgradeScheme",
            ActionKind::Redirect => "redirect",
        }
    }

    /// Parses the storage representation back. Unknown labels map to `Block`,
    /// matching the fallback used when a match cannot be resolved to a rule.
    pub fn parse(label: &str) -> ActionKind {
        match label {
            "allow" => ActionKind::Allow,
            "allowAllRequests" => ActionKind::AllowAllRequests,
            "upgradeScheme" => ActionKind::UpgradeScheme,
            "redirect" => ActionKind::Redirect,
            _ => ActionKind::Block,
        }
    }
}

/// Resource types a rule condition can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Other,
}

/// Pattern and scope a rule applies to.
///
/// At most one of `url_filter` / `regex_filter` may be populated.
/// `resource_types: None` means the rule applies to all resource types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<ResourceType>>,
}

impl RuleCondition {
    /// The populated filter pattern, whichever field carries it.
    pub fn pattern(&self) -> Option<&str> {
        self.url_filter
            .as_deref()
            .or(self.regex_filter.as_deref())
            .filter(|p| !p.is_empty())
    }
}

fn default_enabled() -> bool {
    true
}

/// A stored filtering rule.
///
/// Wire shape is camelCase (`urlFilter`, `resourceTypes`) so exports remain
/// re-importable against rule lists produced by the engine itself; records
/// without an `enabled` key deserialize as enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: RuleId,
    pub priority: i32,
    pub action: RuleAction,
    pub condition: RuleCondition,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Input for creating a rule. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub priority: i32,
    pub action: RuleAction,
    pub condition: RuleCondition,
    pub enabled: bool,
}

impl RuleDraft {
    /// A priority-1, enabled block rule on a URL substring filter.
    pub fn block(filter: &str) -> Self {
        Self {
            priority: 1,
            action: RuleAction::Block,
            condition: RuleCondition {
                url_filter: Some(filter.to_string()),
                regex_filter: None,
                resource_types: None,
            },
            enabled: true,
        }
    }
}

/// Partial update of an existing rule. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub priority: Option<i32>,
    pub action: Option<RuleAction>,
    pub condition: Option<RuleCondition>,
}
