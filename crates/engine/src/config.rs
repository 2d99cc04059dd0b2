use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::bucket::BucketSet;

/// Which status vocabulary a record stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusRule {
    /// App-In: any non-empty status is terminal once completed, "not passed"
    /// marks a rejection, an empty status means the case is still open.
    Application,
    /// Older report rules: "pending" or empty is open, anything else that
    /// carries a completion time is converted. No rejection state.
    Legacy,
    /// CA Final: only "completed" is terminal.
    Review,
}

/// Classification rules applied to one record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationProfile {
    pub status_rule: StatusRule,
    /// Converted records finished within this time count as "fastest".
    pub speed_threshold: TimeDelta,
    /// Whether rejections count toward the processed denominator.
    pub not_passed_is_processed: bool,
    pub buckets: BucketSet,
}

impl ClassificationProfile {
    pub fn standard() -> Self {
        Self {
            status_rule: StatusRule::Application,
            speed_threshold: TimeDelta::minutes(30),
            not_passed_is_processed: true,
            buckets: BucketSet::Standard,
        }
    }

    pub fn legacy() -> Self {
        Self {
            status_rule: StatusRule::Legacy,
            speed_threshold: TimeDelta::hours(1),
            not_passed_is_processed: false,
            buckets: BucketSet::Legacy,
        }
    }

    pub fn review() -> Self {
        Self {
            status_rule: StatusRule::Review,
            speed_threshold: TimeDelta::minutes(30),
            not_passed_is_processed: false,
            buckets: BucketSet::Standard,
        }
    }

    /// Application profile selected by name (`standard` or `legacy`).
    pub fn application_by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::standard()),
            "legacy" => Some(Self::legacy()),
            _ => None,
        }
    }

    /// Records that count as processed: converted ones, plus rejections when
    /// the profile counts them.
    pub fn processed(&self, converted: u64, not_passed: u64) -> u64 {
        if self.not_passed_is_processed {
            converted + not_passed
        } else {
            converted
        }
    }

    pub fn with_speed_threshold(mut self, threshold: TimeDelta) -> Self {
        self.speed_threshold = threshold;
        self
    }
}

/// Rewrites the product key of records whose type contains `needle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub needle: String,
    pub prefix: String,
}

/// A product label the upstream list uses for several distinct workflows.
/// Rules are tried in order; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAlias {
    pub product: String,
    pub rules: Vec<AliasRule>,
}

impl ProductAlias {
    pub fn matches_product(&self, product: &str) -> bool {
        self.product.trim().eq_ignore_ascii_case(product.trim())
    }

    /// Canonical prefix for a record type, if any rule matches.
    pub fn prefix_for(&self, category: &str) -> Option<&str> {
        let category = category.to_lowercase();
        self.rules
            .iter()
            .find(|rule| category.contains(&rule.needle.to_lowercase()))
            .map(|rule| rule.prefix.as_str())
    }
}

/// Built-in alias table: the C4C product covers transfer, top-up and
/// normal refinancing, which are tracked separately.
pub fn default_product_aliases() -> Vec<ProductAlias> {
    vec![ProductAlias {
        product: "C4C".to_string(),
        rules: vec![
            AliasRule {
                needle: "transfer".to_string(),
                prefix: "C4C Transfer".to_string(),
            },
            AliasRule {
                needle: "topup".to_string(),
                prefix: "C4C Topup".to_string(),
            },
            AliasRule {
                needle: "normal".to_string(),
                prefix: "C4C Normal".to_string(),
            },
        ],
    }]
}

/// Parse an alias table from its JSON form:
/// `[{"product": "C4C", "rules": [{"needle": "topup", "prefix": "C4C Topup"}]}]`.
pub fn parse_product_aliases(json: &str) -> Result<Vec<ProductAlias>, serde_json::Error> {
    serde_json::from_str(json)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub application: ClassificationProfile,
    pub review: ClassificationProfile,
    /// Pending records open longer than this need attention.
    pub stale_after: TimeDelta,
    /// Completions faster than this are treated as data-entry artifacts
    /// when looking for the best time.
    pub best_time_floor: TimeDelta,
    pub leaderboard_size: usize,
    pub product_aliases: Vec<ProductAlias>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            application: ClassificationProfile::standard(),
            review: ClassificationProfile::review(),
            stale_after: TimeDelta::hours(5),
            best_time_floor: TimeDelta::minutes(1),
            leaderboard_size: 5,
            product_aliases: default_product_aliases(),
        }
    }
}

impl EngineConfig {
    pub fn application_rules(&self) -> StreamRules {
        self.rules_for(self.application)
    }

    pub fn review_rules(&self) -> StreamRules {
        self.rules_for(self.review)
    }

    fn rules_for(&self, profile: ClassificationProfile) -> StreamRules {
        StreamRules {
            profile,
            stale_after: self.stale_after,
            best_time_floor: self.best_time_floor,
        }
    }
}

/// Everything the calculator needs to evaluate one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRules {
    pub profile: ClassificationProfile,
    pub stale_after: TimeDelta,
    pub best_time_floor: TimeDelta,
}
