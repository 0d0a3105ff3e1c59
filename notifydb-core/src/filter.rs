//! Translation of client-supplied filters into native store filters.
//!
//! Clients send loosely-typed filters: lower-case keys with string values taken straight from
//! a query string. Each entity kind declares a [`KindSchema`] that says which client keys map
//! to which native fields, how their values are coerced, and which native fields must exist
//! when the client does not constrain them. [`FilterNormalizer`] interprets those tables.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use notifydb_core::filter::{EntityKind, FilterNormalizer};
//!
//! let native = FilterNormalizer::default()
//!     .normalize(Some(EntityKind::Message), &doc! { "actorid": "1", "seen": "true" })?;
//!
//! assert_eq!(native.get_i32("actorID")?, 1);
//! assert_eq!(native.get_bool("seen")?, true);
//! assert!(!native.contains_key("actorid"));
//! ```

use bson::{Bson, Document, doc};
use tracing::warn;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// How a client-supplied value is converted before it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Decimal string to integer. Stored as `Int32` when it fits, `Int64` otherwise.
    Integer,
    /// Boolean literal (`1`, `t`, `true`, `0`, `f`, `false`, ...) to boolean.
    Boolean,
    /// Value passed through untouched.
    Text,
}

impl Coercion {
    fn expected(&self) -> &'static str {
        match self {
            Coercion::Integer => "an integer",
            Coercion::Boolean => "a boolean",
            Coercion::Text => "a string",
        }
    }

    fn apply(&self, value: &Bson) -> Option<Bson> {
        match (self, value) {
            (Coercion::Integer, Bson::String(s)) => s.parse::<i64>().ok().map(integer),
            (Coercion::Integer, Bson::Int32(_) | Bson::Int64(_)) => Some(value.clone()),
            (Coercion::Boolean, Bson::String(s)) => parse_bool(s).map(Bson::Boolean),
            (Coercion::Boolean, Bson::Boolean(_)) => Some(value.clone()),
            (Coercion::Text, _) => Some(value.clone()),
            _ => None,
        }
    }
}

fn integer(value: i64) -> Bson {
    i32::try_from(value)
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(value))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Maps one client key onto one native field.
#[derive(Debug)]
pub struct FilterRule {
    pub client_key: &'static str,
    pub native_field: &'static str,
    pub coercion: Coercion,
    /// Native fields required to exist when the client key is absent or blank.
    pub exists_when_absent: &'static [&'static str],
}

/// Filter rules for one entity kind.
#[derive(Debug)]
pub struct KindSchema {
    /// Native fields that must exist on every matching document.
    pub required: &'static [&'static str],
    pub rules: &'static [FilterRule],
}

const fn rule(
    client_key: &'static str,
    native_field: &'static str,
    coercion: Coercion,
    exists_when_absent: &'static [&'static str],
) -> FilterRule {
    FilterRule { client_key, native_field, coercion, exists_when_absent }
}

static MESSAGE: KindSchema = KindSchema {
    required: &["content", "seenAt", "createdAt"],
    rules: &[
        rule("actorid", "actorID", Coercion::Integer, &["actorID"]),
        rule("targetuserid", "targetUserID", Coercion::Integer, &[]),
        rule("targetgroupid", "targetGroupID", Coercion::Integer, &[]),
        rule("type", "notifyType", Coercion::Integer, &["notifyType"]),
        rule("seen", "seen", Coercion::Boolean, &[]),
    ],
};

static PRODUCT_GROUP: KindSchema = KindSchema {
    required: &["content", "createdAt"],
    rules: &[
        rule("actorid", "actorID", Coercion::Integer, &["actorID"]),
        rule("type", "notifyType", Coercion::Integer, &["notifyType"]),
    ],
};

static TEMPLATE: KindSchema = KindSchema {
    required: &["template"],
    rules: &[
        rule("name", "nameTemplate", Coercion::Text, &["nameTemplate"]),
        rule("creatorid", "creatorId", Coercion::Integer, &["creatorId"]),
    ],
};

static PRODUCT_GROUP_TOPIC: KindSchema = KindSchema {
    required: &[],
    rules: &[
        rule("topic", "topic", Coercion::Integer, &["topic"]),
        rule("productgroupid", "productGroupID", Coercion::Integer, &["productGroupID"]),
    ],
};

static SUBSCRIBABLE_TOPIC: KindSchema = KindSchema {
    required: &[],
    rules: &[
        rule("userid", "topicUserID", Coercion::Integer, &["topicUserID"]),
        rule("topic", "topic", Coercion::Text, &["topic", "topicMobile"]),
    ],
};

static DEVICE_TOKEN: KindSchema = KindSchema {
    required: &["userID"],
    rules: &[],
};

/// The entity kinds stored by the notification services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Message,
    ProductGroup,
    Template,
    ProductGroupTopic,
    SubscribableTopic,
    DeviceToken,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Message,
        EntityKind::ProductGroup,
        EntityKind::Template,
        EntityKind::ProductGroupTopic,
        EntityKind::SubscribableTopic,
        EntityKind::DeviceToken,
    ];

    /// Resolves the kind tag used by callers of `get_all_items_by_key`.
    ///
    /// Returns `None` for unknown tags, in which case no rules apply.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "message" => Some(EntityKind::Message),
            "productGroup" => Some(EntityKind::ProductGroup),
            "notifyTemplate" => Some(EntityKind::Template),
            "productGroupTopic" => Some(EntityKind::ProductGroupTopic),
            "subscriabletopic" | "subscribabletopic" => Some(EntityKind::SubscribableTopic),
            "userdevicetoken" => Some(EntityKind::DeviceToken),
            _ => None,
        }
    }

    /// The canonical kind tag.
    pub fn key(&self) -> &'static str {
        match self {
            EntityKind::Message => "message",
            EntityKind::ProductGroup => "productGroup",
            EntityKind::Template => "notifyTemplate",
            EntityKind::ProductGroupTopic => "productGroupTopic",
            EntityKind::SubscribableTopic => "subscriabletopic",
            EntityKind::DeviceToken => "userdevicetoken",
        }
    }

    pub fn schema(&self) -> &'static KindSchema {
        match self {
            EntityKind::Message => &MESSAGE,
            EntityKind::ProductGroup => &PRODUCT_GROUP,
            EntityKind::Template => &TEMPLATE,
            EntityKind::ProductGroupTopic => &PRODUCT_GROUP_TOPIC,
            EntityKind::SubscribableTopic => &SUBSCRIBABLE_TOPIC,
            EntityKind::DeviceToken => &DEVICE_TOKEN,
        }
    }

    /// Filter for listing a whole collection of this kind without paging.
    ///
    /// Only device tokens are constrained (to those bound to a user); other kinds list every
    /// document.
    pub fn listing_filter(&self) -> Document {
        let mut filter = Document::new();
        if let EntityKind::DeviceToken = self {
            require_all(&mut filter, DEVICE_TOKEN.required);
        }
        filter
    }
}

/// What to do with a filter value that cannot be coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoercionPolicy {
    /// Reject the whole request with [`DocumentStoreError::InvalidFilterValue`].
    #[default]
    Strict,
    /// Drop the offending key and treat it as absent.
    Lenient,
}

/// Interprets [`KindSchema`] tables over raw client filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterNormalizer {
    policy: CoercionPolicy,
}

impl FilterNormalizer {
    pub fn new(policy: CoercionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    /// Normalizes `raw` for the given kind. With no kind the filter is copied unchanged.
    ///
    /// # Errors
    ///
    /// Under [`CoercionPolicy::Strict`], returns [`DocumentStoreError::InvalidFilterValue`]
    /// for the first value that fails to coerce.
    pub fn normalize(&self, kind: Option<EntityKind>, raw: &Document) -> DocumentStoreResult<Document> {
        match kind {
            Some(kind) => self.normalize_with(kind.schema(), raw),
            None => Ok(raw.clone()),
        }
    }

    /// Normalizes `raw` against an explicit schema.
    pub fn normalize_with(&self, schema: &KindSchema, raw: &Document) -> DocumentStoreResult<Document> {
        let mut native = raw.clone();

        for rule in schema.rules {
            let coerced = match native.remove(rule.client_key) {
                Some(value) if !is_blank(&value) => self.coerce(rule, &value)?,
                _ => None,
            };

            match coerced {
                Some(value) => {
                    native.insert(rule.native_field, value);
                }
                None => require_all(&mut native, rule.exists_when_absent),
            }
        }

        require_all(&mut native, schema.required);

        Ok(native)
    }

    fn coerce(&self, rule: &FilterRule, value: &Bson) -> DocumentStoreResult<Option<Bson>> {
        if let Some(coerced) = rule.coercion.apply(value) {
            return Ok(Some(coerced));
        }

        let shown = match value {
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        };

        match self.policy {
            CoercionPolicy::Strict => Err(DocumentStoreError::InvalidFilterValue {
                key: rule.client_key.to_string(),
                value: shown,
                expected: rule.coercion.expected(),
            }),
            CoercionPolicy::Lenient => {
                warn!(
                    key = rule.client_key,
                    value = %shown,
                    expected = rule.coercion.expected(),
                    "dropping filter value that failed to coerce"
                );
                Ok(None)
            }
        }
    }
}

fn is_blank(value: &Bson) -> bool {
    match value {
        Bson::Null => true,
        Bson::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn require_all(native: &mut Document, fields: &[&str]) {
    for field in fields {
        if !native.contains_key(*field) {
            native.insert(*field, doc! { "$exists": true });
        }
    }
}
