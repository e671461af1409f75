//! Analytics operations
//!
//! Rules, events, flush and status all go through [`RawApi`].

use super::listing::{finish_listing, ListOptions};
use super::{FromParameters, HandlerTable, NodeOutput, OperationContext, OperationResult};
use crate::error::{NodeError, NodeResult};
use crate::params::Parameters;
use crate::typesense::RawApi;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

pub const HANDLERS: HandlerTable = &[
    ("createRule", create_rule),
    ("getRule", get_rule),
    ("getAllRules", get_all_rules),
    ("updateRule", update_rule),
    ("deleteRule", delete_rule),
    ("sendEvent", send_event),
    ("getEvents", get_events),
    ("flush", flush),
    ("getStatus", get_status),
];

pub const DEFAULT_RULE_LIMIT: u64 = 1000;
pub const DEFAULT_EVENT_COUNT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleType {
    PopularQueries,
    NohitsQueries,
    Counter,
    Log,
}

impl RuleType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "popular_queries" => Some(Self::PopularQueries),
            "nohits_queries" => Some(Self::NohitsQueries),
            "counter" => Some(Self::Counter),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::PopularQueries => "popular_queries",
            Self::NohitsQueries => "nohits_queries",
            Self::Counter => "counter",
            Self::Log => "log",
        }
    }

    /// Query rules aggregate into a destination collection with a size cap
    fn is_query_rule(&self) -> bool {
        matches!(self, Self::PopularQueries | Self::NohitsQueries)
    }
}

struct RuleDefinition {
    name: String,
    body: Value,
}

impl FromParameters for RuleDefinition {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        let name = params.required_str("ruleName", "Rule name")?;
        let raw_type = params.str_or("ruleType", RuleType::PopularQueries.as_str());
        let rule_type = RuleType::from_str(&raw_type).ok_or_else(|| {
            NodeError::validation(format!("Unknown analytics rule type \"{}\"", raw_type))
        })?;

        let collections = params.comma_list("sourceCollections");
        if collections.is_empty() {
            return Err(NodeError::validation("Source collections is required"));
        }

        let mut source = Map::new();
        source.insert("collections".to_string(), json!(collections));
        if let Some(events) = params.optional_json("events", "Events")? {
            if !events.is_array() {
                return Err(NodeError::validation("Events must be a JSON array"));
            }
            source.insert("events".to_string(), events);
        } else if rule_type == RuleType::Counter {
            return Err(NodeError::validation("Counter rules need at least one event"));
        }

        let mut rule_params = Map::new();
        rule_params.insert("source".to_string(), Value::Object(source));

        let destination = params.optional_str("destinationCollection");
        let counter_field = params.optional_str("counterField");
        match (rule_type, destination) {
            (RuleType::Log, None) => {}
            (RuleType::Counter, Some(collection)) => {
                let field = counter_field.ok_or_else(|| {
                    NodeError::validation("Counter field is required for counter rules")
                })?;
                rule_params.insert(
                    "destination".to_string(),
                    json!({ "collection": collection, "counter_field": field }),
                );
            }
            (_, Some(collection)) => {
                rule_params.insert("destination".to_string(), json!({ "collection": collection }));
            }
            (_, None) => {
                return Err(NodeError::validation("Destination collection is required"));
            }
        }

        if rule_type.is_query_rule() {
            rule_params.insert(
                "limit".to_string(),
                json!(params.u64_or("ruleLimit", DEFAULT_RULE_LIMIT)?),
            );
            if let Some(expand) = params.optional_bool("expandQuery") {
                rule_params.insert("expand_query".to_string(), Value::Bool(expand));
            }
        }

        let body = json!({
            "name": name,
            "type": rule_type.as_str(),
            "params": rule_params,
        });
        Ok(Self { name, body })
    }
}

struct RuleName {
    name: String,
}

impl FromParameters for RuleName {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            name: params.required_str("ruleName", "Rule name")?,
        })
    }
}

struct ListRules {
    options: ListOptions,
    name_prefix: Option<String>,
}

impl FromParameters for ListRules {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            options: ListOptions::from_parameters(params)?,
            name_prefix: params.collection("filters").optional_str("namePrefix"),
        })
    }
}

struct AnalyticsEvent {
    body: Value,
}

impl FromParameters for AnalyticsEvent {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            body: json!({
                "type": params.required_str("eventType", "Event type")?,
                "name": params.required_str("eventName", "Event name")?,
                "data": params.required_json_object("eventData", "Event data")?,
            }),
        })
    }
}

struct EventQuery {
    user_id: String,
    name: String,
    n: u64,
}

impl FromParameters for EventQuery {
    fn from_parameters(params: &Parameters) -> NodeResult<Self> {
        Ok(Self {
            user_id: params.required_str("userId", "User ID")?,
            name: params.required_str("eventName", "Event name")?,
            n: params.u64_or("n", DEFAULT_EVENT_COUNT)?,
        })
    }
}

fn create_rule<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = RuleDefinition::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            RawApi::new(ctx.client).create_analytics_rule(&p.body).await?,
        ))
    }
    .boxed()
}

fn get_rule<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = RuleName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            RawApi::new(ctx.client).retrieve_analytics_rule(&p.name).await?,
        ))
    }
    .boxed()
}

fn get_all_rules<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = ListRules::from_parameters(ctx.params)?;
        let rules = RawApi::new(ctx.client).list_analytics_rules().await?;
        let prefix = p.name_prefix.as_deref().map(|prefix| ("name", prefix));
        Ok(NodeOutput::Many(finish_listing(rules, prefix, p.options, &[])))
    }
    .boxed()
}

fn update_rule<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = RuleDefinition::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            RawApi::new(ctx.client)
                .upsert_analytics_rule(&p.name, &p.body)
                .await?,
        ))
    }
    .boxed()
}

fn delete_rule<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = RuleName::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            RawApi::new(ctx.client).delete_analytics_rule(&p.name).await?,
        ))
    }
    .boxed()
}

fn send_event<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = AnalyticsEvent::from_parameters(ctx.params)?;
        Ok(NodeOutput::Single(
            RawApi::new(ctx.client).send_analytics_event(&p.body).await?,
        ))
    }
    .boxed()
}

fn get_events<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move {
        let p = EventQuery::from_parameters(ctx.params)?;
        let response = RawApi::new(ctx.client)
            .analytics_events(&p.user_id, &p.name, p.n)
            .await?;
        Ok(NodeOutput::Single(response))
    }
    .boxed()
}

fn flush<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move { Ok(NodeOutput::Single(RawApi::new(ctx.client).flush_analytics().await?)) }.boxed()
}

fn get_status<'a>(ctx: &'a OperationContext<'a>) -> BoxFuture<'a, OperationResult> {
    async move { Ok(NodeOutput::Single(RawApi::new(ctx.client).analytics_status().await?)) }.boxed()
}
