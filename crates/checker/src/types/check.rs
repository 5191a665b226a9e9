use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored resource, possibly abstract (a security group, a load
/// balancer) until a resolver expands it into concrete hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
}

impl Target {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A multi-valued header, kept in the order it was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Header {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Group `(name, value)` pairs by name, preserving first-seen order.
    pub fn group<I>(pairs: I) -> Vec<Header>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut headers: Vec<Header> = Vec::new();
        for (name, value) in pairs {
            match headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(&name)) {
                Some(header) => header.values.push(value),
                None => headers.push(Header::new(name, vec![value])),
            }
        }
        headers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCheck {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub protocol: String,
    pub port: u16,
    #[serde(default)]
    pub verb: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudWatchMetric {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudWatchCheck {
    #[serde(default)]
    pub metrics: Vec<CloudWatchMetric>,
}

/// What a check actually does against each target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CheckSpec {
    #[serde(rename = "http")]
    Http(HttpCheck),
    #[serde(rename = "cloudwatch")]
    CloudWatch(CloudWatchCheck),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub key: String,
    pub relationship: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub operand: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Check {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub name: String,
    /// Seconds between runs.
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub spec: Option<CheckSpec>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl Check {
    pub fn new(id: impl Into<String>, interval: u64) -> Self {
        Self {
            id: id.into(),
            interval,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_spec(mut self, spec: CheckSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }
}
