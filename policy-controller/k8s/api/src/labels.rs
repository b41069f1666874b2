use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, LazyLock},
};

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Selects a set of namespaces by their labels.
///
/// A default selector matches everything.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Option<Map>,
    match_expressions: Option<Expressions>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSelector {
    #[error("invalid label key {0:?}")]
    Key(String),

    #[error("invalid label value {value:?} for key {key:?}")]
    Value { key: String, value: String },

    #[error("{0:?} is not a valid label selector operator")]
    Operator(String),

    #[error("values must be specified when operator is {operator:?} (key {key:?})")]
    MissingValues { key: String, operator: Operator },

    #[error("values must be empty when operator is {operator:?} (key {key:?})")]
    UnexpectedValues { key: String, operator: Operator },
}

// === Selector ===

impl Selector {
    pub fn from_expressions(exprs: Expressions) -> Self {
        Self {
            match_labels: None,
            match_expressions: Some(exprs),
        }
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
            match_expressions: None,
        }
    }

    /// A selector that matches no labels at all.
    ///
    /// Represented as an `In` expression with an empty value set, which the
    /// API never accepts and which can never be satisfied.
    pub fn nothing() -> Self {
        Self::from_expressions(vec![Expression {
            key: String::new(),
            operator: Operator::In,
            values: BTreeSet::new(),
        }])
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        for expr in self.match_expressions.iter().flatten() {
            if !expr.matches(labels.as_ref()) {
                return false;
            }
        }

        if let Some(match_labels) = self.match_labels.as_ref() {
            for (k, v) in match_labels.iter() {
                if labels.0.get(k) != Some(v) {
                    return false;
                }
            }
        }

        true
    }
}

impl TryFrom<&LabelSelector> for Selector {
    type Error = InvalidSelector;

    fn try_from(selector: &LabelSelector) -> Result<Self, Self::Error> {
        let match_labels = match selector.match_labels.as_ref() {
            Some(labels) => {
                for (key, value) in labels {
                    validate_key(key)?;
                    validate_value(key, value)?;
                }
                Some(labels.clone())
            }
            None => None,
        };

        let match_expressions = match selector.match_expressions.as_ref() {
            Some(reqs) => Some(
                reqs.iter()
                    .map(Expression::try_from)
                    .collect::<Result<Expressions, _>>()?,
            ),
            None => None,
        };

        Ok(Self {
            match_labels,
            match_expressions,
        })
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl std::iter::FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self::from_expressions(iter.into_iter().collect())
    }
}

// === Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

// === Expression ===

impl Expression {
    pub fn new(
        key: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            key: key.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, labels: &Map) -> bool {
        match self.operator {
            Operator::In => labels.get(&self.key).is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => labels.get(&self.key).is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

impl TryFrom<&LabelSelectorRequirement> for Expression {
    type Error = InvalidSelector;

    fn try_from(req: &LabelSelectorRequirement) -> Result<Self, Self::Error> {
        let LabelSelectorRequirement {
            key,
            operator,
            values,
        } = req;

        validate_key(key)?;
        let operator = operator.parse::<Operator>()?;
        let values = values.clone().unwrap_or_default();

        match operator {
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(InvalidSelector::MissingValues {
                    key: key.clone(),
                    operator,
                });
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(InvalidSelector::UnexpectedValues {
                    key: key.clone(),
                    operator,
                });
            }
            _ => {}
        }
        for value in &values {
            validate_value(key, value)?;
        }

        Ok(Self {
            key: key.clone(),
            operator,
            values: values.into_iter().collect(),
        })
    }
}

// === Operator ===

impl std::str::FromStr for Operator {
    type Err = InvalidSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            s => Err(InvalidSelector::Operator(s.to_string())),
        }
    }
}

// === validation ===

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("name regex must compile")
});

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("subdomain regex must compile")
});

/// Label keys are qualified names: an optional DNS subdomain prefix followed
/// by a slash and a name of at most 63 characters.
fn validate_key(key: &str) -> Result<(), InvalidSelector> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    let prefix_ok = prefix
        .is_none_or(|p| !p.is_empty() && p.len() <= MAX_PREFIX_LEN && DNS_SUBDOMAIN.is_match(p));
    let name_ok = !name.is_empty() && name.len() <= MAX_NAME_LEN && NAME.is_match(name);

    if prefix_ok && name_ok {
        Ok(())
    } else {
        Err(InvalidSelector::Key(key.to_string()))
    }
}

fn validate_value(key: &str, value: &str) -> Result<(), InvalidSelector> {
    if value.is_empty() || (value.len() <= MAX_NAME_LEN && NAME.is_match(value)) {
        return Ok(());
    }
    Err(InvalidSelector::Value {
        key: key.to_string(),
        value: value.to_string(),
    })
}
