//! Group keys derived from resource and data point attributes.

use itertools::Itertools;
use opentelemetry_proto::tonic::common::v1::KeyValue;

use crate::attributes::{find, string_kv, value_as_string};

/// Key of the single group used when none of the grouping labels are present.
pub const ALL_GROUP: &str = "all";

/// Separator between `name=value` pairs in a group key.
const LABEL_SEPARATOR: &str = "|";

/// A group key together with the labels it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    key: String,
    labels: Vec<(String, String)>,
}

impl GroupKey {
    /// Resolves the grouping labels for one data point.
    ///
    /// Each label is looked up in the point attributes first, then in the resource attributes.
    /// Labels found in neither are left out of the key entirely; a label present with an empty
    /// value is kept. Label order follows `labels`.
    pub fn new(
        resource_attributes: &[KeyValue],
        point_attributes: &[KeyValue],
        labels: &[String],
    ) -> GroupKey {
        let labels: Vec<(String, String)> = labels
            .iter()
            .filter_map(|label| {
                find(point_attributes, label)
                    .or_else(|| find(resource_attributes, label))
                    .map(|kv| (label.clone(), value_as_string(kv.value.as_ref())))
            })
            .collect();
        let key = if labels.is_empty() {
            ALL_GROUP.to_owned()
        } else {
            labels
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .join(LABEL_SEPARATOR)
        };
        GroupKey { key, labels }
    }

    /// The string form of the key, e.g. `env=prod|pathKey=/v1`.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The labels that were present, in grouping order.
    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Splits the group labels between the synthesized resource and the synthesized point.
    ///
    /// A label found on the resource of the group's first member goes to the resource, anything
    /// else goes to the data point.
    pub fn split_labels(&self, first_member_resource: &[KeyValue]) -> GroupLabels {
        let mut split = GroupLabels::default();
        for (name, value) in &self.labels {
            if find(first_member_resource, name).is_some() {
                split.resource.push(string_kv(name.as_str(), value.as_str()));
            } else {
                split.point.push(string_kv(name.as_str(), value.as_str()));
            }
        }
        split
    }
}

/// Group labels, split by where they land on synthesized output.
#[derive(Debug, Default, PartialEq)]
pub struct GroupLabels {
    /// Promoted onto the synthesized resource.
    pub resource: Vec<KeyValue>,
    /// Set on the synthesized data point.
    pub point: Vec<KeyValue>,
}

/// Builds the string group key for one data point.
pub fn build_group_key(
    resource_attributes: &[KeyValue],
    point_attributes: &[KeyValue],
    labels: &[String],
) -> String {
    GroupKey::new(resource_attributes, point_attributes, labels).key
}
