//! Additional IAM policies attached to cluster instance roles

use crate::error::Result;
use crate::outputs::Outputs;
use serde::Serialize;

const ROUTE53_ACTIONS: &[&str] = &[
    "route53:ListHostedZones",
    "route53:ListResourceRecordSets",
    "route53:ChangeResourceRecordSets",
    "route53:ListHostedZonesByName",
    "route53:GetChange",
];

/// One IAM policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamPolicy {
    pub effect: String,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

impl IamPolicy {
    pub fn allow() -> Self {
        Self {
            effect: "Allow".to_string(),
            action: Vec::new(),
            resource: Vec::new(),
        }
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource = resources.into_iter().map(Into::into).collect();
        self
    }
}

/// Serialized policy list, or an empty string when there is nothing to attach.
pub fn policy_json(policies: &[IamPolicy]) -> Result<String> {
    if policies.is_empty() {
        return Ok(String::new());
    }
    Ok(serde_json::to_string(policies)?)
}

/// Full access to every provisioned search cluster's domain.
pub fn search_cluster_policies(outputs: &Outputs) -> Vec<IamPolicy> {
    outputs
        .search_clusters
        .values()
        .map(|cluster| {
            IamPolicy::allow()
                .actions(["es:*"])
                .resources([format!("{}/*", cluster.arn)])
        })
        .collect()
}

/// DNS record management for nodes.
pub fn route53_policies() -> Vec<IamPolicy> {
    vec![
        IamPolicy::allow()
            .actions(ROUTE53_ACTIONS.iter().copied())
            .resources(["*"]),
    ]
}

/// Serialized policies injected into a cluster definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterPolicies {
    pub master: String,
    pub node: String,
}

impl ClusterPolicies {
    pub fn from_outputs(outputs: &Outputs) -> Result<Self> {
        let search = search_cluster_policies(outputs);
        let node: Vec<IamPolicy> = search.iter().cloned().chain(route53_policies()).collect();

        Ok(Self {
            master: policy_json(&search)?,
            node: policy_json(&node)?,
        })
    }
}
