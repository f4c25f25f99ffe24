use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::cloud::CloudApi;
use crate::config::CloudConfig;
use crate::core::{BucketGrant, Instance, SecurityGroup};
use crate::platform;

/// `CloudApi` backed by the AWS command-line client. Credentials come from
/// whatever the client already resolves (profiles, instance roles, SSO).
#[derive(Debug, Clone)]
pub struct AwsCli {
    profile: Option<String>,
    region: Option<String>,
    timeout: Duration,
}

impl AwsCli {
    pub fn new(cfg: &CloudConfig) -> Self {
        Self {
            profile: cfg.profile.clone(),
            region: cfg.region.clone(),
            timeout: Duration::from_secs(cfg.api_timeout_secs),
        }
    }

    fn args<'a>(&'a self, call: &[&'a str]) -> Vec<&'a str> {
        let mut args = call.to_vec();
        args.extend(["--output", "json"]);
        if let Some(profile) = &self.profile {
            args.extend(["--profile", profile.as_str()]);
        }
        if let Some(region) = &self.region {
            args.extend(["--region", region.as_str()]);
        }
        args
    }

    fn call<T: DeserializeOwned>(&self, call: &[&str]) -> Result<T> {
        let label = call.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        let args = self.args(call);
        let out = platform::run_command("aws", &args, self.timeout)
            .with_context(|| format!("aws {label}"))?;
        if !out.success() {
            let reason = out
                .stderr
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("no error output");
            return Err(anyhow!(
                "aws {label} failed (exit code {}): {reason}",
                out.exit_code
            ));
        }
        parse_json(&out.stdout).with_context(|| format!("aws {label}: unexpected response"))
    }
}

fn parse_json<T: DeserializeOwned>(stdout: &str) -> Result<T> {
    serde_json::from_str(stdout).context("failed to parse JSON")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInstance {
    instance_id: String,
    #[serde(default)]
    public_ip_address: Option<String>,
    #[serde(default)]
    security_groups: Vec<GroupRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupRef {
    group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupsResponse {
    #[serde(default)]
    security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketsResponse {
    #[serde(default)]
    buckets: Vec<BucketRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketRef {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketAclResponse {
    #[serde(default)]
    grants: Vec<RawGrant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGrant {
    #[serde(default)]
    grantee: Option<RawGrantee>,
    #[serde(default)]
    permission: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGrantee {
    #[serde(rename = "URI", default)]
    uri: Option<String>,
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(rename = "EmailAddress", default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListUsersResponse {
    #[serde(default)]
    users: Vec<UserRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserRef {
    user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPoliciesResponse {
    #[serde(default)]
    attached_policies: Vec<PolicyRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyRef {
    policy_name: String,
}

impl From<DescribeInstancesResponse> for Vec<Instance> {
    fn from(resp: DescribeInstancesResponse) -> Self {
        resp.reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .map(|i| Instance {
                instance_id: i.instance_id,
                public_ip: i.public_ip_address,
                security_group_ids: i.security_groups.into_iter().map(|g| g.group_id).collect(),
            })
            .collect()
    }
}

impl From<BucketAclResponse> for Vec<BucketGrant> {
    fn from(resp: BucketAclResponse) -> Self {
        resp.grants
            .into_iter()
            .map(|g| {
                let grantee = g
                    .grantee
                    .and_then(|e| e.uri.or(e.id).or(e.email))
                    .unwrap_or_default();
                BucketGrant {
                    grantee,
                    permission: g.permission.unwrap_or_else(|| "UNKNOWN".to_string()),
                }
            })
            .collect()
    }
}

impl CloudApi for AwsCli {
    fn describe_instances(&self) -> Result<Vec<Instance>> {
        let resp: DescribeInstancesResponse = self.call(&["ec2", "describe-instances"])?;
        Ok(resp.into())
    }

    fn describe_security_groups(&self, group_id: &str) -> Result<Vec<SecurityGroup>> {
        let resp: DescribeSecurityGroupsResponse =
            self.call(&["ec2", "describe-security-groups", "--group-ids", group_id])?;
        Ok(resp.security_groups)
    }

    fn list_buckets(&self) -> Result<Vec<String>> {
        let resp: ListBucketsResponse = self.call(&["s3api", "list-buckets"])?;
        Ok(resp.buckets.into_iter().map(|b| b.name).collect())
    }

    fn bucket_acl(&self, bucket: &str) -> Result<Vec<BucketGrant>> {
        let resp: BucketAclResponse =
            self.call(&["s3api", "get-bucket-acl", "--bucket", bucket])?;
        Ok(resp.into())
    }

    fn list_users(&self) -> Result<Vec<String>> {
        let resp: ListUsersResponse = self.call(&["iam", "list-users"])?;
        Ok(resp.users.into_iter().map(|u| u.user_name).collect())
    }

    fn attached_user_policies(&self, user: &str) -> Result<Vec<String>> {
        let resp: AttachedPoliciesResponse =
            self.call(&["iam", "list-attached-user-policies", "--user-name", user])?;
        Ok(resp
            .attached_policies
            .into_iter()
            .map(|p| p.policy_name)
            .collect())
    }
}
