//! Provider vocabulary for each resource kind: template types, physical naming and the
//! store actions behind each capability.

use mynotes_graph::{Capability, ResourceKind};
use sha2::{Digest as _, Sha256};

pub const DEFAULT_ACCOUNT: &str = "123456789012";

pub fn template_type(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Network => "AWS::EC2::VPC",
        ResourceKind::Subnet => "AWS::EC2::Subnet",
        ResourceKind::GatewayEndpoint => "AWS::EC2::VPCEndpoint",
        ResourceKind::UserDirectory => "AWS::Cognito::UserPool",
        ResourceKind::KeyValueTable => "AWS::DynamoDB::Table",
        ResourceKind::BlobStore => "AWS::S3::Bucket",
        ResourceKind::ComputeUnit => "AWS::Lambda::Function",
        ResourceKind::Role => "AWS::IAM::Role",
        ResourceKind::RestApi => "AWS::ApiGateway::RestApi",
        ResourceKind::RestResource => "AWS::ApiGateway::Resource",
        ResourceKind::RestMethod => "AWS::ApiGateway::Method",
        ResourceKind::InvokePermission => "AWS::Lambda::Permission",
    }
}

/// Property holding a caller-chosen physical name, if the kind has one.
pub fn name_property(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::KeyValueTable => Some("table_name"),
        ResourceKind::BlobStore => Some("bucket_name"),
        ResourceKind::ComputeUnit => Some("function_name"),
        ResourceKind::Role => Some("role_name"),
        ResourceKind::UserDirectory => Some("user_pool_name"),
        ResourceKind::RestApi => Some("rest_api_name"),
        _ => None,
    }
}

/// Prefix of provider-assigned ids.
pub fn id_prefix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Network => "vpc",
        ResourceKind::Subnet => "subnet",
        ResourceKind::GatewayEndpoint => "vpce",
        ResourceKind::UserDirectory => "pool",
        ResourceKind::RestApi => "api",
        ResourceKind::RestResource => "res",
        ResourceKind::RestMethod => "meth",
        ResourceKind::InvokePermission => "perm",
        ResourceKind::KeyValueTable
        | ResourceKind::BlobStore
        | ResourceKind::ComputeUnit
        | ResourceKind::Role => "id",
    }
}

/// ARN of a provisioned resource.
pub fn arn(kind: ResourceKind, region: &str, account: &str, name: &str, id: &str) -> String {
    match kind {
        ResourceKind::Network => format!("arn:aws:ec2:{region}:{account}:vpc/{id}"),
        ResourceKind::Subnet => format!("arn:aws:ec2:{region}:{account}:subnet/{id}"),
        ResourceKind::GatewayEndpoint => {
            format!("arn:aws:ec2:{region}:{account}:vpc-endpoint/{id}")
        }
        ResourceKind::UserDirectory => {
            format!("arn:aws:cognito-idp:{region}:{account}:userpool/{id}")
        }
        ResourceKind::KeyValueTable => format!("arn:aws:dynamodb:{region}:{account}:table/{name}"),
        ResourceKind::BlobStore => format!("arn:aws:s3:::{name}"),
        ResourceKind::ComputeUnit => format!("arn:aws:lambda:{region}:{account}:function:{name}"),
        ResourceKind::Role => format!("arn:aws:iam::{account}:role/{name}"),
        ResourceKind::RestApi => format!("arn:aws:apigateway:{region}::/restapis/{id}"),
        ResourceKind::RestResource | ResourceKind::RestMethod => {
            format!("arn:aws:apigateway:{region}::/resources/{id}")
        }
        ResourceKind::InvokePermission => {
            format!("arn:aws:lambda:{region}:{account}:permission/{id}")
        }
    }
}

/// Store actions allowed by `capability`. `None` for kinds that are not stores.
pub fn store_actions(
    kind: ResourceKind,
    capability: Capability,
) -> Option<&'static [&'static str]> {
    let actions: &'static [&'static str] = match (kind, capability) {
        (ResourceKind::KeyValueTable, Capability::Read) => &[
            "dynamodb:BatchGetItem",
            "dynamodb:ConditionCheckItem",
            "dynamodb:DescribeTable",
            "dynamodb:GetItem",
            "dynamodb:Query",
            "dynamodb:Scan",
        ],
        (ResourceKind::KeyValueTable, Capability::Write) => &[
            "dynamodb:BatchWriteItem",
            "dynamodb:DeleteItem",
            "dynamodb:PutItem",
            "dynamodb:UpdateItem",
        ],
        (ResourceKind::BlobStore, Capability::Read) => {
            &["s3:GetBucket*", "s3:GetObject*", "s3:List*"]
        }
        (ResourceKind::BlobStore, Capability::Write) => {
            &["s3:Abort*", "s3:DeleteObject*", "s3:PutObject*"]
        }
        _ => return None,
    };
    Some(actions)
}

/// First `len` hex digits of the SHA-256 of `path`. Stable across runs and machines.
pub fn path_digest(path: &str, len: usize) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stores_have_actions() {
        assert!(store_actions(ResourceKind::KeyValueTable, Capability::Read).is_some());
        assert!(store_actions(ResourceKind::ComputeUnit, Capability::Read).is_none());
    }

    #[test]
    fn digests_are_stable_and_truncated() {
        let a = path_digest("/mynotes-api/NotesTable", 8);
        assert_eq!(a.len(), 8);
        assert_eq!(a, path_digest("/mynotes-api/NotesTable", 8));
        assert_ne!(a, path_digest("/mynotes-api/NotesContentBucket", 8));
    }

    #[test]
    fn bucket_arns_are_global() {
        assert_eq!(
            arn(ResourceKind::BlobStore, "eu-west-1", DEFAULT_ACCOUNT, "notes", "x"),
            "arn:aws:s3:::notes"
        );
    }
}
