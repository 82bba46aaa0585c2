use std::fmt;

use mynotes_graph::{
    Graph, Property, RemovalPolicy, ResourceDecl, ResourceId, ResourceKind, StackId,
};

use crate::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned,
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillingMode::PayPerRequest => "PAY_PER_REQUEST",
            BillingMode::Provisioned => "PROVISIONED",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    String,
    Number,
    Binary,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyType::String => "S",
            KeyType::Number => "N",
            KeyType::Binary => "B",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyAttribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_type: KeyType::String,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BucketEncryption {
    Unencrypted,
    #[default]
    S3Managed,
    KmsManaged,
}

impl fmt::Display for BucketEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketEncryption::Unencrypted => "UNENCRYPTED",
            BucketEncryption::S3Managed => "S3_MANAGED",
            BucketEncryption::KmsManaged => "KMS_MANAGED",
        };
        f.write_str(s)
    }
}

/// Key-value record store with a single partition key and no secondary indexes.
#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct TableProps {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    #[builder(default)]
    pub billing_mode: BillingMode,
    #[builder(default)]
    pub removal: RemovalPolicy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct BucketProps {
    /// Left to the provisioning side when unset.
    pub bucket_name: Option<String>,
    #[builder(default)]
    pub versioned: bool,
    #[builder(default)]
    pub encryption: BucketEncryption,
    #[builder(default)]
    pub removal: RemovalPolicy,
}

pub fn declare_table(
    graph: &mut Graph,
    stack: StackId,
    logical_id: &str,
    props: &TableProps,
) -> Result<ResourceId, Error> {
    if props.table_name.is_empty() {
        return Err(Error::invalid_props("table", "table_name", "must not be empty"));
    }
    if props.partition_key.name.is_empty() {
        return Err(Error::invalid_props(
            "table",
            "partition_key",
            "attribute name must not be empty",
        ));
    }

    let key = Property::map([
        ("attribute_name", Property::from(props.partition_key.name.as_str())),
        ("attribute_type", Property::policy(props.partition_key.key_type)),
        ("key_type", Property::from("HASH")),
    ]);
    let id = graph.add_resource(
        stack,
        ResourceDecl::new(logical_id, ResourceKind::KeyValueTable)
            .property("table_name", props.table_name.as_str())
            .property("billing_mode", Property::policy(props.billing_mode))
            .property("key_schema", Property::list([key]))
            .removal(props.removal),
    )?;
    tracing::trace!(table = %props.table_name, removal = %props.removal, "declared table");
    Ok(id)
}

pub fn declare_bucket(
    graph: &mut Graph,
    stack: StackId,
    logical_id: &str,
    props: &BucketProps,
) -> Result<ResourceId, Error> {
    let mut decl = ResourceDecl::new(logical_id, ResourceKind::BlobStore)
        .property("versioned", props.versioned)
        .property("encryption", Property::policy(props.encryption))
        .removal(props.removal);
    if let Some(name) = &props.bucket_name {
        decl = decl.property("bucket_name", name.as_str());
    }
    Ok(graph.add_resource(stack, decl)?)
}

#[cfg(test)]
mod tests {
    use mynotes_graph::LogicalId;

    use super::*;

    #[test]
    fn table_declares_a_single_hash_key() {
        let mut g = Graph::new(LogicalId::try_from("App").unwrap());
        let root = g.root();
        let props = TableProps::builder()
            .table_name("Notes")
            .partition_key(KeyAttribute::string("id"))
            .removal(RemovalPolicy::Retain)
            .build();
        let id = declare_table(&mut g, root, "NotesTable", &props).unwrap();

        let table = g.resource(id);
        assert_eq!(table.removal, RemovalPolicy::Retain);
        assert_eq!(
            table.property("billing_mode").and_then(Property::as_str),
            Some("PAY_PER_REQUEST")
        );
        let keys = table.property("key_schema").and_then(Property::as_list).unwrap();
        assert_eq!(keys.len(), 1);
        let key = keys[0].as_map().unwrap();
        assert_eq!(key["attribute_name"].as_str(), Some("id"));
        assert_eq!(key["attribute_type"].as_str(), Some("S"));
    }

    #[test]
    fn bucket_name_is_optional() {
        let mut g = Graph::new(LogicalId::try_from("App").unwrap());
        let root = g.root();
        let props = BucketProps::builder().versioned(true).build();
        let id = declare_bucket(&mut g, root, "Bucket", &props).unwrap();

        let bucket = g.resource(id);
        assert!(bucket.property("bucket_name").is_none());
        assert_eq!(bucket.property("versioned").and_then(Property::as_bool), Some(true));
        assert_eq!(
            bucket.property("encryption").and_then(Property::as_str),
            Some("S3_MANAGED")
        );
        assert_eq!(bucket.removal, RemovalPolicy::Destroy);
    }
}
