//! Testing utilities for the tfsynth workspace
//!
//! Shared schema fixtures and construct trees.

#![allow(missing_docs)]

use tfsynth_construct::{
    attributes, App, AttributeSchema, AttributeType, Attributes, BlockSchema, NodeHandle,
    ProviderSchema, SchemaRegistry, Stack,
};
use tfsynth_value::{ReferenceToken, Template, Value};

pub const KMS_STACK: &str = "cdktf-python-aws-kms";

fn string() -> AttributeType {
    AttributeType::String
}

fn string_map() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

pub fn aws_schema() -> ProviderSchema {
    ProviderSchema::new("hashicorp/aws")
        .with_version("~> 5.0")
        .with_provider_block(
            BlockSchema::new()
                .with("region", AttributeSchema::required(string()))
                .with("profile", AttributeSchema::optional(string()))
                .with("alias", AttributeSchema::optional(string())),
        )
        .with_resource(
            "aws_kms_key",
            BlockSchema::new()
                .with("description", AttributeSchema::optional(string()))
                .with("enable_key_rotation", AttributeSchema::optional(AttributeType::Bool))
                .with("deletion_window_in_days", AttributeSchema::optional(AttributeType::Number))
                .with("policy", AttributeSchema::optional_computed(string()))
                .with("tags", AttributeSchema::optional(string_map()))
                .with("arn", AttributeSchema::computed(string()))
                .with("key_id", AttributeSchema::computed(string())),
        )
        .with_resource(
            "aws_kms_alias",
            BlockSchema::new()
                .with("name", AttributeSchema::optional_computed(string()))
                .with("target_key_id", AttributeSchema::required(string()))
                .with("arn", AttributeSchema::computed(string())),
        )
        .with_data_source(
            "aws_caller_identity",
            BlockSchema::new()
                .with("account_id", AttributeSchema::computed(string()))
                .with("arn", AttributeSchema::computed(string()))
                .with("user_id", AttributeSchema::computed(string())),
        )
}

pub fn null_schema() -> ProviderSchema {
    ProviderSchema::new("hashicorp/null")
        .with_version("~> 3.2")
        .with_resource(
            "null_resource",
            BlockSchema::new().with("triggers", AttributeSchema::optional(string_map())),
        )
}

pub fn test_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_provider("aws", aws_schema())
        .with_provider("null", null_schema())
}

/// Key policy text around each caller account id, in order
///
/// Root access for the account plus three grants to its autoscaling
/// service-linked role.
pub const KMS_POLICY_PARTS: [&str; 5] = [
    r#"{"Version":"2012-10-17","Statement":[{"Sid":"Enable IAM User Permissions","Effect":"Allow","Principal":{"AWS":"arn:aws:iam::"#,
    r#":root"},"Action":["kms:*"],"Resource":["*"]},{"Sid":"Allow autoscalling to use the key","Effect":"Allow","Principal":{"AWS":["arn:aws:iam::"#,
    r#":role/aws-service-role/autoscaling.amazonaws.com/AWSServiceRoleForAutoScaling"]},"Action":["kms:Create*","kms:Describe*","kms:Enable*","kms:List*","kms:Put*","kms:Update*","kms:Revoke*","kms:Disable*","kms:Get*","kms:Delete*","kms:TagResource","kms:UntagResource","kms:ScheduleKeyDeletion","kms:CancelKeyDeletion"],"Resource":"*"},{"Sid":"Allow use of the key","Effect":"Allow","Principal":{"AWS":["arn:aws:iam::"#,
    r#":role/aws-service-role/autoscaling.amazonaws.com/AWSServiceRoleForAutoScaling"]},"Action":["kms:Encrypt","kms:Decrypt","kms:ReEncrypt*","kms:GenerateDataKey*","kms:DescribeKey"],"Resource":"*"},{"Sid":"Allow attachment of persistent resources","Effect":"Allow","Principal":{"AWS":["arn:aws:iam::"#,
    r#":role/aws-service-role/autoscaling.amazonaws.com/AWSServiceRoleForAutoScaling"]},"Action":["kms:CreateGrant","kms:ListGrants","kms:RevokeGrant"],"Resource":"*","Condition":{"Bool":{"kms:GrantIsForAWSResource":"true"}}}]}"#,
];

/// Key policy with `account_id` spliced into every principal
pub fn kms_policy(account_id: &ReferenceToken) -> Template {
    KMS_POLICY_PARTS[1..]
        .iter()
        .fold(Template::new().text(KMS_POLICY_PARTS[0]), |template, part| {
            template.reference(account_id.clone()).text(*part)
        })
}

/// Provider, caller identity, key and alias in one stack
pub fn kms_app() -> App {
    let mut app = App::new(test_registry());
    build_kms_stack(app.add_stack(KMS_STACK).unwrap());
    app
}

pub struct KmsHandles {
    pub provider: NodeHandle,
    pub identity: NodeHandle,
    pub key: NodeHandle,
    pub alias: NodeHandle,
}

pub fn build_kms_stack(stack: &mut Stack) -> KmsHandles {
    let provider = stack
        .provider("aws", attributes([("region", "us-east-1")]))
        .unwrap();
    let identity = stack
        .data_source("aws_caller_identity", "aws_id", Attributes::new())
        .unwrap();
    let key = stack
        .resource(
            "aws_kms_key",
            "aws_kms",
            attributes([
                ("enable_key_rotation", Value::from(true)),
                ("policy", Value::from(kms_policy(&identity.attr("account_id")))),
                ("tags", Value::map([("Name", "CDKtf-python-Demo-KMS-key")])),
            ]),
        )
        .unwrap();
    let alias = stack
        .resource(
            "aws_kms_alias",
            "kms_alias",
            attributes([("target_key_id", key.id_ref())]),
        )
        .unwrap();

    KmsHandles {
        provider,
        identity,
        key,
        alias,
    }
}

/// `null_resource` whose triggers reference the `id` of each of `deps`
pub fn null_resource(stack: &mut Stack, id: &str, deps: &[&NodeHandle]) -> NodeHandle {
    let triggers: Vec<(String, Value)> = deps
        .iter()
        .map(|d| (d.id().to_string(), Value::from(d.id_ref())))
        .collect();
    let attrs = if triggers.is_empty() {
        Attributes::new()
    } else {
        attributes([("triggers", Value::map(triggers))])
    };
    stack.resource("null_resource", id, attrs).unwrap()
}
