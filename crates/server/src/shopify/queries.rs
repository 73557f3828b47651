//! GraphQL operations used against the Shopify Admin API.
//!
//! Each operation follows the layout `graphql_client` generates: a unit
//! struct implementing [`GraphQLQuery`] plus a snake_case module holding its
//! `Variables` and `ResponseData`. Documents are kept inline since the app
//! only touches a handful of fields.

use graphql_client::{GraphQLQuery, QueryBody};

/// Implements [`GraphQLQuery`] for an operation struct and its module.
macro_rules! operation {
    ($name:ident, $module:ident) => {
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $module::QUERY,
                    operation_name: $module::OPERATION_NAME,
                }
            }
        }
    };
}

/// `userErrors` entry shared by most mutations.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UserError {
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Value of a single metafield lookup.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafieldValue {
    pub value: String,
    #[serde(default)]
    pub compare_digest: Option<String>,
}

// =============================================================================
// Customer queries
// =============================================================================

operation!(GetCustomerMetafield, get_customer_metafield);

pub mod get_customer_metafield {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "GetCustomerMetafield";
    pub const QUERY: &str = r"
query GetCustomerMetafield($id: ID!, $namespace: String!, $key: String!) {
  customer(id: $id) {
    id
    metafield(namespace: $namespace, key: $key) {
      value
      compareDigest
    }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub id: String,
        pub namespace: String,
        pub key: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub customer: Option<Customer>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Customer {
        pub id: String,
        pub metafield: Option<super::MetafieldValue>,
    }
}

operation!(GetCustomerContact, get_customer_contact);

pub mod get_customer_contact {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "GetCustomerContact";
    pub const QUERY: &str = r"
query GetCustomerContact($id: ID!) {
  customer(id: $id) {
    id
    firstName
    lastName
    displayName
    email
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub customer: Option<Customer>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Customer {
        pub id: String,
        pub first_name: Option<String>,
        pub last_name: Option<String>,
        pub display_name: Option<String>,
        pub email: Option<String>,
    }
}

// =============================================================================
// Product queries
// =============================================================================

operation!(GetProductGating, get_product_gating);

pub mod get_product_gating {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "GetProductGating";
    pub const QUERY: &str = r#"
query GetProductGating($id: ID!) {
  product(id: $id) {
    id
    requiresAffidavit: metafield(namespace: "affidavit", key: "requires_affidavit") {
      value
    }
    productCodes: metafield(namespace: "affidavit", key: "product_codes") {
      value
    }
  }
}"#;

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub product: Option<Product>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Product {
        pub id: String,
        pub requires_affidavit: Option<Value>,
        pub product_codes: Option<Value>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Value {
        pub value: String,
    }
}

// =============================================================================
// Metafield mutations
// =============================================================================

operation!(MetafieldsSet, metafields_set);

pub mod metafields_set {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "MetafieldsSet";
    pub const QUERY: &str = r"
mutation MetafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields {
      id
      key
      compareDigest
    }
    userErrors {
      field
      message
      code
    }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub metafields: Vec<MetafieldsSetInput>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetafieldsSetInput {
        pub owner_id: String,
        pub namespace: String,
        pub key: String,
        #[serde(rename = "type")]
        pub kind: String,
        pub value: String,
        /// `None` skips the check, `Some(None)` requires the metafield to be
        /// absent, `Some(Some(digest))` requires it to be unchanged.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub compare_digest: Option<Option<String>>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub metafields_set: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        #[serde(default)]
        pub metafields: Option<Vec<Metafield>>,
        pub user_errors: Vec<super::UserError>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Metafield {
        pub id: String,
        pub key: String,
        pub compare_digest: Option<String>,
    }
}

operation!(MetafieldDefinitionCreate, metafield_definition_create);

pub mod metafield_definition_create {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "MetafieldDefinitionCreate";
    pub const QUERY: &str = r"
mutation MetafieldDefinitionCreate($definition: MetafieldDefinitionInput!) {
  metafieldDefinitionCreate(definition: $definition) {
    createdDefinition {
      id
      name
    }
    userErrors {
      field
      message
      code
    }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub definition: MetafieldDefinitionInput,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetafieldDefinitionInput {
        pub name: String,
        pub namespace: String,
        pub key: String,
        pub description: String,
        #[serde(rename = "type")]
        pub kind: String,
        pub owner_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub access: Option<Access>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Access {
        pub admin: String,
        pub storefront: String,
        pub customer_account: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub metafield_definition_create: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub created_definition: Option<CreatedDefinition>,
        pub user_errors: Vec<super::UserError>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CreatedDefinition {
        pub id: String,
        pub name: String,
    }
}

// =============================================================================
// Order mutations
// =============================================================================

operation!(GetOrderFulfillmentOrders, get_order_fulfillment_orders);

pub mod get_order_fulfillment_orders {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "GetOrderFulfillmentOrders";
    pub const QUERY: &str = r"
query GetOrderFulfillmentOrders($id: ID!) {
  order(id: $id) {
    id
    fulfillmentOrders(first: 25) {
      nodes {
        id
        status
      }
    }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub order: Option<Order>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Order {
        pub id: String,
        pub fulfillment_orders: Connection,
    }

    #[derive(Debug, Deserialize)]
    pub struct Connection {
        pub nodes: Vec<FulfillmentOrder>,
    }

    #[derive(Debug, Deserialize)]
    pub struct FulfillmentOrder {
        pub id: String,
        pub status: String,
    }
}

operation!(FulfillmentOrderHold, fulfillment_order_hold);

pub mod fulfillment_order_hold {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "FulfillmentOrderHold";
    pub const QUERY: &str = r"
mutation FulfillmentOrderHold($id: ID!, $fulfillmentHold: FulfillmentOrderHoldInput!) {
  fulfillmentOrderHold(id: $id, fulfillmentHold: $fulfillmentHold) {
    fulfillmentHold {
      id
    }
    userErrors {
      field
      message
    }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub id: String,
        pub fulfillment_hold: FulfillmentOrderHoldInput,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FulfillmentOrderHoldInput {
        /// `FulfillmentHoldReason` enum value.
        pub reason: &'static str,
        pub reason_notes: Option<String>,
        pub notify_merchant: bool,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub fulfillment_order_hold: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<super::UserError>,
    }
}

operation!(FulfillmentOrderReleaseHold, fulfillment_order_release_hold);

pub mod fulfillment_order_release_hold {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "FulfillmentOrderReleaseHold";
    pub const QUERY: &str = r"
mutation FulfillmentOrderReleaseHold($id: ID!) {
  fulfillmentOrderReleaseHold(id: $id) {
    fulfillmentOrder {
      id
      status
    }
    userErrors {
      field
      message
    }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub id: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub fulfillment_order_release_hold: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<super::UserError>,
    }
}

operation!(OrderCancel, order_cancel);

pub mod order_cancel {
    use serde::{Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "OrderCancel";
    pub const QUERY: &str = r"
mutation OrderCancel(
  $orderId: ID!
  $reason: OrderCancelReason!
  $refund: Boolean!
  $restock: Boolean!
  $notifyCustomer: Boolean
  $staffNote: String
) {
  orderCancel(
    orderId: $orderId
    reason: $reason
    refund: $refund
    restock: $restock
    notifyCustomer: $notifyCustomer
    staffNote: $staffNote
  ) {
    job {
      id
    }
    orderCancelUserErrors {
      field
      message
      code
    }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub order_id: String,
        /// `OrderCancelReason` enum value.
        pub reason: &'static str,
        pub refund: bool,
        pub restock: bool,
        pub notify_customer: Option<bool>,
        pub staff_note: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub order_cancel: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub order_cancel_user_errors: Vec<super::UserError>,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_uses_operation_name() {
        let body = GetCustomerContact::build_query(get_customer_contact::Variables {
            id: "gid://shopify/Customer/1".to_string(),
        });
        assert_eq!(body.operation_name, "GetCustomerContact");
        assert!(body.query.contains("query GetCustomerContact"));
    }

    #[test]
    fn test_compare_digest_serialization() {
        let mut input = metafields_set::MetafieldsSetInput {
            owner_id: "gid://shopify/Customer/1".to_string(),
            namespace: "app--factor2-affidavit".to_string(),
            key: "submissions".to_string(),
            kind: "json".to_string(),
            value: "[]".to_string(),
            compare_digest: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("compareDigest").is_none());
        assert_eq!(json["type"], "json");

        input.compare_digest = Some(None);
        let json = serde_json::to_value(&input).unwrap();
        assert!(json["compareDigest"].is_null());
        assert!(json.as_object().unwrap().contains_key("compareDigest"));

        input.compare_digest = Some(Some("abc".to_string()));
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["compareDigest"], "abc");
    }

    #[test]
    fn test_metafields_set_response_parses_user_errors() {
        let data: metafields_set::ResponseData = serde_json::from_str(
            r#"{"metafieldsSet":{"metafields":[],"userErrors":[
                {"field":["metafields","0","compareDigest"],"message":"stale","code":"STALE_OBJECT"}
            ]}}"#,
        )
        .unwrap();
        let errors = data.metafields_set.unwrap().user_errors;
        assert_eq!(errors[0].code.as_deref(), Some("STALE_OBJECT"));
    }
}
